//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the arm software: the messages exchanged
//! with the actuator driver and the perception pipeline, and the network layer they travel over.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Demand and feedback definitions for equipment (arm actuators, camera mount, marker detector)
pub mod eqpt;

/// Network module
pub mod net;

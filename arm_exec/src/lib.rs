//! # Arm library.
//!
//! This library allows the executables in the arm crate, and the benchmarks, to access the arm
//! modules.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Arm control module - sequences the pick and solves the arm kinematics
pub mod arm_ctrl;

/// Camera client - receives marker detections and commands the camera mount
#[cfg(feature = "cam")]
pub mod cam_client;

/// Global data store for the executables
pub mod data_store;

/// Frames module - relates the camera's detections to the arm base
pub mod frames;

/// Joint state cache - holds the latest complete joint feedback
pub mod joint_cache;

/// Mechanisms client - sends actuator demands to the arm driver and receives its feedback
#[cfg(feature = "mech")]
pub mod mech_client;

/// Simulated arm - stands in for the actuator driver when running offline
pub mod sim_arm;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Target period of one cycle.
///
/// Units: seconds
pub const CYCLE_PERIOD_S: f64 = 0.5;

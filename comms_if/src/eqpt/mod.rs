//! # Equipment Interface
//!
//! This module defines the interface structures which will be sent to and recieved from
//! equipment servers.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod cam;
pub mod mech;

//! # Camera Equipment Communications Module
//!
//! Marker detections published by the perception pipeline, and demands for the pan/tilt mount
//! the camera sits on.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A set of marker detections from one camera frame.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MarkerDetections {
    /// UTC timestamp at which the frame was acquired
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Name of the frame the poses are expressed in, normally the camera's optical frame.
    pub frame_id: String,

    /// All markers detected in the frame, possibly none.
    pub poses: Vec<MarkerPose>,
}

/// Pose of a single detected marker.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct MarkerPose {
    /// Position of the marker.
    ///
    /// Units: meters
    pub position_m: [f64; 3],

    /// Orientation of the marker as a quaternion in `[x, y, z, w]` order.
    pub orientation_q: [f64; 4],
}

/// Demand for the camera pan/tilt mount.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PanTiltDems {
    /// Units: degrees
    pub pitch_deg: f64,

    /// Units: degrees
    pub yaw_deg: f64,

    /// Slew speed, in the mount's own units (1 - 30).
    pub speed: u8,
}

//! Parameters for the simulated arm

use serde::Deserialize;

use comms_if::eqpt::mech::NUM_ARM_JOINTS;

/// Simulated arm parameters
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Maximum rate of each arm joint.
    ///
    /// Units: radians/second
    pub max_rate_rads: [f64; NUM_ARM_JOINTS],

    /// Simulated time advanced per step.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Arm position at power on.
    ///
    /// Units: radians
    pub initial_pos_rad: [f64; NUM_ARM_JOINTS],

    /// Number of entries in a complete joint sample.
    pub num_feedback_joints: usize,

    /// Finger separation with the gripper open and closed.
    ///
    /// Units: meters
    pub finger_open_m: f64,
    pub finger_closed_m: f64,

    /// Every Nth sample is truncated, as the real driver occasionally publishes partial samples.
    /// Zero disables this.
    #[serde(default)]
    pub partial_sample_every: u64,
}

//! # Arm control module
//!
//! Drives the px100 arm through the pick sequence. The module is split into:
//!
//! - `joint` - joint identifiers and the per-joint table of feedback indices, tolerances and
//!   limits,
//! - `kinematics` - forward and numerical inverse kinematics of the arm,
//! - `calibration` - lateral offset correction applied to accepted solutions,
//! - `confirm` - the position confirmation gate,
//! - `sequencer` - the pick state machine,
//! - `state` - the [`ArmCtrl`] wrapper used by the executive.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calibration;
mod confirm;
mod joint;
mod kinematics;
mod params;
mod sequencer;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use calibration::{CalibrationError, LateralBand, LateralOffsetTable};
pub use comms_if::eqpt::mech::NUM_ARM_JOINTS;
pub use confirm::{confirm_group, confirm_single, confirmed, Confirmation};
pub use joint::{ArmJoints, JointId, JointTable};
pub use kinematics::{
    desired_pose, pose_matrix, IkAttempt, IkError, IkTolerances, JointSolution, KinematicChain,
    PoseMatrix, Solver, Twist,
};
pub use params::*;
pub use sequencer::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur while building ArmCtrl.
#[derive(Debug, thiserror::Error)]
pub enum ArmCtrlError {
    #[error("Could not load the ArmCtrl parameters: {0}")]
    ParamLoad(#[from] util::params::LoadError),

    #[error("Invalid ArmCtrl parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid lateral offset calibration: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Invalid motion plan: {0}")]
    Plan(#[from] PlanError),
}

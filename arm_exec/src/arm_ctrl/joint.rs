//! Joint identifiers and the per-joint lookup table
//!
//! Every place that needs to know where a joint sits in the feedback sample, how close it must
//! get to its demand, or how far it may travel goes through [`JointTable`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use super::{ArmCtrlError, Params, NUM_ARM_JOINTS};
use util::maths::clamp;

pub use comms_if::eqpt::mech::ActId as JointId;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Table of `JointId -> (feedback index, tolerance, limits)`.
///
/// Only the arm joints carry a tolerance and limits, the gripper is exempt from both.
#[derive(Debug, Clone, Serialize)]
pub struct JointTable {
    feedback_index: [usize; NUM_ARM_JOINTS],
    gripper_feedback_index: usize,
    tolerance_rad: [f64; NUM_ARM_JOINTS],
    min_pos_rad: [f64; NUM_ARM_JOINTS],
    max_pos_rad: [f64; NUM_ARM_JOINTS],
}

/// A vector of arm joint positions in group order.
///
/// Units: radians
pub type ArmJoints = [f64; NUM_ARM_JOINTS];

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl JointTable {
    /// Build and validate the table from the ArmCtrl parameters.
    pub fn from_params(params: &Params) -> Result<Self, ArmCtrlError> {
        let indices = params
            .feedback_index
            .iter()
            .chain(std::iter::once(&params.gripper_feedback_index));

        for (i, idx) in indices.clone().enumerate() {
            if *idx >= params.num_feedback_joints {
                return Err(ArmCtrlError::InvalidParams(format!(
                    "feedback index {} is outside a sample of {} joints",
                    idx, params.num_feedback_joints
                )));
            }
            if indices.clone().skip(i + 1).any(|other| other == idx) {
                return Err(ArmCtrlError::InvalidParams(format!(
                    "feedback index {} is used by more than one joint",
                    idx
                )));
            }
        }

        for (i, id) in JointId::ARM.iter().enumerate() {
            if !(params.tolerance_rad[i] > 0.0) {
                return Err(ArmCtrlError::InvalidParams(format!(
                    "{} tolerance must be positive",
                    id
                )));
            }
            if !(params.min_pos_rad[i] <= params.max_pos_rad[i]) {
                return Err(ArmCtrlError::InvalidParams(format!(
                    "{} limits are inverted",
                    id
                )));
            }
        }

        Ok(Self {
            feedback_index: params.feedback_index,
            gripper_feedback_index: params.gripper_feedback_index,
            tolerance_rad: params.tolerance_rad,
            min_pos_rad: params.min_pos_rad,
            max_pos_rad: params.max_pos_rad,
        })
    }

    /// Index of the joint in a feedback sample.
    pub fn feedback_index(&self, id: JointId) -> usize {
        match id.arm_index() {
            Some(i) => self.feedback_index[i],
            None => self.gripper_feedback_index,
        }
    }

    /// Confirmation tolerance of the joint, `None` for the gripper.
    pub fn tolerance(&self, id: JointId) -> Option<f64> {
        id.arm_index().map(|i| self.tolerance_rad[i])
    }

    /// `(min, max)` position of the joint, `None` for the gripper.
    pub fn limits(&self, id: JointId) -> Option<(f64, f64)> {
        id.arm_index()
            .map(|i| (self.min_pos_rad[i], self.max_pos_rad[i]))
    }

    /// Clamp every joint onto its limits.
    pub fn clamp(&self, joints: &ArmJoints) -> ArmJoints {
        let mut out = *joints;
        for i in 0..NUM_ARM_JOINTS {
            out[i] = clamp(joints[i], self.min_pos_rad[i], self.max_pos_rad[i]);
        }
        out
    }
}

//! # Mechanisms Equipment Commands
//!
//! Demands sent to the arm's actuator driver and the joint feedback it publishes back.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of joints in the arm group (waist, shoulder, elbow, wrist angle).
pub const NUM_ARM_JOINTS: usize = 4;

/// Name of the joint group containing the arm joints, as understood by the actuator driver.
pub const ARM_GROUP_NAME: &str = "arm";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Demands that are sent from the MechClient to the actuator driver.
///
/// Every field is optional, an empty demand means nothing is commanded this cycle. Demands are
/// fire-and-forget, the only acknowledgement is the joint feedback that follows.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MechDems {
    /// Demand for a single named joint.
    pub single: Option<JointSingleDem>,

    /// Demand for the whole arm group.
    pub group: Option<JointGroupDem>,

    /// Effort demand for the gripper.
    pub gripper: Option<GripperDem>,
}

/// Position demand for one joint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct JointSingleDem {
    pub act_id: ActId,

    /// Units: radians
    pub pos_rad: f64,
}

/// Position demand for every joint in a group.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JointGroupDem {
    /// Name of the group, see [`ARM_GROUP_NAME`].
    pub name: String,

    /// Demanded positions in group order (waist, shoulder, elbow, wrist angle).
    ///
    /// Units: radians
    pub pos_rad: [f64; NUM_ARM_JOINTS],
}

/// Effort demand for the gripper.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GripperDem {
    /// Effort to apply, positive opens the gripper and negative closes it.
    ///
    /// Units: driver PWM effort
    pub effort: f64,

    /// Time the gripper should be left to settle before the next demand is issued.
    ///
    /// Units: seconds
    pub settle_s: f64,
}

/// Joint feedback published by the actuator driver.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JointStateMsg {
    /// UTC timestamp at which the joints were sampled
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Names of the joints in the order of `position`
    pub name: Vec<String>,

    /// Measured joint positions.
    ///
    /// Units: radians (gripper fingers in meters)
    pub position: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// IDs of the actuators which can be individually commanded on the arm.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ActId {
    Waist,
    Shoulder,
    Elbow,
    WristAngle,
    Gripper,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ActId {
    /// The arm joints in group order.
    pub const ARM: [ActId; NUM_ARM_JOINTS] =
        [ActId::Waist, ActId::Shoulder, ActId::Elbow, ActId::WristAngle];

    /// Name of the joint as used by the actuator driver.
    pub fn name(&self) -> &'static str {
        match self {
            ActId::Waist => "waist",
            ActId::Shoulder => "shoulder",
            ActId::Elbow => "elbow",
            ActId::WristAngle => "wrist_angle",
            ActId::Gripper => "gripper",
        }
    }

    /// Position of this joint in the arm group, or `None` for the gripper.
    pub fn arm_index(&self) -> Option<usize> {
        ActId::ARM.iter().position(|id| id == self)
    }
}

impl fmt::Display for ActId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl MechDems {
    /// Returns true if nothing is demanded.
    pub fn is_empty(&self) -> bool {
        self.single.is_none() && self.group.is_none() && self.gripper.is_none()
    }
}

impl JointGroupDem {
    /// Build a demand for the arm group.
    pub fn arm(pos_rad: [f64; NUM_ARM_JOINTS]) -> Self {
        Self {
            name: ARM_GROUP_NAME.into(),
            pos_rad,
        }
    }
}

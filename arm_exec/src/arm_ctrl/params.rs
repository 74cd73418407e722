//! Parameters structure for ArmCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::{calibration::LateralBand, JointId, NUM_ARM_JOINTS};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for Arm control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    // ---- SEQUENCE ----
    /// Ordered list of single joint moves performed while approaching the target.
    pub plan: Vec<JointId>,

    /// Arm group position the sequence starts from.
    ///
    /// Units: radians
    pub home_pos_rad: [f64; NUM_ARM_JOINTS],

    /// Arm group position moved to straight after grasping.
    ///
    /// Units: radians
    pub retract_pos_rad: [f64; NUM_ARM_JOINTS],

    /// Arm group position the sequence finishes in.
    ///
    /// Units: radians
    pub stow_pos_rad: [f64; NUM_ARM_JOINTS],

    /// Number of ticks spent on one step before a stall warning is logged. Control is not
    /// affected.
    pub stall_warn_ticks: u64,

    // ---- JOINTS ----
    /// Number of entries in a complete joint feedback sample, including the gripper.
    pub num_feedback_joints: usize,

    /// Index of each arm joint in the feedback sample, in group order.
    pub feedback_index: [usize; NUM_ARM_JOINTS],

    /// Index of the gripper in the feedback sample.
    pub gripper_feedback_index: usize,

    /// Confirmation tolerance of each arm joint.
    ///
    /// Units: radians
    pub tolerance_rad: [f64; NUM_ARM_JOINTS],

    /// Lowest allowed position of each arm joint.
    ///
    /// Units: radians
    pub min_pos_rad: [f64; NUM_ARM_JOINTS],

    /// Highest allowed position of each arm joint.
    ///
    /// Units: radians
    pub max_pos_rad: [f64; NUM_ARM_JOINTS],

    // ---- KINEMATICS ----
    /// Screw axes of the arm joints in the space frame at the home configuration, each as
    /// `[wx, wy, wz, vx, vy, vz]`.
    pub screw_axes: [[f64; 6]; NUM_ARM_JOINTS],

    /// Position of the end effector at the zero configuration, in the base frame.
    ///
    /// Units: meters
    pub home_ee_pos_m: [f64; 3],

    /// Seed configurations tried by the inverse kinematics, in order.
    ///
    /// Units: radians
    pub ik_seeds_rad: Vec<[f64; NUM_ARM_JOINTS]>,

    /// Orientation error below which the inverse kinematics has converged.
    ///
    /// Units: radians
    pub ik_orientation_tol_rad: f64,

    /// Position error below which the inverse kinematics has converged.
    ///
    /// Units: meters
    pub ik_position_tol_m: f64,

    /// Maximum number of Newton-Raphson iterations per seed.
    pub ik_max_iters: usize,

    // ---- CALIBRATION ----
    /// Lateral offset bands applied to inverse kinematics solutions.
    pub lateral_offsets: Vec<LateralBand>,

    // ---- GRIPPER ----
    /// Effort which opens the gripper.
    pub gripper_open_effort: f64,

    /// Pressure used to grasp the object, in the range (0, 1].
    pub gripper_grasp_pressure: f64,

    /// Effort range the grasp pressure is mapped onto.
    pub gripper_effort_range: [f64; 2],

    /// Time left for the gripper to settle after each demand.
    ///
    /// Units: seconds
    pub gripper_settle_s: f64,

    // ---- CAMERA MOUNT ----
    /// Units: degrees
    pub pan_tilt_pitch_deg: f64,

    /// Units: degrees
    pub pan_tilt_yaw_deg: f64,

    pub pan_tilt_speed: u8,
}

impl Params {
    /// Magnitude of the effort demanded when grasping. Closing efforts are negative on the wire.
    pub fn grasp_effort(&self) -> f64 {
        util::maths::lin_map(
            (0.0, 1.0),
            (self.gripper_effort_range[0], self.gripper_effort_range[1]),
            self.gripper_grasp_pressure,
        )
    }

    /// Return the parameters shipped in `params/arm_ctrl.toml`.
    #[cfg(test)]
    pub(crate) fn shipped() -> Self {
        util::params::from_str(include_str!("../../../params/arm_ctrl.toml"))
            .expect("shipped arm_ctrl.toml is invalid")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_shipped_params() {
        let p = Params::shipped();

        assert_eq!(
            p.plan,
            vec![
                JointId::Waist,
                JointId::Waist,
                JointId::Shoulder,
                JointId::WristAngle,
                JointId::Elbow
            ]
        );
        assert_eq!(p.home_pos_rad, [-1.5, 0.0, -1.3, -0.2]);
        assert_eq!(p.num_feedback_joints, 7);
        assert_eq!(p.ik_seeds_rad.len(), 3);
        assert_eq!(p.lateral_offsets.len(), 4);
        assert!((p.grasp_effort() - 238.0).abs() < 1e-9);
    }
}

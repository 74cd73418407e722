//! Position confirmation gate
//!
//! A move is complete once the measured position of every tracked joint is strictly within its
//! tolerance of the demand. There is no timeout, a joint which never gets there holds the
//! sequence on that step.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use super::joint::{ArmJoints, JointId, JointTable};
use crate::joint_cache::JointSample;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Result of checking a move against the latest feedback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Confirmation {
    /// Every tracked joint is within tolerance.
    Confirmed,

    /// The listed joints are still outside tolerance, in group order.
    Moving(Vec<JointId>),

    /// No complete feedback sample is available yet.
    NoFeedback,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// `|commanded - measured| < tolerance`.
///
/// NaN on either side is never confirmed.
pub fn confirmed(commanded: f64, measured: f64, tolerance: f64) -> bool {
    (commanded - measured).abs() < tolerance
}

/// Check a single joint move. The gripper is always confirmed.
pub fn confirm_single(
    table: &JointTable,
    id: JointId,
    commanded: f64,
    sample: Option<&JointSample>,
) -> Confirmation {
    let sample = match sample {
        Some(s) => s,
        None => return Confirmation::NoFeedback,
    };

    let tolerance = match table.tolerance(id) {
        Some(t) => t,
        None => return Confirmation::Confirmed,
    };

    match sample.position(table, id) {
        Some(measured) if confirmed(commanded, measured, tolerance) => Confirmation::Confirmed,
        _ => Confirmation::Moving(vec![id]),
    }
}

/// Check a move of the whole arm group, only confirmed once all four arm joints are within their
/// tolerances.
pub fn confirm_group(
    table: &JointTable,
    commanded: &ArmJoints,
    sample: Option<&JointSample>,
) -> Confirmation {
    if sample.is_none() {
        return Confirmation::NoFeedback;
    }

    let moving: Vec<JointId> = JointId::ARM
        .iter()
        .zip(commanded.iter())
        .filter(|(id, cmd)| confirm_single(table, **id, **cmd, sample) != Confirmation::Confirmed)
        .map(|(id, _)| *id)
        .collect();

    if moving.is_empty() {
        Confirmation::Confirmed
    } else {
        Confirmation::Moving(moving)
    }
}

impl Confirmation {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Confirmation::Confirmed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arm_ctrl::Params;

    fn table() -> JointTable {
        JointTable::from_params(&Params::shipped()).unwrap()
    }

    fn sample(positions: [f64; 7]) -> JointSample {
        JointSample {
            positions: positions.to_vec(),
            timestamp_s: 0.0,
        }
    }

    #[test]
    fn test_confirmed_is_open_interval() {
        let cmd = 0.5;
        let tol = 0.15;

        assert!(confirmed(cmd, cmd, tol));
        assert!(confirmed(cmd, cmd + 0.1499, tol));
        assert!(confirmed(cmd, cmd - 0.1499, tol));

        // Both edges and beyond are excluded
        assert!(!confirmed(0.0, 0.15, tol));
        assert!(!confirmed(0.0, -0.15, tol));
        assert!(!confirmed(cmd, cmd + 0.2, tol));
        assert!(!confirmed(cmd, f64::NAN, tol));

        // Monotonic: every sample between two confirmed samples is confirmed
        let inside: Vec<f64> = (-200..=200)
            .map(|i| cmd + i as f64 * 0.001)
            .filter(|m| confirmed(cmd, *m, tol))
            .collect();
        for w in inside.windows(2) {
            assert!((w[1] - w[0] - 0.001).abs() < 1e-9);
        }
        assert!(inside.iter().all(|m| (m - cmd).abs() < tol));
    }

    #[test]
    fn test_single_uses_joint_index() {
        let table = table();
        let s = sample([0.0, 0.5, 1.0, -0.3, 0.02, -0.02, 0.0]);

        assert_eq!(
            confirm_single(&table, JointId::Elbow, 1.1, Some(&s)),
            Confirmation::Confirmed
        );
        assert_eq!(
            confirm_single(&table, JointId::WristAngle, 0.0, Some(&s)),
            Confirmation::Moving(vec![JointId::WristAngle])
        );
        assert_eq!(
            confirm_single(&table, JointId::Waist, 0.0, None),
            Confirmation::NoFeedback
        );
    }

    #[test]
    fn test_gripper_exempt() {
        let table = table();
        let s = sample([0.0; 7]);

        assert!(confirm_single(&table, JointId::Gripper, 350.0, Some(&s)).is_confirmed());
    }

    #[test]
    fn test_group_lists_all_moving_joints() {
        let table = table();
        let s = sample([-1.5, 0.3, -1.3, 0.5, 0.0, 0.0, 0.0]);

        assert_eq!(
            confirm_group(&table, &[-1.5, 0.0, -1.3, -0.2], Some(&s)),
            Confirmation::Moving(vec![JointId::Shoulder, JointId::WristAngle])
        );
        assert_eq!(
            confirm_group(&table, &[-1.45, 0.29, -1.2, 0.4], Some(&s)),
            Confirmation::Confirmed
        );
        assert_eq!(
            confirm_group(&table, &[0.0; 4], None),
            Confirmation::NoFeedback
        );
    }
}

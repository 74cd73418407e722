//! # Kinematics
//!
//! Forward and inverse kinematics of the arm, using the product of exponentials formulation.
//!
//! The chain is described by one screw axis per joint, expressed in the base (space) frame at
//! the zero configuration, and the pose of the end effector at that configuration (`M`). Forward
//! kinematics is then
//!
//! ```text
//! T(theta) = exp([S1] theta1) * ... * exp([S4] theta4) * M
//! ```
//!
//! Inverse kinematics is solved numerically with Newton-Raphson iterations on the space frame
//! twist error, starting from each seed configuration in turn. The first seed to converge is
//! used.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use nalgebra::{
    Isometry3, Matrix3, Matrix6, Matrix6x4, Translation3, UnitQuaternion, Vector3, Vector4,
    Vector6, SVD,
};
use serde::Serialize;

use super::{
    calibration::LateralOffsetTable,
    joint::{ArmJoints, JointTable},
    ArmCtrlError, Params, NUM_ARM_JOINTS,
};
use util::maths::wrap_to_pi;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Norms below this are treated as zero.
const NEAR_ZERO: f64 = 1e-6;

/// Singular values below this are dropped from the Jacobian pseudo-inverse.
const PINV_EPS: f64 = 1e-12;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A rigid transform, the 4x4 homogeneous matrix of the end effector in the base frame.
pub type PoseMatrix = Isometry3<f64>;

/// A twist or screw axis `[wx, wy, wz, vx, vy, vz]`.
pub type Twist = Vector6<f64>;

/// Kinematic description of a 4 joint serial chain.
#[derive(Debug, Clone)]
pub struct KinematicChain {
    screws: [Twist; NUM_ARM_JOINTS],
    home: PoseMatrix,
}

/// Convergence criteria of the numerical inverse kinematics.
#[derive(Debug, Clone, Copy)]
pub struct IkTolerances {
    /// Units: radians
    pub orientation_rad: f64,

    /// Units: meters
    pub position_m: f64,

    pub max_iters: usize,
}

/// The result of running the inverse kinematics from one seed.
#[derive(Debug, Clone, Copy)]
pub struct IkAttempt {
    /// Raw joint angles after the last iteration, not wrapped or clamped.
    pub joints_rad: ArmJoints,

    pub converged: bool,

    pub iterations: usize,
}

/// An accepted inverse kinematics solution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JointSolution {
    /// Units: radians
    pub joints_rad: ArmJoints,

    /// Index of the seed which converged.
    pub seed_index: usize,

    pub iterations: usize,
}

/// Kinematics adapter, combining the chain with the seeds, joint limits and calibration used by
/// the sequencer.
#[derive(Debug, Clone)]
pub struct Solver {
    chain: KinematicChain,
    seeds: Vec<ArmJoints>,
    tolerances: IkTolerances,
    joints: JointTable,
    offsets: LateralOffsetTable,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum IkError {
    #[error("No seed converged, last attempt was {last:?}")]
    Unreachable {
        /// The raw result of the final seed, for diagnostics only.
        last: ArmJoints,
    },

    #[error("No seeds were provided to the inverse kinematics")]
    NoSeeds,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl KinematicChain {
    pub fn new(screws: &[[f64; 6]; NUM_ARM_JOINTS], home_ee_pos_m: [f64; 3]) -> Self {
        let mut s = [Twist::zeros(); NUM_ARM_JOINTS];
        for (i, axis) in screws.iter().enumerate() {
            s[i] = Twist::from_row_slice(axis);
        }

        Self {
            screws: s,
            home: PoseMatrix::from_parts(
                Translation3::new(home_ee_pos_m[0], home_ee_pos_m[1], home_ee_pos_m[2]),
                UnitQuaternion::identity(),
            ),
        }
    }

    /// The Interbotix PincherX 100.
    pub fn px100() -> Self {
        Self::new(
            &[
                [0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, -0.0931, 0.0, 0.0],
                [0.0, 1.0, 0.0, -0.1931, 0.0, 0.035],
                [0.0, 1.0, 0.0, -0.1931, 0.0, 0.135],
            ],
            [0.248575, 0.0, 0.1931],
        )
    }

    /// Pose of the end effector in the base frame for the given joint angles.
    pub fn forward(&self, joints: &ArmJoints) -> PoseMatrix {
        let mut t = PoseMatrix::identity();
        for (screw, theta) in self.screws.iter().zip(joints.iter()) {
            t *= exp6(screw, *theta);
        }
        t * self.home
    }

    /// Jacobian mapping joint rates onto the space frame twist of the end effector.
    pub fn space_jacobian(&self, joints: &ArmJoints) -> Matrix6x4<f64> {
        let mut jac = Matrix6x4::zeros();
        let mut t = PoseMatrix::identity();

        for i in 0..NUM_ARM_JOINTS {
            if i > 0 {
                t *= exp6(&self.screws[i - 1], joints[i - 1]);
            }
            jac.set_column(i, &(adjoint(&t) * self.screws[i]));
        }

        jac
    }

    /// Run Newton-Raphson iterations from `seed` towards `desired`.
    pub fn ik_from_seed(
        &self,
        desired: &PoseMatrix,
        seed: &ArmJoints,
        tolerances: &IkTolerances,
    ) -> IkAttempt {
        let mut theta = Vector4::from(*seed);
        let mut iterations = 0;

        let mut err = self.twist_error(&to_array(&theta), desired);
        let mut converged = within_tolerance(&err, tolerances);

        while !converged && iterations < tolerances.max_iters {
            let svd = SVD::new(self.space_jacobian(&to_array(&theta)), true, true);
            let pinv = match svd.pseudo_inverse(PINV_EPS) {
                Ok(p) => p,
                Err(e) => {
                    trace!("Jacobian pseudo-inverse failed: {}", e);
                    break;
                }
            };

            theta += pinv * err;
            iterations += 1;

            err = self.twist_error(&to_array(&theta), desired);
            converged = within_tolerance(&err, tolerances);

            trace!(
                "IK iteration {}: theta = {:?}, |w| = {:.5}, |v| = {:.5}",
                iterations,
                theta.as_slice(),
                omega_norm(&err),
                velocity_norm(&err)
            );
        }

        IkAttempt {
            joints_rad: to_array(&theta),
            converged,
            iterations,
        }
    }

    /// Space frame twist taking the current end effector pose onto `desired` in unit time.
    fn twist_error(&self, joints: &ArmJoints, desired: &PoseMatrix) -> Twist {
        let current = self.forward(joints);
        adjoint(&current) * log6(&(current.inverse() * desired))
    }
}

impl Solver {
    pub fn new(
        chain: KinematicChain,
        seeds: Vec<ArmJoints>,
        tolerances: IkTolerances,
        joints: JointTable,
        offsets: LateralOffsetTable,
    ) -> Self {
        Self {
            chain,
            seeds,
            tolerances,
            joints,
            offsets,
        }
    }

    /// Build the solver from the ArmCtrl parameters.
    pub fn from_params(params: &Params, joints: JointTable) -> Result<Self, ArmCtrlError> {
        if params.ik_seeds_rad.is_empty() {
            return Err(ArmCtrlError::InvalidParams(
                "at least one IK seed is required".into(),
            ));
        }
        if !(params.ik_orientation_tol_rad > 0.0 && params.ik_position_tol_m > 0.0) {
            return Err(ArmCtrlError::InvalidParams(
                "IK tolerances must be positive".into(),
            ));
        }

        Ok(Self::new(
            KinematicChain::new(&params.screw_axes, params.home_ee_pos_m),
            params.ik_seeds_rad.clone(),
            IkTolerances {
                orientation_rad: params.ik_orientation_tol_rad,
                position_m: params.ik_position_tol_m,
                max_iters: params.ik_max_iters,
            },
            joints,
            LateralOffsetTable::new(params.lateral_offsets.clone())?,
        ))
    }

    pub fn chain(&self) -> &KinematicChain {
        &self.chain
    }

    pub fn seeds(&self) -> &[ArmJoints] {
        &self.seeds
    }

    /// Solve for `desired` trying each seed in order, the first converging seed wins.
    ///
    /// An accepted solution is wrapped into (-pi, pi] and then clamped onto the joint limits.
    /// Clamping is lossy, a solution just outside the limits is moved onto them rather than
    /// rejected.
    pub fn inverse(
        &self,
        desired: &PoseMatrix,
        seeds: &[ArmJoints],
    ) -> Result<JointSolution, IkError> {
        let mut last = None;

        for (seed_index, seed) in seeds.iter().enumerate() {
            let attempt = self.chain.ik_from_seed(desired, seed, &self.tolerances);

            if attempt.converged {
                let mut wrapped = attempt.joints_rad;
                for j in wrapped.iter_mut() {
                    *j = wrap_to_pi(*j);
                }

                return Ok(JointSolution {
                    joints_rad: self.joints.clamp(&wrapped),
                    seed_index,
                    iterations: attempt.iterations,
                });
            }

            trace!("IK seed {} did not converge", seed_index);
            last = Some(attempt.joints_rad);
        }

        match last {
            Some(last) => Err(IkError::Unreachable { last }),
            None => Err(IkError::NoSeeds),
        }
    }

    /// Solve for `desired` with the configured seeds and apply the lateral offset correction for
    /// a target at lateral position `lateral_y_m`.
    pub fn solve(
        &self,
        desired: &PoseMatrix,
        lateral_y_m: f64,
    ) -> Result<JointSolution, IkError> {
        self.solve_with_seeds(desired, lateral_y_m, &self.seeds)
    }

    /// As [`Solver::solve`] but with a caller provided list of seeds, for example a single
    /// custom guess.
    pub fn solve_with_seeds(
        &self,
        desired: &PoseMatrix,
        lateral_y_m: f64,
        seeds: &[ArmJoints],
    ) -> Result<JointSolution, IkError> {
        let mut sol = self.inverse(desired, seeds)?;
        sol.joints_rad = self.offsets.apply(&sol.joints_rad, lateral_y_m);
        Ok(sol)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build a pose which is a pure rotation of `yaw_rad` about the vertical axis followed by
/// `translation_m`.
pub fn pose_matrix(yaw_rad: f64, translation_m: &Vector3<f64>) -> PoseMatrix {
    PoseMatrix::new(*translation_m, Vector3::z() * yaw_rad)
}

/// Desired end effector pose for a target position in the base frame, facing along the line from
/// the base to the target.
pub fn desired_pose(target_m: &Vector3<f64>) -> PoseMatrix {
    pose_matrix(target_m.y.atan2(target_m.x), target_m)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Matrix exponential of the screw axis `screw` rotated by `theta`.
fn exp6(screw: &Twist, theta: f64) -> PoseMatrix {
    let w = Vector3::new(screw[0], screw[1], screw[2]);
    let v = Vector3::new(screw[3], screw[4], screw[5]);

    let w_norm = w.norm();

    // Pure translation
    if w_norm < NEAR_ZERO {
        return PoseMatrix::from_parts(Translation3::from(v * theta), UnitQuaternion::identity());
    }

    let omega = w / w_norm;
    let v = v / w_norm;
    let th = theta * w_norm;
    let omg = omega.cross_matrix();

    let g = Matrix3::identity() * th + omg * (1.0 - th.cos()) + omg * omg * (th - th.sin());

    PoseMatrix::from_parts(
        Translation3::from(g * v),
        UnitQuaternion::from_scaled_axis(omega * th),
    )
}

/// Matrix logarithm of a rigid transform, returned as the twist `[w, v] * theta`.
fn log6(t: &PoseMatrix) -> Twist {
    let w_theta = t.rotation.scaled_axis();
    let p = t.translation.vector;
    let theta = w_theta.norm();

    let v = if theta < NEAR_ZERO {
        p
    } else {
        let omg = w_theta.cross_matrix();
        let k = (1.0 / theta - 0.5 / (theta / 2.0).tan()) / theta;
        (Matrix3::identity() - omg * 0.5 + omg * omg * k) * p
    };

    Twist::new(w_theta.x, w_theta.y, w_theta.z, v.x, v.y, v.z)
}

/// Adjoint representation of a rigid transform.
fn adjoint(t: &PoseMatrix) -> Matrix6<f64> {
    let r = t.rotation.to_rotation_matrix().into_inner();
    let pr = t.translation.vector.cross_matrix() * r;

    let mut ad = Matrix6::zeros();
    for i in 0..3 {
        for j in 0..3 {
            ad[(i, j)] = r[(i, j)];
            ad[(i + 3, j + 3)] = r[(i, j)];
            ad[(i + 3, j)] = pr[(i, j)];
        }
    }
    ad
}

fn within_tolerance(err: &Twist, tolerances: &IkTolerances) -> bool {
    omega_norm(err) <= tolerances.orientation_rad && velocity_norm(err) <= tolerances.position_m
}

fn omega_norm(t: &Twist) -> f64 {
    (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt()
}

fn velocity_norm(t: &Twist) -> f64 {
    (t[3] * t[3] + t[4] * t[4] + t[5] * t[5]).sqrt()
}

fn to_array(v: &Vector4<f64>) -> ArmJoints {
    [v[0], v[1], v[2], v[3]]
}

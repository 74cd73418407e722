//! # Motion sequencer
//!
//! The pick sequence is a small state machine stepped once per control cycle:
//!
//! ```text
//! HOMING -> APPROACHING (one step per plan move) -> RETRACTING -> STOWING -> DONE
//! ```
//!
//! - `Homing` commands the home group position and the camera mount every tick. Once the group
//!   is confirmed the gripper is opened.
//! - `Approaching` re-resolves the target and re-solves the inverse kinematics on every tick,
//!   then commands the single joint of the current plan step. The first successful solution of a
//!   step is kept as the working solution for the rest of that step. When the last step is
//!   confirmed the gripper grasps.
//! - `Retracting` and `Stowing` command fixed group positions.
//!
//! A tick which cannot resolve the target or solve the kinematics is blocked: no demands are
//! issued and the state is left unchanged, so it is simply retried on the next tick. Nothing
//! times out.
//!
//! The sequencer holds no mutable state itself, the state is passed in and the next state
//! returned.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::{
    cam::PanTiltDems,
    mech::{GripperDem, JointGroupDem, JointSingleDem, MechDems},
};
use nalgebra::Vector3;
use serde::Serialize;
use std::mem;

use super::{
    confirm::{confirm_group, confirm_single, Confirmation},
    joint::{ArmJoints, JointId, JointTable},
    kinematics::{desired_pose, IkError, JointSolution, Solver},
    ArmCtrlError, Params,
};
use crate::{
    frames::{FrameError, TargetSource},
    joint_cache::JointSample,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// State carried between ticks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SequencerState {
    pub phase: Phase,

    /// Index of the current plan step, only meaningful while approaching.
    pub step: usize,

    /// Solution adopted for the current plan step.
    pub working: Option<JointSolution>,
}

/// A validated, ordered list of single joint moves.
#[derive(Debug, Clone)]
pub struct MotionPlan {
    moves: Vec<PlanMove>,
}

#[derive(Debug, Clone, Copy)]
struct PlanMove {
    joint: JointId,
    arm_index: usize,
}

/// Inputs to one tick.
pub struct TickInput<'a> {
    /// Session time of the tick.
    ///
    /// Units: seconds
    pub now_s: f64,

    /// The latest complete joint sample, if any.
    pub sample: Option<&'a JointSample>,

    /// Source of the target position, only queried while approaching.
    pub target: &'a dyn TargetSource,
}

/// Demands produced by one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArmDems {
    pub mech: MechDems,

    pub pan_tilt: Option<PanTiltDems>,
}

/// Everything produced by one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub dems: ArmDems,

    pub outcome: TickOutcome,

    /// Result of the confirmation check, if one was made.
    pub confirmation: Option<Confirmation>,

    /// Target position used this tick, in the base frame.
    ///
    /// Units: meters
    pub target_m: Option<[f64; 3]>,

    /// Solution computed this tick, after calibration.
    pub solution: Option<JointSolution>,
}

/// The motion sequencer.
#[derive(Debug, Clone)]
pub struct Sequencer {
    table: JointTable,
    plan: MotionPlan,
    solver: Solver,

    home_pos_rad: ArmJoints,
    retract_pos_rad: ArmJoints,
    stow_pos_rad: ArmJoints,

    gripper_open: GripperDem,
    gripper_grasp: GripperDem,
    pan_tilt: PanTiltDems,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Homing,
    Approaching,
    Retracting,
    Stowing,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The phase or step changed.
    Advanced,

    /// Demands were issued but the move is not yet confirmed.
    Waiting,

    /// The tick could not be completed and will be retried.
    Blocked(TickError),

    /// The sequence is complete, nothing was done.
    Finished,
}

/// Recoverable per-tick failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TickError {
    #[error("Target transform unavailable: {0}")]
    TransformUnavailable(FrameError),

    #[error("Target unreachable: {0}")]
    IkUnreachable(IkError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("The motion plan is empty")]
    Empty,

    #[error("Plan step {0} moves {1}, which is not an arm joint")]
    NotAnArmJoint(usize, JointId),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Phase {
    fn default() -> Self {
        Phase::Homing
    }
}

impl MotionPlan {
    pub fn new(joints: &[JointId]) -> Result<Self, PlanError> {
        if joints.is_empty() {
            return Err(PlanError::Empty);
        }

        let moves = joints
            .iter()
            .enumerate()
            .map(|(i, joint)| match joint.arm_index() {
                Some(arm_index) => Ok(PlanMove {
                    joint: *joint,
                    arm_index,
                }),
                None => Err(PlanError::NotAnArmJoint(i, *joint)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { moves })
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Joint moved by the given step.
    pub fn joint(&self, step: usize) -> Option<JointId> {
        self.moves.get(step).map(|m| m.joint)
    }
}

impl ArmDems {
    fn group(pos_rad: ArmJoints) -> Self {
        Self {
            mech: MechDems {
                group: Some(JointGroupDem::arm(pos_rad)),
                ..Default::default()
            },
            pan_tilt: None,
        }
    }

    /// Time to wait for the gripper after sending these demands.
    ///
    /// Units: seconds
    pub fn settle_s(&self) -> f64 {
        self.mech.gripper.map(|g| g.settle_s).unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.mech.is_empty() && self.pan_tilt.is_none()
    }
}

impl TickOutput {
    fn new(dems: ArmDems, outcome: TickOutcome, confirmation: Confirmation) -> Self {
        Self {
            dems,
            outcome,
            confirmation: Some(confirmation),
            target_m: None,
            solution: None,
        }
    }

    fn blocked(error: TickError, target_m: Option<&Vector3<f64>>) -> Self {
        Self {
            dems: ArmDems::default(),
            outcome: TickOutcome::Blocked(error),
            confirmation: None,
            target_m: target_m.map(|t| [t.x, t.y, t.z]),
            solution: None,
        }
    }
}

impl TickError {
    /// True if both errors come from the same failure, ignoring values such as timestamps or the
    /// last IK attempt which change from tick to tick.
    pub fn same_condition(&self, other: &TickError) -> bool {
        match (self, other) {
            (TickError::TransformUnavailable(a), TickError::TransformUnavailable(b)) => {
                mem::discriminant(a) == mem::discriminant(b)
            }
            (TickError::IkUnreachable(a), TickError::IkUnreachable(b)) => {
                mem::discriminant(a) == mem::discriminant(b)
            }
            _ => false,
        }
    }
}

impl Sequencer {
    /// Build the sequencer from the ArmCtrl parameters.
    pub fn from_params(
        params: &Params,
        table: JointTable,
        solver: Solver,
    ) -> Result<Self, ArmCtrlError> {
        let settle_s = params.gripper_settle_s.max(0.0);

        Ok(Self {
            plan: MotionPlan::new(&params.plan)?,
            table,
            solver,
            home_pos_rad: params.home_pos_rad,
            retract_pos_rad: params.retract_pos_rad,
            stow_pos_rad: params.stow_pos_rad,
            gripper_open: GripperDem {
                effort: params.gripper_open_effort,
                settle_s,
            },
            gripper_grasp: GripperDem {
                effort: -params.grasp_effort(),
                settle_s,
            },
            pan_tilt: PanTiltDems {
                pitch_deg: params.pan_tilt_pitch_deg,
                yaw_deg: params.pan_tilt_yaw_deg,
                speed: params.pan_tilt_speed,
            },
        })
    }

    pub fn plan(&self) -> &MotionPlan {
        &self.plan
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    /// Perform one tick, returning the next state and the demands to send.
    pub fn tick(
        &self,
        state: &SequencerState,
        input: &TickInput,
    ) -> (SequencerState, TickOutput) {
        match state.phase {
            Phase::Homing => self.tick_homing(state, input),
            Phase::Approaching => self.tick_approaching(state, input),
            Phase::Retracting => {
                self.tick_group(state, input, self.retract_pos_rad, Phase::Stowing)
            }
            Phase::Stowing => self.tick_group(state, input, self.stow_pos_rad, Phase::Done),
            Phase::Done => (
                state.clone(),
                TickOutput {
                    dems: ArmDems::default(),
                    outcome: TickOutcome::Finished,
                    confirmation: None,
                    target_m: None,
                    solution: None,
                },
            ),
        }
    }

    fn tick_homing(&self, state: &SequencerState, input: &TickInput) -> (SequencerState, TickOutput) {
        let mut dems = ArmDems::group(self.home_pos_rad);
        dems.pan_tilt = Some(self.pan_tilt);

        let confirmation = confirm_group(&self.table, &self.home_pos_rad, input.sample);

        if confirmation.is_confirmed() {
            dems.mech.gripper = Some(self.gripper_open);
            (
                next_phase(Phase::Approaching),
                TickOutput::new(dems, TickOutcome::Advanced, confirmation),
            )
        } else {
            (
                state.clone(),
                TickOutput::new(dems, TickOutcome::Waiting, confirmation),
            )
        }
    }

    fn tick_approaching(
        &self,
        state: &SequencerState,
        input: &TickInput,
    ) -> (SequencerState, TickOutput) {
        let mv = match self.plan.moves.get(state.step) {
            Some(mv) => *mv,
            // Only reachable with a hand-built state, treat the plan as complete
            None => return self.finish_approach(ArmDems::default(), Confirmation::Confirmed),
        };

        let target = match input.target.resolve(input.now_s) {
            Ok(t) => t,
            Err(e) => {
                return (
                    state.clone(),
                    TickOutput::blocked(TickError::TransformUnavailable(e), None),
                )
            }
        };

        let solution = match self.solver.solve(&desired_pose(&target), target.y) {
            Ok(s) => s,
            Err(e) => {
                return (
                    state.clone(),
                    TickOutput::blocked(TickError::IkUnreachable(e), Some(&target)),
                )
            }
        };

        let working = state.working.unwrap_or(solution);
        let cmd = working.joints_rad[mv.arm_index];

        let dems = ArmDems {
            mech: MechDems {
                single: Some(JointSingleDem {
                    act_id: mv.joint,
                    pos_rad: cmd,
                }),
                ..Default::default()
            },
            pan_tilt: None,
        };

        let confirmation = confirm_single(&self.table, mv.joint, cmd, input.sample);

        let (next, mut output) = if !confirmation.is_confirmed() {
            (
                SequencerState {
                    phase: Phase::Approaching,
                    step: state.step,
                    working: Some(working),
                },
                TickOutput::new(dems, TickOutcome::Waiting, confirmation),
            )
        } else if state.step + 1 >= self.plan.len() {
            self.finish_approach(dems, confirmation)
        } else {
            (
                SequencerState {
                    phase: Phase::Approaching,
                    step: state.step + 1,
                    working: None,
                },
                TickOutput::new(dems, TickOutcome::Advanced, confirmation),
            )
        };

        output.target_m = Some([target.x, target.y, target.z]);
        output.solution = Some(solution);

        (next, output)
    }

    /// Grasp and move on to retracting.
    fn finish_approach(
        &self,
        mut dems: ArmDems,
        confirmation: Confirmation,
    ) -> (SequencerState, TickOutput) {
        dems.mech.gripper = Some(self.gripper_grasp);
        (
            next_phase(Phase::Retracting),
            TickOutput::new(dems, TickOutcome::Advanced, confirmation),
        )
    }

    fn tick_group(
        &self,
        state: &SequencerState,
        input: &TickInput,
        pos_rad: ArmJoints,
        next: Phase,
    ) -> (SequencerState, TickOutput) {
        let dems = ArmDems::group(pos_rad);
        let confirmation = confirm_group(&self.table, &pos_rad, input.sample);

        if confirmation.is_confirmed() {
            (
                next_phase(next),
                TickOutput::new(dems, TickOutcome::Advanced, confirmation),
            )
        } else {
            (
                state.clone(),
                TickOutput::new(dems, TickOutcome::Waiting, confirmation),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn next_phase(phase: Phase) -> SequencerState {
    SequencerState {
        phase,
        step: 0,
        working: None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frames::FrameError;
    use std::cell::Cell;

    /// A target source returning a fixed position, or nothing.
    struct FixedTarget(Cell<Option<[f64; 3]>>);

    impl FixedTarget {
        fn at(x: f64, y: f64, z: f64) -> Self {
            Self(Cell::new(Some([x, y, z])))
        }

        fn none() -> Self {
            Self(Cell::new(None))
        }
    }

    impl TargetSource for FixedTarget {
        fn resolve(&self, _now_s: f64) -> Result<Vector3<f64>, FrameError> {
            match self.0.get() {
                Some(p) => Ok(Vector3::from(p)),
                None => Err(FrameError::UnknownFrame("object_frame".into())),
            }
        }
    }

    fn sequencer() -> Sequencer {
        let params = Params::shipped();
        let table = JointTable::from_params(&params).unwrap();
        let solver = Solver::from_params(&params, table.clone()).unwrap();
        Sequencer::from_params(&params, table, solver).unwrap()
    }

    /// A complete sample with the arm at `arm` and the gripper closed.
    fn sample_at(arm: &ArmJoints) -> JointSample {
        JointSample {
            positions: vec![arm[0], arm[1], arm[2], arm[3], 0.0, 0.0, 0.0],
            timestamp_s: 0.0,
        }
    }

    fn approaching(step: usize) -> SequencerState {
        SequencerState {
            phase: Phase::Approaching,
            step,
            working: None,
        }
    }

    #[test]
    fn test_homing_waits_then_opens_gripper() {
        let seq = sequencer();
        let target = FixedTarget::none();
        let state = SequencerState::default();
        let far = sample_at(&[3.0; 4]);

        // No feedback at all never confirms
        let (next, out) = seq.tick(
            &state,
            &TickInput {
                now_s: 0.0,
                sample: None,
                target: &target,
            },
        );
        assert_eq!(next, state);
        assert_eq!(out.outcome, TickOutcome::Waiting);
        assert_eq!(out.confirmation, Some(Confirmation::NoFeedback));
        assert_eq!(
            out.dems.mech.group,
            Some(JointGroupDem::arm([-1.5, 0.0, -1.3, -0.2]))
        );
        assert_eq!(out.dems.pan_tilt.map(|p| p.pitch_deg), Some(13.0));
        assert_eq!(out.dems.mech.gripper, None);

        let (next, _) = seq.tick(
            &state,
            &TickInput {
                now_s: 0.5,
                sample: Some(&far),
                target: &target,
            },
        );
        assert_eq!(next.phase, Phase::Homing);

        let home = sample_at(&[-1.5, 0.0, -1.3, -0.2]);
        let (next, out) = seq.tick(
            &state,
            &TickInput {
                now_s: 1.0,
                sample: Some(&home),
                target: &target,
            },
        );
        assert_eq!(next, approaching(0));
        assert_eq!(out.outcome, TickOutcome::Advanced);
        assert_eq!(out.dems.mech.gripper.map(|g| g.effort), Some(1.5));
        assert_eq!(out.dems.settle_s(), 1.0);
    }

    #[test]
    fn test_transform_unavailable_is_a_noop() {
        let seq = sequencer();
        let target = FixedTarget::none();
        let state = approaching(2);
        let s = sample_at(&[0.0; 4]);

        let (next, out) = seq.tick(
            &state,
            &TickInput {
                now_s: 3.0,
                sample: Some(&s),
                target: &target,
            },
        );

        assert_eq!(next, state);
        assert!(matches!(
            out.outcome,
            TickOutcome::Blocked(TickError::TransformUnavailable(_))
        ));
        assert!(out.dems.is_empty());
    }

    #[test]
    fn test_unreachable_target_is_a_noop() {
        let seq = sequencer();
        let target = FixedTarget::at(1.0, 0.0, 0.1);
        let state = approaching(0);

        let (next, out) = seq.tick(
            &state,
            &TickInput {
                now_s: 0.0,
                sample: None,
                target: &target,
            },
        );

        assert_eq!(next, state);
        assert!(matches!(
            out.outcome,
            TickOutcome::Blocked(TickError::IkUnreachable(_))
        ));
        assert!(out.dems.is_empty());
        assert_eq!(out.target_m, Some([1.0, 0.0, 0.1]));
    }

    #[test]
    fn test_tick_error_conditions() {
        let stale = |time_s: f64| {
            TickError::TransformUnavailable(FrameError::Stale {
                child: "object_frame".into(),
                stamp_s: 0.0,
                time_s,
            })
        };
        let unreachable = |x: f64| {
            TickError::IkUnreachable(IkError::Unreachable {
                last: [x, 0.0, 0.0, 0.0],
            })
        };

        assert!(stale(5.0).same_condition(&stale(5.5)));
        assert!(unreachable(0.1).same_condition(&unreachable(0.2)));
        assert!(!stale(5.0).same_condition(&TickError::TransformUnavailable(
            FrameError::UnknownFrame("object_frame".into())
        )));
        assert!(!stale(5.0).same_condition(&unreachable(0.1)));
    }

    #[test]
    fn test_working_solution_held_for_the_step() {
        let seq = sequencer();
        let target = FixedTarget::at(0.25, 0.0, 0.1);
        let far = sample_at(&[3.0; 4]);

        let (state, out) = seq.tick(
            &approaching(0),
            &TickInput {
                now_s: 0.0,
                sample: Some(&far),
                target: &target,
            },
        );
        let first = state.working.unwrap();
        let waist = out.dems.mech.single.unwrap();
        assert_eq!(waist.act_id, JointId::Waist);
        assert_eq!(waist.pos_rad, first.joints_rad[0]);

        // The target drifts to the side, the step keeps its solution
        target.0.set(Some([0.25, 0.02, 0.1]));
        let (state, out) = seq.tick(
            &state,
            &TickInput {
                now_s: 0.5,
                sample: Some(&far),
                target: &target,
            },
        );
        assert_eq!(out.outcome, TickOutcome::Waiting);
        assert_eq!(state.working, Some(first));
        assert_eq!(out.dems.mech.single.unwrap().pos_rad, first.joints_rad[0]);
        assert_ne!(out.solution, Some(first));
    }

    #[test]
    fn test_last_step_grasps() {
        let seq = sequencer();
        let target = FixedTarget::at(0.25, 0.0, 0.1);
        let last = seq.plan().len() - 1;

        // Solve once to find where the elbow will be commanded
        let far = sample_at(&[3.0; 4]);
        let (state, _) = seq.tick(
            &approaching(last),
            &TickInput {
                now_s: 0.0,
                sample: Some(&far),
                target: &target,
            },
        );
        let at_target = sample_at(&state.working.unwrap().joints_rad);

        let (next, out) = seq.tick(
            &state,
            &TickInput {
                now_s: 0.5,
                sample: Some(&at_target),
                target: &target,
            },
        );

        assert_eq!(next, next_phase(Phase::Retracting));
        assert_eq!(out.dems.mech.single.map(|s| s.act_id), Some(JointId::Elbow));
        let grasp = out.dems.mech.gripper.unwrap();
        assert!((grasp.effort + 238.0).abs() < 1e-9);
    }

    #[test]
    fn test_done_is_terminal() {
        let seq = sequencer();
        let target = FixedTarget::at(0.25, 0.0, 0.1);
        let state = next_phase(Phase::Done);
        let s = sample_at(&[0.0; 4]);

        for _ in 0..3 {
            let (next, out) = seq.tick(
                &state,
                &TickInput {
                    now_s: 0.0,
                    sample: Some(&s),
                    target: &target,
                },
            );
            assert_eq!(next, state);
            assert_eq!(out.outcome, TickOutcome::Finished);
            assert!(out.dems.is_empty());
        }
    }

    #[test]
    fn test_plan_validation() {
        assert_eq!(MotionPlan::new(&[]).unwrap_err(), PlanError::Empty);
        assert_eq!(
            MotionPlan::new(&[JointId::Waist, JointId::Gripper]).unwrap_err(),
            PlanError::NotAnArmJoint(1, JointId::Gripper)
        );
        assert_eq!(MotionPlan::new(&[JointId::Elbow]).unwrap().len(), 1);
    }

    /// Feedback reaches each commanded position on the third tick of every step, so the full
    /// sequence of 1 home, 5 plan steps, retract and stow takes exactly 24 ticks.
    #[test]
    fn test_full_run_is_deterministic() {
        let seq = sequencer();
        let target = FixedTarget::at(0.25, 0.0, 0.1);
        let far = sample_at(&[3.0; 4]);

        let mut state = SequencerState::default();
        let mut commanded = [0.0; 4];
        let mut ticks_in_step = 0;
        let mut num_ticks = 0;
        let mut phases = vec![(state.phase, state.step)];
        let mut gripper_efforts = vec![];

        while state.phase != Phase::Done {
            assert!(num_ticks < 100, "Sequence did not finish");

            let sample = match ticks_in_step {
                0 | 1 => far.clone(),
                _ => sample_at(&commanded),
            };

            let (next, out) = seq.tick(
                &state,
                &TickInput {
                    now_s: num_ticks as f64 * 0.5,
                    sample: Some(&sample),
                    target: &target,
                },
            );
            num_ticks += 1;

            assert!(!matches!(out.outcome, TickOutcome::Blocked(_)));

            // Apply the demands to the simulated arm
            if let Some(g) = out.dems.mech.group {
                commanded = g.pos_rad;
            }
            if let Some(s) = out.dems.mech.single {
                commanded[s.act_id.arm_index().unwrap()] = s.pos_rad;
            }
            if let Some(g) = out.dems.mech.gripper {
                gripper_efforts.push(g.effort);
            }

            if (next.phase, next.step) != (state.phase, state.step) {
                ticks_in_step = 0;
                phases.push((next.phase, next.step));
            } else {
                ticks_in_step += 1;
            }

            state = next;
        }

        assert_eq!(num_ticks, 24);
        assert_eq!(
            phases,
            vec![
                (Phase::Homing, 0),
                (Phase::Approaching, 0),
                (Phase::Approaching, 1),
                (Phase::Approaching, 2),
                (Phase::Approaching, 3),
                (Phase::Approaching, 4),
                (Phase::Retracting, 0),
                (Phase::Stowing, 0),
                (Phase::Done, 0),
            ]
        );
        assert_eq!(gripper_efforts.len(), 2);
        assert_eq!(gripper_efforts[0], 1.5);
        assert!(gripper_efforts[1] < 0.0);
        assert_eq!(commanded, [-1.5, 0.0, 1.3, -1.0]);
    }
}

//! Implementations for the ArmCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use serde::Serialize;

// Internal
use super::{
    ArmCtrlError, ArmDems, ArmJoints, Confirmation, JointId, JointTable, Params, Phase,
    Sequencer, SequencerState, Solver, TickError, TickInput, TickOutcome,
};
use util::params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Arm control module state
pub struct ArmCtrl {
    params: Params,

    sequencer: Sequencer,

    state: SequencerState,

    report: StatusReport,

    /// The error of the previous tick, if it was blocked, so repeats are only logged once.
    last_blocked: Option<TickError>,

    summary: RunSummary,
}

/// Status report for ArmCtrl processing.
#[derive(Clone, Default, Serialize, Debug)]
pub struct StatusReport {
    pub phase: Phase,

    pub step: usize,

    /// Number of ticks spent on the current phase and step without advancing.
    pub pending_ticks: u64,

    /// Joints which have not yet reached their commanded position.
    pub moving: Vec<JointId>,

    /// True if there was no joint feedback to confirm against.
    pub no_feedback: bool,

    /// True if the tick was blocked by a transform or kinematics failure.
    pub blocked: bool,

    /// Units: meters
    pub last_target_m: Option<[f64; 3]>,

    /// Units: radians
    pub last_solution_rad: Option<ArmJoints>,
}

/// Summary of a whole run, saved to the session when the run ends.
#[derive(Clone, Default, Serialize, Debug)]
pub struct RunSummary {
    pub num_ticks: u64,

    pub num_waiting: u64,

    pub num_blocked_transform: u64,

    pub num_blocked_ik: u64,

    /// Number of separate blocked conditions. Consecutive ticks blocked for the same reason
    /// count once.
    pub num_block_events: u64,

    /// Every phase or step change, in order.
    pub transitions: Vec<Transition>,

    /// Units: meters
    pub last_target_m: Option<[f64; 3]>,

    /// Units: radians
    pub last_solution_rad: Option<ArmJoints>,

    pub finished: bool,
}

/// A change of phase or step.
#[derive(Clone, Serialize, Debug)]
pub struct Transition {
    pub tick: u64,

    /// Units: seconds
    pub time_s: f64,

    pub phase: Phase,

    pub step: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmCtrl {
    /// Initialise the ArmCtrl module.
    ///
    /// `params_path` is relative to the parameters directory.
    pub fn init(params_path: &str) -> Result<Self, ArmCtrlError> {
        let params: Params = params::load(params_path)?;
        Self::new(params)
    }

    /// Build the module from already loaded parameters.
    pub fn new(params: Params) -> Result<Self, ArmCtrlError> {
        let table = JointTable::from_params(&params)?;
        let solver = Solver::from_params(&params, table.clone())?;
        let sequencer = Sequencer::from_params(&params, table, solver)?;

        info!(
            "ArmCtrl initialised with a {} step plan: {:?}",
            params.plan.len(),
            params.plan
        );

        Ok(Self {
            params,
            sequencer,
            state: SequencerState::default(),
            report: StatusReport::default(),
            last_blocked: None,
            summary: RunSummary::default(),
        })
    }

    /// Perform one tick of the pick sequence.
    pub fn step(&mut self, input: &TickInput) -> (ArmDems, StatusReport) {
        let (next, output) = self.sequencer.tick(&self.state, input);

        self.summary.num_ticks += 1;
        self.report.moving.clear();
        self.report.no_feedback = false;
        self.report.blocked = false;

        if let Some(target_m) = output.target_m {
            self.report.last_target_m = Some(target_m);
            self.summary.last_target_m = Some(target_m);
        }
        if let Some(ref sol) = output.solution {
            self.report.last_solution_rad = Some(sol.joints_rad);
            self.summary.last_solution_rad = Some(sol.joints_rad);
        }

        match output.outcome {
            TickOutcome::Advanced => {
                self.last_blocked = None;
                self.report.pending_ticks = 0;
                self.log_advance(&next);
                self.summary.transitions.push(Transition {
                    tick: self.summary.num_ticks,
                    time_s: input.now_s,
                    phase: next.phase,
                    step: next.step,
                });
            }
            TickOutcome::Waiting => {
                self.last_blocked = None;
                self.report.pending_ticks += 1;
                self.summary.num_waiting += 1;

                match output.confirmation {
                    Some(Confirmation::Moving(ref joints)) => {
                        for joint in joints {
                            info!("{} moving...", joint);
                        }
                        self.report.moving = joints.clone();
                    }
                    Some(Confirmation::NoFeedback) => {
                        debug!("No joint feedback yet, cannot confirm");
                        self.report.no_feedback = true;
                    }
                    Some(Confirmation::Confirmed) | None => (),
                }

                self.check_stall();
            }
            TickOutcome::Blocked(e) => {
                self.report.pending_ticks += 1;
                self.report.blocked = true;

                match e {
                    TickError::TransformUnavailable(_) => self.summary.num_blocked_transform += 1,
                    TickError::IkUnreachable(_) => self.summary.num_blocked_ik += 1,
                }

                let repeated = match self.last_blocked {
                    Some(ref last) => last.same_condition(&e),
                    None => false,
                };
                if !repeated {
                    self.summary.num_block_events += 1;
                    warn!("Cannot move {:?} step {}: {}", next.phase, next.step, e);
                } else {
                    debug!("Still blocked: {}", e);
                }
                self.last_blocked = Some(e);

                self.check_stall();
            }
            TickOutcome::Finished => (),
        }

        self.state = next;
        self.report.phase = self.state.phase;
        self.report.step = self.state.step;
        self.summary.finished = self.is_done();

        (output.dems, self.report.clone())
    }

    /// True once the arm has been stowed.
    pub fn is_done(&self) -> bool {
        self.state.phase == Phase::Done
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    fn log_advance(&self, next: &SequencerState) {
        match next.phase {
            Phase::Approaching => match self.sequencer.plan().joint(next.step) {
                Some(joint) => info!(
                    "Approaching, step {} of {}: {}",
                    next.step + 1,
                    self.sequencer.plan().len(),
                    joint
                ),
                None => info!("Approaching"),
            },
            Phase::Retracting => info!("Approach complete, gripper closed, retracting"),
            Phase::Stowing => info!("Retracted, stowing"),
            Phase::Done => info!("Arm stowed, pick sequence complete"),
            Phase::Homing => info!("Homing"),
        }
    }

    /// Warn once when the current step has been pending for too long. Control is unaffected.
    fn check_stall(&self) {
        if self.params.stall_warn_ticks > 0
            && self.report.pending_ticks == self.params.stall_warn_ticks
        {
            warn!(
                "{:?} step {} has not advanced in {} ticks",
                self.state.phase, self.state.step, self.report.pending_ticks
            );
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        arm_ctrl::{PlanError, NUM_ARM_JOINTS},
        frames::{self, FrameError, FrameTree, LookupTime, TargetResolver, TargetSource},
        joint_cache::JointSample,
    };
    use nalgebra::{Point3, Vector3};

    struct Fixed(Option<[f64; 3]>);

    impl TargetSource for Fixed {
        fn resolve(&self, _now_s: f64) -> Result<Vector3<f64>, FrameError> {
            self.0
                .map(Vector3::from)
                .ok_or_else(|| FrameError::UnknownFrame("object_frame".into()))
        }
    }

    fn sample_at(arm: &[f64; NUM_ARM_JOINTS]) -> JointSample {
        let mut positions = arm.to_vec();
        positions.extend_from_slice(&[0.0; 3]);
        JointSample {
            positions,
            timestamp_s: 0.0,
        }
    }

    fn shipped_frames() -> frames::Params {
        util::params::from_str(include_str!("../../../params/frames.toml")).unwrap()
    }

    /// Position in the sensor frame of an object at `target_m` in the base frame.
    fn seen_at(params: &frames::Params, target_m: [f64; 3]) -> [f64; 3] {
        let mut tree = FrameTree::new();
        for link in params.static_links.iter() {
            tree.set_static(&link.parent, &link.child, link.transform().unwrap());
        }

        let base_in_sensor = tree
            .lookup(&params.sensor_frame, &params.base_frame, LookupTime::Latest)
            .unwrap();
        let p = base_in_sensor * Point3::from(target_m);
        [p.x, p.y, p.z]
    }

    #[test]
    fn test_invalid_plan_rejected() {
        let mut params = Params::shipped();
        params.plan.clear();

        assert!(matches!(
            ArmCtrl::new(params),
            Err(ArmCtrlError::Plan(PlanError::Empty))
        ));
    }

    #[test]
    fn test_stall_counts_without_feedback() {
        let mut arm_ctrl = ArmCtrl::new(Params::shipped()).unwrap();
        let target = Fixed(None);

        for i in 0..10 {
            let (dems, report) = arm_ctrl.step(&TickInput {
                now_s: i as f64 * 0.5,
                sample: None,
                target: &target,
            });

            assert!(dems.mech.group.is_some());
            assert_eq!(report.phase, Phase::Homing);
            assert_eq!(report.pending_ticks, i + 1);
            assert!(report.no_feedback);
        }

        assert!(!arm_ctrl.is_done());
        assert_eq!(arm_ctrl.summary().num_waiting, 10);
    }

    #[test]
    fn test_blocked_ticks_counted() {
        let mut arm_ctrl = ArmCtrl::new(Params::shipped()).unwrap();
        let target = Fixed(None);
        let home = sample_at(&arm_ctrl.params().home_pos_rad);

        let (_, report) = arm_ctrl.step(&TickInput {
            now_s: 0.0,
            sample: Some(&home),
            target: &target,
        });
        assert_eq!(report.phase, Phase::Approaching);
        assert_eq!(report.pending_ticks, 0);

        for _ in 0..3 {
            let (dems, report) = arm_ctrl.step(&TickInput {
                now_s: 0.5,
                sample: Some(&home),
                target: &target,
            });
            assert!(dems.is_empty());
            assert!(report.blocked);
        }

        assert_eq!(arm_ctrl.summary().num_blocked_transform, 3);
        assert_eq!(arm_ctrl.summary().num_blocked_ik, 0);
        assert_eq!(arm_ctrl.report().pending_ticks, 3);
    }

    #[test]
    fn test_run_with_perfect_feedback() {
        let mut arm_ctrl = ArmCtrl::new(Params::shipped()).unwrap();
        let target = Fixed(Some([0.25, 0.0, 0.1]));
        let mut arm = [3.0; NUM_ARM_JOINTS];
        let mut num_ticks = 0;

        while !arm_ctrl.is_done() {
            assert!(num_ticks < 50, "Sequence did not finish");

            let sample = sample_at(&arm);
            let (dems, _) = arm_ctrl.step(&TickInput {
                now_s: num_ticks as f64 * 0.5,
                sample: Some(&sample),
                target: &target,
            });
            num_ticks += 1;

            // The arm reaches every demand by the next tick
            if let Some(g) = dems.mech.group {
                arm = g.pos_rad;
            }
            if let Some(s) = dems.mech.single {
                if let Some(i) = s.act_id.arm_index() {
                    arm[i] = s.pos_rad;
                }
            }
        }

        // Each move is commanded on one tick and confirmed on the next, apart from the second
        // waist step which is already in place
        assert_eq!(num_ticks, 15);

        let summary = arm_ctrl.summary();
        assert!(summary.finished);
        assert_eq!(summary.transitions.len(), 8);
        assert_eq!(summary.num_blocked_transform + summary.num_blocked_ik, 0);
        assert_eq!(summary.last_target_m, Some([0.25, 0.0, 0.1]));
        assert!(summary.last_solution_rad.is_some());
    }

    #[test]
    fn test_blocked_until_first_detection() {
        let frames_params = shipped_frames();
        let seen = seen_at(&frames_params, [0.25, 0.0, 0.1]);
        let mut resolver = TargetResolver::new(frames_params).unwrap();

        let mut arm_ctrl = ArmCtrl::new(Params::shipped()).unwrap();
        let mut arm = arm_ctrl.params().home_pos_rad;

        let sample = sample_at(&arm);
        let (_, report) = arm_ctrl.step(&TickInput {
            now_s: 0.0,
            sample: Some(&sample),
            target: &resolver,
        });
        assert_eq!(report.phase, Phase::Approaching);
        assert_eq!(report.step, 0);

        // Nothing has been detected yet
        let state = arm_ctrl.state().clone();
        let (dems, report) = arm_ctrl.step(&TickInput {
            now_s: 0.5,
            sample: Some(&sample),
            target: &resolver,
        });
        assert!(dems.is_empty());
        assert!(report.blocked);
        assert_eq!(arm_ctrl.state(), &state);
        assert_eq!(arm_ctrl.summary().num_blocked_transform, 1);

        resolver.observe(&seen, &[0.0, 0.0, 0.0, 1.0], 1.0).unwrap();

        let (dems, report) = arm_ctrl.step(&TickInput {
            now_s: 1.0,
            sample: Some(&sample),
            target: &resolver,
        });
        assert!(!report.blocked);
        let single = dems.mech.single.unwrap();
        assert_eq!(single.act_id, JointId::Waist);
        assert!(single.pos_rad.abs() < 0.1);
        let target_m = report.last_target_m.unwrap();
        assert!((target_m[0] - 0.25).abs() < 1e-9);
        assert!((target_m[2] - 0.1).abs() < 1e-9);

        // The waist reaches its demand and the step is confirmed
        arm[0] = single.pos_rad;
        let sample = sample_at(&arm);
        let (_, report) = arm_ctrl.step(&TickInput {
            now_s: 1.5,
            sample: Some(&sample),
            target: &resolver,
        });
        assert_eq!(report.phase, Phase::Approaching);
        assert_eq!(report.step, 1);
        assert_eq!(arm_ctrl.summary().num_block_events, 1);
    }

    #[test]
    fn test_stale_target_counts_as_one_block() {
        let mut frames_params = shipped_frames();
        frames_params.max_observation_age_s = Some(1.0);
        let seen = seen_at(&frames_params, [0.25, 0.0, 0.1]);
        let mut resolver = TargetResolver::new(frames_params).unwrap();

        let mut arm_ctrl = ArmCtrl::new(Params::shipped()).unwrap();
        let home = sample_at(&arm_ctrl.params().home_pos_rad);

        resolver.observe(&seen, &[0.0, 0.0, 0.0, 1.0], 0.0).unwrap();
        arm_ctrl.step(&TickInput {
            now_s: 0.0,
            sample: Some(&home),
            target: &resolver,
        });
        assert_eq!(arm_ctrl.state().phase, Phase::Approaching);

        for i in 0..5 {
            let now_s = 5.0 + i as f64 * 0.5;
            assert!(matches!(resolver.resolve(now_s), Err(FrameError::Stale { .. })));

            let (dems, report) = arm_ctrl.step(&TickInput {
                now_s,
                sample: Some(&home),
                target: &resolver,
            });
            assert!(dems.is_empty());
            assert!(report.blocked);
        }

        assert_eq!(arm_ctrl.summary().num_blocked_transform, 5);
        assert_eq!(arm_ctrl.summary().num_block_events, 1);

        // A fresh detection clears the block
        resolver.observe(&seen, &[0.0, 0.0, 0.0, 1.0], 7.5).unwrap();
        let (dems, report) = arm_ctrl.step(&TickInput {
            now_s: 7.5,
            sample: Some(&home),
            target: &resolver,
        });
        assert!(!report.blocked);
        assert!(dems.mech.single.is_some());
        assert_eq!(arm_ctrl.summary().num_block_events, 1);
    }
}

//! # Data Store

use comms_if::eqpt::{cam::MarkerDetections, mech::JointStateMsg};
use log::{trace, warn};

use crate::{
    arm_ctrl::{ArmDems, StatusReport},
    frames::TargetResolver,
    joint_cache::JointStateCache,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u64,

    /// Session time at the start of this cycle
    pub cycle_start_s: f64,

    // Feedback
    pub joint_cache: JointStateCache,

    pub target_resolver: TargetResolver,

    /// Number of detection events which contained at least one marker
    pub num_detections: u64,

    // ArmCtrl
    pub arm_ctrl_output: ArmDems,
    pub arm_ctrl_status_rpt: StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Number of consecutive mechanisms client receive errors
    pub num_consec_mech_recv_errors: u64,

    /// Number of consecutive camera client receive errors
    pub num_consec_cam_recv_errors: u64,

    // Links
    /// True while the arm driver's joint feedback publisher is connected
    pub mech_connected: bool,

    /// True while the camera's detection publisher is connected
    pub cam_connected: bool,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    pub fn new(joint_cache: JointStateCache, target_resolver: TargetResolver) -> Self {
        Self {
            num_cycles: 0,
            cycle_start_s: 0.0,
            joint_cache,
            target_resolver,
            num_detections: 0,
            arm_ctrl_output: ArmDems::default(),
            arm_ctrl_status_rpt: StatusReport::default(),
            num_consec_cycle_overruns: 0,
            num_consec_mech_recv_errors: 0,
            num_consec_cam_recv_errors: 0,
            mech_connected: false,
            cam_connected: false,
        }
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Clears the previous cycle's ArmCtrl output and records the cycle start time.
    pub fn cycle_start(&mut self, now_s: f64) {
        self.cycle_start_s = now_s;
        self.arm_ctrl_output = ArmDems::default();
    }

    /// Feed received joint state messages, oldest first, into the joint cache.
    ///
    /// Partial samples are dropped and leave the previous sample in place. Returns the number of
    /// samples accepted.
    pub fn ingest_joint_states(&mut self, msgs: &[JointStateMsg], now_s: f64) -> usize {
        let mut num_accepted = 0;

        for msg in msgs {
            match self.joint_cache.update_from_msg(msg, now_s) {
                Ok(()) => num_accepted += 1,
                Err(e) => trace!("Dropped joint sample: {}", e),
            }
        }

        num_accepted
    }

    /// Feed received detection events, oldest first, into the target resolver.
    ///
    /// Returns the number of events which updated the object observation.
    pub fn ingest_detections(&mut self, events: &[MarkerDetections], now_s: f64) -> usize {
        let mut num_observed = 0;

        for event in events {
            match self.target_resolver.observe_detections(event, now_s) {
                Ok(true) => num_observed += 1,
                Ok(false) => (),
                Err(e) => warn!("Rejected detection: {}", e),
            }
        }

        self.num_detections += num_observed as u64;
        num_observed
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Record the latest connection state of a link, returning true if it changed.
pub fn link_changed(state: &mut bool, connected: bool) -> bool {
    let changed = *state != connected;
    *state = connected;
    changed
}

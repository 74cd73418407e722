//! Main arm executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - System input acquisition:
//!             - Joint feedback from the actuator driver
//!             - Marker detections from the camera
//!         - ArmCtrl processing, one tick of the pick sequence
//!         - Demands out to the actuator driver and camera mount
//!         - Cycle management, including the gripper settle delay
//!     - Save the run summary to the session

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, error, info, warn};
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
#[cfg(feature = "cam")]
use arm_lib::cam_client::CamClient;
#[cfg(feature = "mech")]
use arm_lib::mech_client::MechClient;
use arm_lib::{
    arm_ctrl::{ArmCtrl, TickInput},
    data_store::{self, DataStore},
    frames::{self, TargetResolver},
    joint_cache::JointStateCache,
    CYCLE_PERIOD_S,
};
use comms_if::net::NetParams;
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of consecutive receive errors from a client before they are reported as an error.
const MAX_RECV_ERROR_LIMIT: u64 = 5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Closed-loop pick-and-place executive for the px100 arm.
#[derive(Debug, StructOpt)]
#[structopt(name = "arm_exec")]
struct Opt {
    /// Stop after this many cycles even if the sequence has not finished.
    #[structopt(long)]
    max_cycles: Option<u64>,

    /// Log at trace level.
    #[structopt(short, long)]
    verbose: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("arm_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = match opt.verbose {
        true => LevelFilter::Trace,
        false => LevelFilter::Debug,
    };
    logger_init(level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Arm Pick-and-Place Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;
    let frames_params: frames::Params =
        util::params::load("frames.toml").wrap_err("Could not load frames params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut arm_ctrl = ArmCtrl::init("arm_ctrl.toml").wrap_err("Failed to initialise ArmCtrl")?;
    info!("ArmCtrl init complete");

    let target_resolver =
        TargetResolver::new(frames_params).wrap_err("Failed to initialise the frame tree")?;
    let joint_cache = JointStateCache::new(arm_ctrl.params().num_feedback_joints);

    let mut ds = DataStore::new(joint_cache, target_resolver);

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    #[cfg(feature = "mech")]
    let mech_client = {
        let c = MechClient::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise MechClient")?;
        info!("MechClient initialised");
        c
    };

    #[cfg(feature = "cam")]
    let cam_client = {
        let c = CamClient::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise CamClient")?;
        info!("CamClient initialised");
        c
    };

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();
        let now_s = session::get_elapsed_seconds();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(now_s);

        // ---- LINK MONITORING ----

        #[cfg(feature = "mech")]
        if data_store::link_changed(&mut ds.mech_connected, mech_client.connected()) {
            match ds.mech_connected {
                true => info!("Arm driver connected"),
                false => warn!("Arm driver disconnected, the sequence waits on its feedback"),
            }
        }

        #[cfg(feature = "cam")]
        if data_store::link_changed(&mut ds.cam_connected, cam_client.connected()) {
            match ds.cam_connected {
                true => info!("Camera connected"),
                false => warn!("Camera disconnected, the latest detection remains in use"),
            }
        }

        // ---- DATA INPUT ----

        #[cfg(feature = "mech")]
        match mech_client.recv_joint_states() {
            Ok(msgs) => {
                ds.ingest_joint_states(&msgs, now_s);
                ds.num_consec_mech_recv_errors = 0;
            }
            Err(e) => {
                ds.num_consec_mech_recv_errors += 1;
                if ds.num_consec_mech_recv_errors == MAX_RECV_ERROR_LIMIT {
                    error!(
                        "Maximum number of MechClient receive errors ({}) reached: {}",
                        MAX_RECV_ERROR_LIMIT, e
                    );
                } else {
                    warn!("MechClient receive error: {}", e);
                }
            }
        }

        #[cfg(feature = "cam")]
        match cam_client.recv_detections() {
            Ok(events) => {
                ds.ingest_detections(&events, now_s);
                ds.num_consec_cam_recv_errors = 0;
            }
            Err(e) => {
                ds.num_consec_cam_recv_errors += 1;
                if ds.num_consec_cam_recv_errors == MAX_RECV_ERROR_LIMIT {
                    error!(
                        "Maximum number of CamClient receive errors ({}) reached: {}",
                        MAX_RECV_ERROR_LIMIT, e
                    );
                } else {
                    warn!("CamClient receive error: {}", e);
                }
            }
        }

        // ---- CONTROL ALGORITHM PROCESSING ----

        let (dems, report) = arm_ctrl.step(&TickInput {
            now_s: ds.cycle_start_s,
            sample: ds.joint_cache.read(),
            target: &ds.target_resolver,
        });
        ds.arm_ctrl_output = dems;
        ds.arm_ctrl_status_rpt = report;

        // ---- DEMANDS OUTPUT ----

        #[cfg(feature = "mech")]
        if let Err(e) = mech_client.send_demands(&ds.arm_ctrl_output.mech) {
            warn!("Could not send demands to the arm: {}", e);
        }

        #[cfg(feature = "cam")]
        if let Some(ref pan_tilt) = ds.arm_ctrl_output.pan_tilt {
            if let Err(e) = cam_client.send_pan_tilt(pan_tilt) {
                warn!("Could not send demands to the camera mount: {}", e);
            }
        }

        // ---- CYCLE MANAGEMENT ----

        ds.num_cycles += 1;

        if arm_ctrl.is_done() {
            info!(
                "Pick sequence complete after {} cycles, {} detections received",
                ds.num_cycles, ds.num_detections
            );
            break;
        }

        if let Some(max_cycles) = opt.max_cycles {
            if ds.num_cycles >= max_cycles {
                warn!(
                    "Stopping after {} cycles, sequence is in {:?} step {}",
                    ds.num_cycles, ds.arm_ctrl_status_rpt.phase, ds.arm_ctrl_status_rpt.step
                );
                break;
            }
        }

        // The gripper is given time to settle before anything else is commanded
        let period_s = CYCLE_PERIOD_S.max(ds.arm_ctrl_output.settle_s());
        let cycle_dur = Instant::now() - cycle_start_instant;

        match Duration::from_secs_f64(period_s).checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - period_s
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }
    }

    // ---- SHUTDOWN ----

    session.save("run_summary.json", arm_ctrl.summary().clone());
    session.exit();

    info!("End of execution");

    Ok(())
}

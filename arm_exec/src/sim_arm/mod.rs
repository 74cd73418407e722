//! # Simulated arm
//!
//! A kinematic stand-in for the arm's actuator driver. Each step moves every arm joint towards its
//! latest demand, limited by the joint's maximum rate, and produces a joint sample in the driver's
//! order: the four arm joints, the gripper and the two fingers.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

pub use params::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::Utc;
use comms_if::eqpt::mech::{ActId, JointStateMsg, MechDems, NUM_ARM_JOINTS};
use log::trace;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Names of the joints in a sample, in order.
const JOINT_NAMES: [&str; 7] = [
    "waist",
    "shoulder",
    "elbow",
    "wrist_angle",
    "gripper",
    "left_finger",
    "right_finger",
];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct SimArm {
    params: Params,

    /// Units: radians
    pos_rad: [f64; NUM_ARM_JOINTS],

    /// Units: radians
    dem_rad: [f64; NUM_ARM_JOINTS],

    gripper_closed: bool,

    num_steps: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimArm {
    pub fn new(params: Params) -> Self {
        Self {
            pos_rad: params.initial_pos_rad,
            dem_rad: params.initial_pos_rad,
            gripper_closed: false,
            num_steps: 0,
            params,
        }
    }

    /// Accept new demands. Anything not demanded keeps its previous demand.
    pub fn apply(&mut self, dems: &MechDems) {
        if let Some(ref group) = dems.group {
            self.dem_rad = group.pos_rad;
        }

        if let Some(single) = dems.single {
            match single.act_id.arm_index() {
                Some(i) => self.dem_rad[i] = single.pos_rad,
                None => trace!("SimArm ignoring position demand for {}", single.act_id),
            }
        }

        if let Some(gripper) = dems.gripper {
            if gripper.effort > 0.0 {
                self.gripper_closed = false;
            } else if gripper.effort < 0.0 {
                self.gripper_closed = true;
            }
        }
    }

    /// Advance the simulation by one cycle and return the new joint sample.
    pub fn step(&mut self) -> Vec<f64> {
        let dt = self.params.cycle_period_s;

        for i in 0..NUM_ARM_JOINTS {
            let max_step = self.params.max_rate_rads[i].abs() * dt;
            self.pos_rad[i] += clamp(self.dem_rad[i] - self.pos_rad[i], -max_step, max_step);
        }

        self.num_steps += 1;

        let sample = self.sample();
        match self.params.partial_sample_every {
            n if n > 0 && self.num_steps % n == 0 => sample[..NUM_ARM_JOINTS].to_vec(),
            _ => sample,
        }
    }

    /// The current complete joint sample.
    pub fn sample(&self) -> Vec<f64> {
        let finger_m = if self.gripper_closed {
            self.params.finger_closed_m
        } else {
            self.params.finger_open_m
        };

        let mut sample = self.pos_rad.to_vec();
        sample.push(0.0);
        sample.push(finger_m);
        sample.push(-finger_m);
        sample.resize(self.params.num_feedback_joints, 0.0);
        sample
    }

    /// Wrap a sample in the driver's joint state message.
    pub fn joint_state_msg(&self, position: Vec<f64>) -> JointStateMsg {
        JointStateMsg {
            timestamp: Utc::now(),
            name: JOINT_NAMES
                .iter()
                .take(position.len())
                .map(|n| n.to_string())
                .collect(),
            position,
        }
    }

    /// Units: radians
    pub fn pos_rad(&self) -> &[f64; NUM_ARM_JOINTS] {
        &self.pos_rad
    }

    /// Position of one arm joint.
    pub fn joint_pos_rad(&self, act_id: ActId) -> Option<f64> {
        act_id.arm_index().map(|i| self.pos_rad[i])
    }

    pub fn gripper_closed(&self) -> bool {
        self.gripper_closed
    }
}

//! # Joint State Cache
//!
//! Holds the most recent complete joint feedback sample. Samples with an unexpected number of
//! joints are transient partial reads from the driver and are dropped, leaving the previous
//! sample in place.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::mech::JointStateMsg;
use serde::Serialize;

use crate::arm_ctrl::{JointId, JointTable};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A complete joint feedback sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointSample {
    /// Measured joint positions, in the driver's order.
    ///
    /// Units: radians (gripper fingers in meters)
    pub positions: Vec<f64>,

    /// Time the sample was received, in seconds since the start of the session.
    pub timestamp_s: f64,
}

/// Cache of the latest complete joint sample.
#[derive(Debug, Clone)]
pub struct JointStateCache {
    expected_len: usize,
    latest: Option<JointSample>,
    num_dropped: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum SampleError {
    #[error("Expected {expected} joints in the sample but found {found}")]
    Incomplete { expected: usize, found: usize },

    #[error("Joint state message has {names} names but {positions} positions")]
    NameMismatch { names: usize, positions: usize },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl JointSample {
    /// Measured position of the given joint, or `None` if the sample is too short to contain it.
    pub fn position(&self, table: &JointTable, id: JointId) -> Option<f64> {
        self.positions.get(table.feedback_index(id)).copied()
    }
}

impl JointStateCache {
    /// Create an empty cache which accepts samples of exactly `expected_len` joints.
    pub fn new(expected_len: usize) -> Self {
        Self {
            expected_len,
            latest: None,
            num_dropped: 0,
        }
    }

    /// Replace the cached sample, provided `positions` is complete.
    pub fn update(&mut self, positions: &[f64], timestamp_s: f64) -> Result<(), SampleError> {
        if positions.len() != self.expected_len {
            self.num_dropped += 1;
            return Err(SampleError::Incomplete {
                expected: self.expected_len,
                found: positions.len(),
            });
        }

        self.latest = Some(JointSample {
            positions: positions.to_vec(),
            timestamp_s,
        });

        Ok(())
    }

    /// Replace the cached sample from a driver message.
    pub fn update_from_msg(
        &mut self,
        msg: &JointStateMsg,
        timestamp_s: f64,
    ) -> Result<(), SampleError> {
        if msg.name.len() != msg.position.len() {
            self.num_dropped += 1;
            return Err(SampleError::NameMismatch {
                names: msg.name.len(),
                positions: msg.position.len(),
            });
        }

        self.update(&msg.position, timestamp_s)
    }

    /// The latest complete sample, if one has arrived.
    pub fn read(&self) -> Option<&JointSample> {
        self.latest.as_ref()
    }

    /// Number of samples dropped since the cache was created.
    pub fn num_dropped(&self) -> u64 {
        self.num_dropped
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_empty_until_first_sample() {
        let mut cache = JointStateCache::new(7);
        assert!(cache.read().is_none());

        cache.update(&[0.0; 7], 1.0).unwrap();
        assert_eq!(cache.read().map(|s| s.timestamp_s), Some(1.0));
    }

    #[test]
    fn test_partial_sample_keeps_previous() {
        let mut cache = JointStateCache::new(7);
        let full = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7];
        cache.update(&full, 1.0).unwrap();

        assert_eq!(
            cache.update(&[9.0; 5], 2.0),
            Err(SampleError::Incomplete {
                expected: 7,
                found: 5
            })
        );

        let s = cache.read().unwrap();
        assert_eq!(s.positions, full.to_vec());
        assert_eq!(s.timestamp_s, 1.0);
        assert_eq!(cache.num_dropped(), 1);
    }

    #[test]
    fn test_update_from_msg() {
        let mut cache = JointStateCache::new(7);

        let names: Vec<String> = [
            "waist",
            "shoulder",
            "elbow",
            "wrist_angle",
            "gripper",
            "left_finger",
            "right_finger",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut msg = JointStateMsg {
            timestamp: Utc::now(),
            name: names,
            position: vec![0.0; 6],
        };
        assert!(matches!(
            cache.update_from_msg(&msg, 0.5),
            Err(SampleError::NameMismatch { .. })
        ));

        msg.position.push(0.0);
        cache.update_from_msg(&msg, 0.5).unwrap();
        assert!(cache.read().is_some());
    }
}

//! Lateral offset calibration
//!
//! Solutions from the inverse kinematics show a systematic reach error which depends on how far
//! to the side the target is. The table corrects the waist and shoulder by fixed offsets chosen
//! from a small set of bands over the target's lateral (y) position in the base frame. The
//! values are measured on the arm, they are not derived from the kinematic model.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::joint::ArmJoints;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One band of the lateral offset table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LateralBand {
    /// The band applies to targets with `y < below_m`. `None` marks the final, unbounded band.
    ///
    /// Units: meters
    #[serde(default)]
    pub below_m: Option<f64>,

    /// Units: radians
    pub waist_offset_rad: f64,

    /// Units: radians
    pub shoulder_offset_rad: f64,
}

/// Ordered set of lateral bands covering the whole real line.
#[derive(Debug, Clone, Serialize)]
pub struct LateralOffsetTable {
    bands: Vec<LateralBand>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CalibrationError {
    #[error("The lateral offset table is empty")]
    Empty,

    #[error("Only the last lateral band may be unbounded (band {0} is not)")]
    UnboundedBand(usize),

    #[error("The last lateral band must be unbounded")]
    LastBandBounded,

    #[error("Lateral band bounds must be finite and strictly increasing (band {0})")]
    BoundsNotIncreasing(usize),

    #[error("Lateral band {0} has a non-finite offset")]
    NonFiniteOffset(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LateralOffsetTable {
    /// Validate and build a table from its bands.
    pub fn new(bands: Vec<LateralBand>) -> Result<Self, CalibrationError> {
        let last = match bands.len() {
            0 => return Err(CalibrationError::Empty),
            n => n - 1,
        };

        let mut prev: Option<f64> = None;

        for (i, band) in bands.iter().enumerate() {
            if !band.waist_offset_rad.is_finite() || !band.shoulder_offset_rad.is_finite() {
                return Err(CalibrationError::NonFiniteOffset(i));
            }

            match (band.below_m, i == last) {
                (None, false) => return Err(CalibrationError::UnboundedBand(i)),
                (Some(_), true) => return Err(CalibrationError::LastBandBounded),
                (None, true) => (),
                (Some(b), false) => {
                    let increasing = match prev {
                        Some(p) => b > p,
                        None => true,
                    };
                    if !b.is_finite() || !increasing {
                        return Err(CalibrationError::BoundsNotIncreasing(i));
                    }
                    prev = Some(b);
                }
            }
        }

        Ok(Self { bands })
    }

    /// Find the band containing the lateral position `y_m`.
    pub fn band(&self, y_m: f64) -> &LateralBand {
        // The last band is unbounded so the search always lands somewhere, NaN included
        let idx = self
            .bands
            .iter()
            .position(|b| matches!(b.below_m, Some(below) if y_m < below))
            .unwrap_or(self.bands.len() - 1);

        &self.bands[idx]
    }

    /// Apply the correction for a target at lateral position `y_m` to a solution.
    pub fn apply(&self, joints: &ArmJoints, y_m: f64) -> ArmJoints {
        let band = self.band(y_m);

        let mut out = *joints;
        out[0] += band.waist_offset_rad;
        out[1] += band.shoulder_offset_rad;
        out
    }
}

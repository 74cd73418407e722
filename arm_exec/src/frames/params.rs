//! Parameters for the frame tree

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

use super::FrameError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Frame names and the fixed links between the arm and the camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    /// Frame the arm kinematics are expressed in.
    pub base_frame: String,

    /// Frame marker detections are expressed in.
    pub sensor_frame: String,

    /// Frame registered for the detected object.
    pub object_frame: String,

    /// Maximum age of the object observation when resolving the target. If not set the latest
    /// observation is always used.
    ///
    /// Units: seconds
    #[serde(default)]
    pub max_observation_age_s: Option<f64>,

    /// Fixed links connecting the base to the sensor frame.
    pub static_links: Vec<StaticLink>,
}

/// A fixed link between two frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticLink {
    pub parent: String,

    pub child: String,

    /// Position of the child in the parent.
    ///
    /// Units: meters
    pub translation_m: [f64; 3],

    /// Orientation of the child in the parent, as a quaternion in `[x, y, z, w]` order.
    pub rotation_q: [f64; 4],
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build a rigid transform from a position and an `[x, y, z, w]` quaternion, rejecting
/// non-finite values and degenerate quaternions.
pub fn isometry_from_parts(
    translation_m: &[f64; 3],
    rotation_q: &[f64; 4],
) -> Result<Isometry3<f64>, FrameError> {
    if translation_m.iter().chain(rotation_q.iter()).any(|v| !v.is_finite()) {
        return Err(FrameError::Malformed(format!(
            "non-finite value in position {:?} or orientation {:?}",
            translation_m, rotation_q
        )));
    }

    let q = Quaternion::new(rotation_q[3], rotation_q[0], rotation_q[1], rotation_q[2]);
    let rotation = UnitQuaternion::try_new(q, 1e-6).ok_or_else(|| {
        FrameError::Malformed(format!("degenerate orientation {:?}", rotation_q))
    })?;

    Ok(Isometry3::from_parts(
        Translation3::new(translation_m[0], translation_m[1], translation_m[2]),
        rotation,
    ))
}

impl StaticLink {
    pub fn transform(&self) -> Result<Isometry3<f64>, FrameError> {
        isometry_from_parts(&self.translation_m, &self.rotation_q)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quaternion_order() {
        // 90 degrees about z, given as [x, y, z, w]
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let iso = isometry_from_parts(&[0.0; 3], &[0.0, 0.0, h, h]).unwrap();

        assert_relative_eq!(
            iso.rotation.scaled_axis(),
            nalgebra::Vector3::z() * std::f64::consts::FRAC_PI_2,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(matches!(
            isometry_from_parts(&[f64::NAN, 0.0, 0.0], &[0.0, 0.0, 0.0, 1.0]),
            Err(FrameError::Malformed(_))
        ));
        assert!(matches!(
            isometry_from_parts(&[0.0; 3], &[0.0; 4]),
            Err(FrameError::Malformed(_))
        ));
    }
}

//! Target frame resolver
//!
//! Registers marker detections as the object frame, relative to the camera, and resolves the
//! object's position in the arm base frame on demand.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::cam::MarkerDetections;
use log::trace;
use nalgebra::Vector3;

use super::{isometry_from_parts, FrameError, FrameTree, LookupTime, Params};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Anything which can provide the target's position in the arm base frame.
pub trait TargetSource {
    /// Resolve the target at session time `now_s`.
    ///
    /// Units: meters
    fn resolve(&self, now_s: f64) -> Result<Vector3<f64>, FrameError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Resolves detected objects into the arm base frame.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    params: Params,
    tree: FrameTree,
    last_observation_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TargetResolver {
    /// Create a resolver with the static links from the parameters and no observation.
    pub fn new(params: Params) -> Result<Self, FrameError> {
        let mut tree = FrameTree::new();

        for link in params.static_links.iter() {
            tree.set_static(&link.parent, &link.child, link.transform()?);
        }

        Ok(Self {
            params,
            tree,
            last_observation_s: None,
        })
    }

    /// Register a detection of the object in the sensor frame at `now_s`, replacing any earlier
    /// observation.
    pub fn observe(
        &mut self,
        position_m: &[f64; 3],
        orientation_q: &[f64; 4],
        now_s: f64,
    ) -> Result<(), FrameError> {
        let transform = isometry_from_parts(position_m, orientation_q)?;

        self.tree.set_transform(
            &self.params.sensor_frame,
            &self.params.object_frame,
            transform,
            now_s,
        );
        self.last_observation_s = Some(now_s);

        trace!("Object observed at {:?} in {}", position_m, self.params.sensor_frame);

        Ok(())
    }

    /// Register the first pose of a detection event.
    ///
    /// Returns `Ok(false)` if the event contained no detections, which leaves the previous
    /// observation in place.
    pub fn observe_detections(
        &mut self,
        detections: &MarkerDetections,
        now_s: f64,
    ) -> Result<bool, FrameError> {
        if detections.frame_id != self.params.sensor_frame {
            return Err(FrameError::Malformed(format!(
                "detections are in {:?}, expected {:?}",
                detections.frame_id, self.params.sensor_frame
            )));
        }

        match detections.poses.first() {
            Some(pose) => {
                self.observe(&pose.position_m, &pose.orientation_q, now_s)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Position of `object` in `base`.
    pub fn resolve_between(
        &self,
        base: &str,
        object: &str,
        at: LookupTime,
    ) -> Result<Vector3<f64>, FrameError> {
        self.tree
            .lookup(base, object, at)
            .map(|t| t.translation.vector)
    }

    /// Session time of the latest observation.
    pub fn last_observation_s(&self) -> Option<f64> {
        self.last_observation_s
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl TargetSource for TargetResolver {
    fn resolve(&self, now_s: f64) -> Result<Vector3<f64>, FrameError> {
        let at = match self.params.max_observation_age_s {
            Some(tolerance_s) => LookupTime::At {
                time_s: now_s,
                tolerance_s,
            },
            None => LookupTime::Latest,
        };

        self.resolve_between(&self.params.base_frame, &self.params.object_frame, at)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frames::StaticLink;
    use approx::assert_relative_eq;
    use chrono::Utc;
    use comms_if::eqpt::cam::MarkerPose;

    /// Sensor coincident with the arm base.
    fn identity_params() -> Params {
        Params {
            base_frame: "px100/base_link".into(),
            sensor_frame: "camera_color_optical_frame".into(),
            object_frame: "object_frame".into(),
            max_observation_age_s: None,
            static_links: vec![StaticLink {
                parent: "px100/base_link".into(),
                child: "camera_color_optical_frame".into(),
                translation_m: [0.0; 3],
                rotation_q: [0.0, 0.0, 0.0, 1.0],
            }],
        }
    }

    fn detections(frame_id: &str, poses: Vec<MarkerPose>) -> MarkerDetections {
        MarkerDetections {
            timestamp: Utc::now(),
            frame_id: frame_id.into(),
            poses,
        }
    }

    #[test]
    fn test_unavailable_before_detection() {
        let resolver = TargetResolver::new(identity_params()).unwrap();

        assert_eq!(
            resolver.resolve(0.0),
            Err(FrameError::UnknownFrame("object_frame".into()))
        );
        assert_eq!(resolver.last_observation_s(), None);
    }

    #[test]
    fn test_identity_mount_resolves_detection() {
        let mut resolver = TargetResolver::new(identity_params()).unwrap();

        resolver
            .observe(&[0.20, 0.00, 0.05], &[0.0, 0.0, 0.0, 1.0], 1.0)
            .unwrap();

        assert_relative_eq!(resolver.resolve(1.5).unwrap(), Vector3::new(0.20, 0.0, 0.05));
    }

    #[test]
    fn test_only_first_pose_used() {
        let mut resolver = TargetResolver::new(identity_params()).unwrap();
        let pose = |x| MarkerPose {
            position_m: [x, 0.0, 0.0],
            orientation_q: [0.0, 0.0, 0.0, 1.0],
        };

        let seen = resolver
            .observe_detections(
                &detections("camera_color_optical_frame", vec![pose(0.1), pose(0.3)]),
                1.0,
            )
            .unwrap();
        assert!(seen);
        assert_relative_eq!(resolver.resolve(1.0).unwrap().x, 0.1);

        // An empty event keeps the previous observation
        let seen = resolver
            .observe_detections(&detections("camera_color_optical_frame", vec![]), 2.0)
            .unwrap();
        assert!(!seen);
        assert_eq!(resolver.last_observation_s(), Some(1.0));

        // As does a malformed one
        assert!(resolver
            .observe(&[0.2, f64::INFINITY, 0.0], &[0.0, 0.0, 0.0, 1.0], 3.0)
            .is_err());
        assert!(resolver
            .observe_detections(&detections("camera_link", vec![pose(0.5)]), 3.0)
            .is_err());
        assert_relative_eq!(resolver.resolve(3.0).unwrap().x, 0.1);
    }

    #[test]
    fn test_max_age() {
        let mut params = identity_params();
        params.max_observation_age_s = Some(1.0);
        let mut resolver = TargetResolver::new(params).unwrap();

        resolver
            .observe(&[0.2, 0.0, 0.05], &[0.0, 0.0, 0.0, 1.0], 5.0)
            .unwrap();

        assert!(resolver.resolve(5.5).is_ok());
        assert!(matches!(
            resolver.resolve(7.0),
            Err(FrameError::Stale { .. })
        ));
    }

    #[test]
    fn test_shipped_frames() {
        let params: Params =
            util::params::from_str(include_str!("../../../params/frames.toml")).unwrap();
        let mount = params.static_links[0].translation_m;
        let mut resolver = TargetResolver::new(params).unwrap();

        // An object at the optical centre sits where the camera is mounted
        resolver
            .observe(&[0.0; 3], &[0.0, 0.0, 0.0, 1.0], 0.0)
            .unwrap();
        assert_relative_eq!(
            resolver.resolve(0.0).unwrap(),
            Vector3::from(mount),
            epsilon = 1e-9
        );
    }
}

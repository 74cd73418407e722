//! # Frames module
//!
//! A small transform tree relating the arm base, the camera and the detected object. Every frame
//! other than a root has exactly one parent, related to it by a rigid transform which is either
//! static (fixed mounting) or dynamic (stamped with the time it was observed).
//!
//! Lookups walk both frames up to their common ancestor and compose the transforms on the way,
//! failing with a [`FrameError`] when the frames are not connected or a dynamic link is too old.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod target;

pub use params::*;
pub use target::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Isometry3;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Longest chain of parents followed before the tree is assumed to contain a loop.
const MAX_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tree of named coordinate frames.
#[derive(Debug, Clone, Default)]
pub struct FrameTree {
    /// Links keyed by the child frame name.
    links: HashMap<String, Link>,
}

/// The link from a frame to its parent.
#[derive(Debug, Clone)]
struct Link {
    parent: String,

    /// Pose of the child in the parent frame.
    transform: Isometry3<f64>,

    /// Time the link was observed, `None` for static links.
    stamp_s: Option<f64>,
}

/// One frame visited while walking from a frame up to its root.
struct Visit<'a> {
    frame: &'a str,

    /// Pose of the start frame in this frame.
    start_in_frame: Isometry3<f64>,

    /// The link which was followed to reach this frame.
    via: Option<(&'a str, Option<f64>)>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The time at which a lookup is made.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LookupTime {
    /// Use the latest value of every link regardless of age.
    Latest,

    /// Require every dynamic link on the path to be stamped within `tolerance_s` of `time_s`.
    At { time_s: f64, tolerance_s: f64 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("Frame {0:?} does not exist in the tree")]
    UnknownFrame(String),

    #[error("Frames {target_frame:?} and {source_frame:?} are not connected")]
    NotConnected {
        target_frame: String,
        source_frame: String,
    },

    #[error("Link to {child:?} was observed at {stamp_s:.3} s, too far from the lookup at {time_s:.3} s")]
    Stale {
        child: String,
        stamp_s: f64,
        time_s: f64,
    },

    #[error("Exceeded the maximum tree depth walking up from {0:?}, the tree contains a loop")]
    TooDeep(String),

    #[error("Malformed transform: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FrameTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fixed link placing `child` at `transform` in `parent`.
    pub fn set_static(&mut self, parent: &str, child: &str, transform: Isometry3<f64>) {
        self.set_link(parent, child, transform, None);
    }

    /// Register or overwrite a dynamic link placing `child` at `transform` in `parent`, observed
    /// at `stamp_s`.
    pub fn set_transform(
        &mut self,
        parent: &str,
        child: &str,
        transform: Isometry3<f64>,
        stamp_s: f64,
    ) {
        self.set_link(parent, child, transform, Some(stamp_s));
    }

    /// True if the frame appears anywhere in the tree.
    pub fn contains(&self, frame: &str) -> bool {
        self.links.contains_key(frame) || self.links.values().any(|l| l.parent == frame)
    }

    /// Get the transform which maps points expressed in `source` into `target`, which is also the
    /// pose of `source` in `target`.
    pub fn lookup(
        &self,
        target: &str,
        source: &str,
        at: LookupTime,
    ) -> Result<Isometry3<f64>, FrameError> {
        for frame in [target, source].iter() {
            if !self.contains(frame) {
                return Err(FrameError::UnknownFrame(frame.to_string()));
            }
        }

        let target_path = self.walk(target)?;
        let source_path = self.walk(source)?;

        // First ancestor of the target which the source also passes through
        let (ti, si) = target_path
            .iter()
            .enumerate()
            .find_map(|(ti, t)| {
                source_path
                    .iter()
                    .position(|s| s.frame == t.frame)
                    .map(|si| (ti, si))
            })
            .ok_or_else(|| FrameError::NotConnected {
                target_frame: target.into(),
                source_frame: source.into(),
            })?;

        if let LookupTime::At {
            time_s,
            tolerance_s,
        } = at
        {
            let used = target_path[1..=ti].iter().chain(source_path[1..=si].iter());
            for visit in used {
                if let Some((child, Some(stamp_s))) = visit.via {
                    if (stamp_s - time_s).abs() > tolerance_s {
                        return Err(FrameError::Stale {
                            child: child.into(),
                            stamp_s,
                            time_s,
                        });
                    }
                }
            }
        }

        Ok(target_path[ti].start_in_frame.inverse() * source_path[si].start_in_frame)
    }

    fn set_link(
        &mut self,
        parent: &str,
        child: &str,
        transform: Isometry3<f64>,
        stamp_s: Option<f64>,
    ) {
        self.links.insert(
            child.into(),
            Link {
                parent: parent.into(),
                transform,
                stamp_s,
            },
        );
    }

    /// Walk from `start` up to its root.
    fn walk<'a>(&'a self, start: &'a str) -> Result<Vec<Visit<'a>>, FrameError> {
        let mut path = vec![Visit {
            frame: start,
            start_in_frame: Isometry3::identity(),
            via: None,
        }];

        let mut current = start;
        let mut acc = Isometry3::identity();

        while let Some(link) = self.links.get(current) {
            if path.len() > MAX_DEPTH {
                return Err(FrameError::TooDeep(start.into()));
            }

            acc = link.transform * acc;
            path.push(Visit {
                frame: &link.parent,
                start_in_frame: acc,
                via: Some((current, link.stamp_s)),
            });
            current = &link.parent;
        }

        Ok(path)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn offset(x: f64, y: f64, z: f64) -> Isometry3<f64> {
        Isometry3::translation(x, y, z)
    }

    #[test]
    fn test_lookup_composes_through_common_ancestor() {
        let mut tree = FrameTree::new();
        tree.set_static("base", "camera", offset(0.0, 0.0, 0.3));
        tree.set_static("base", "arm", offset(0.1, 0.0, 0.0));
        tree.set_transform("camera", "object", offset(0.2, 0.0, -0.25), 1.0);

        let t = tree.lookup("arm", "object", LookupTime::Latest).unwrap();
        assert_relative_eq!(t.translation.vector, Vector3::new(0.1, 0.0, 0.05));

        let back = tree.lookup("object", "arm", LookupTime::Latest).unwrap();
        assert_relative_eq!(back.translation.vector, Vector3::new(-0.1, 0.0, -0.05));

        let same = tree.lookup("camera", "camera", LookupTime::Latest).unwrap();
        assert_relative_eq!(same, Isometry3::identity());
    }

    #[test]
    fn test_rotation_is_applied() {
        let mut tree = FrameTree::new();
        tree.set_static(
            "base",
            "sensor",
            Isometry3::new(Vector3::zeros(), Vector3::z() * std::f64::consts::FRAC_PI_2),
        );
        tree.set_transform("sensor", "object", offset(0.2, 0.0, 0.0), 0.0);

        let t = tree.lookup("base", "object", LookupTime::Latest).unwrap();
        assert_relative_eq!(
            t.translation.vector,
            Vector3::new(0.0, 0.2, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_unknown_and_disconnected() {
        let mut tree = FrameTree::new();
        tree.set_static("base", "camera", offset(0.0, 0.0, 0.3));
        tree.set_static("world", "table", offset(1.0, 0.0, 0.0));

        assert_eq!(
            tree.lookup("base", "object", LookupTime::Latest),
            Err(FrameError::UnknownFrame("object".into()))
        );
        assert!(matches!(
            tree.lookup("camera", "table", LookupTime::Latest),
            Err(FrameError::NotConnected { .. })
        ));
    }

    #[test]
    fn test_stale_links_rejected_at_time() {
        let mut tree = FrameTree::new();
        tree.set_static("base", "camera", offset(0.0, 0.0, 0.3));
        tree.set_transform("camera", "object", offset(0.2, 0.0, 0.0), 10.0);

        let at = |time_s| LookupTime::At {
            time_s,
            tolerance_s: 0.5,
        };

        assert!(tree.lookup("base", "object", at(10.4)).is_ok());
        assert!(matches!(
            tree.lookup("base", "object", at(11.0)),
            Err(FrameError::Stale { .. })
        ));
        assert!(tree.lookup("base", "object", LookupTime::Latest).is_ok());

        // Static links never go stale
        assert!(tree.lookup("base", "camera", at(1000.0)).is_ok());

        // Overwriting refreshes the link
        tree.set_transform("camera", "object", offset(0.2, 0.0, 0.0), 11.0);
        assert!(tree.lookup("base", "object", at(11.0)).is_ok());
    }

    #[test]
    fn test_loop_is_too_deep() {
        let mut tree = FrameTree::new();
        tree.set_static("a", "b", offset(0.0, 0.0, 0.1));
        tree.set_static("b", "a", offset(0.0, 0.0, 0.1));

        assert!(matches!(
            tree.lookup("a", "b", LookupTime::Latest),
            Err(FrameError::TooDeep(_))
        ));
    }
}

//! Relative Pose Resolver - observer camera → target body transforms per pair.
//!
//! Lookup failures are expected in steady state (no pose yet, stale poses,
//! frames the graph does not know). They are returned as an explicit
//! [`Resolution::Unavailable`] and the projection engine turns them into the
//! fallback point; nothing here is fatal.

use std::collections::{HashMap, HashSet};

use nalgebra::Vector3;
use tracing::debug;

use crate::geometry::SE3;
use crate::state::AgentId;

use super::frame_graph::{FrameGraph, FrameNames, LookupError};

/// Transform from an observer's camera frame to a target's body frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeTransform {
    pub observer: AgentId,
    pub target: AgentId,
    /// T_cam_target: maps target-body points into the observer camera frame.
    pub t_cam_target: SE3,
}

impl RelativeTransform {
    /// Target body origin in the observer's camera frame.
    pub fn translation(&self) -> &Vector3<f64> {
        &self.t_cam_target.translation
    }
}

/// Outcome of resolving one ordered pair on one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Fresh transform from the frame graph.
    Resolved(RelativeTransform),
    /// Lookup failed; the last successful transform for the pair is reused.
    Held {
        transform: RelativeTransform,
        error: LookupError,
    },
    /// Lookup failed and nothing is held.
    Unavailable(LookupError),
}

impl Resolution {
    pub fn transform(&self) -> Option<&RelativeTransform> {
        match self {
            Resolution::Resolved(t) | Resolution::Held { transform: t, .. } => Some(t),
            Resolution::Unavailable(_) => None,
        }
    }

    pub fn translation(&self) -> Option<&Vector3<f64>> {
        self.transform().map(RelativeTransform::translation)
    }
}

/// Resolves ordered `(observer, target)` pairs against a [`FrameGraph`].
pub struct RelativePoseResolver {
    frames: Vec<FrameNames>,

    /// Reuse the last successful transform when a lookup fails.
    hold_last: bool,

    /// Last successful transform per pair (only filled when `hold_last`).
    last_good: HashMap<(AgentId, AgentId), RelativeTransform>,

    /// Pairs whose most recent lookup failed, to log only on transitions.
    failing: HashSet<(AgentId, AgentId)>,
}

impl RelativePoseResolver {
    pub fn new(frames: Vec<FrameNames>, hold_last: bool) -> Self {
        Self {
            frames,
            hold_last,
            last_good: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    pub fn frames(&self, agent: AgentId) -> Option<&FrameNames> {
        self.frames.get(agent.index())
    }

    /// Resolve the latest transform from `observer`'s camera to `target`'s body.
    pub fn resolve(
        &mut self,
        graph: &dyn FrameGraph,
        observer: AgentId,
        target: AgentId,
    ) -> Resolution {
        let key = (observer, target);
        let lookup = match (self.frames.get(observer.index()), self.frames.get(target.index())) {
            (Some(obs), Some(tgt)) => graph.lookup_latest(&obs.camera, &tgt.body),
            (None, _) => Err(LookupError::UnknownFrame(observer.to_string())),
            (_, None) => Err(LookupError::UnknownFrame(target.to_string())),
        };

        match lookup {
            Ok(t_cam_target) => {
                if self.failing.remove(&key) {
                    debug!("{} -> {}: transform available again", observer, target);
                }
                let transform = RelativeTransform {
                    observer,
                    target,
                    t_cam_target,
                };
                if self.hold_last {
                    self.last_good.insert(key, transform);
                }
                Resolution::Resolved(transform)
            }
            Err(error) => {
                if self.failing.insert(key) {
                    debug!("{} -> {}: transform unavailable: {}", observer, target, error);
                }
                match self.last_good.get(&key) {
                    Some(transform) if self.hold_last => Resolution::Held {
                        transform: *transform,
                        error,
                    },
                    _ => Resolution::Unavailable(error),
                }
            }
        }
    }

    /// Number of pairs whose latest lookup failed.
    pub fn failing_pairs(&self) -> usize {
        self.failing.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use std::cell::RefCell;

    /// Frame graph returning a scripted translation per (target, source) frame pair.
    struct ScriptedGraph {
        entries: RefCell<HashMap<(String, String), Vector3<f64>>>,
    }

    impl ScriptedGraph {
        fn new() -> Self {
            Self {
                entries: RefCell::new(HashMap::new()),
            }
        }

        fn set(&self, target: &str, source: &str, t: Vector3<f64>) {
            self.entries
                .borrow_mut()
                .insert((target.to_string(), source.to_string()), t);
        }

        fn clear(&self) {
            self.entries.borrow_mut().clear();
        }
    }

    impl FrameGraph for ScriptedGraph {
        fn lookup_latest(&self, target: &str, source: &str) -> Result<SE3, LookupError> {
            self.entries
                .borrow()
                .get(&(target.to_string(), source.to_string()))
                .map(|t| SE3::from_quaternion(UnitQuaternion::identity(), *t))
                .ok_or_else(|| LookupError::NoData(source.to_string()))
        }
    }

    fn frames(count: usize) -> Vec<FrameNames> {
        (0..count)
            .map(|i| FrameNames::for_agent("hummingbird", AgentId(i)))
            .collect()
    }

    #[test]
    fn test_resolve_uses_camera_and_body_frames() {
        let graph = ScriptedGraph::new();
        graph.set(
            "/hummingbird0/base_link_cam",
            "/hummingbird1/base_link",
            Vector3::new(2.0, 1.0, 0.0),
        );
        let mut resolver = RelativePoseResolver::new(frames(2), false);

        let res = resolver.resolve(&graph, AgentId(0), AgentId(1));
        assert!(matches!(res, Resolution::Resolved(_)));
        assert_relative_eq!(*res.translation().unwrap(), Vector3::new(2.0, 1.0, 0.0));

        // Reverse direction is a different lookup.
        let res = resolver.resolve(&graph, AgentId(1), AgentId(0));
        assert!(matches!(res, Resolution::Unavailable(LookupError::NoData(_))));
    }

    #[test]
    fn test_failure_resets_without_hold() {
        let graph = ScriptedGraph::new();
        graph.set(
            "/hummingbird0/base_link_cam",
            "/hummingbird1/base_link",
            Vector3::new(2.0, 1.0, 0.0),
        );
        let mut resolver = RelativePoseResolver::new(frames(2), false);
        assert!(matches!(
            resolver.resolve(&graph, AgentId(0), AgentId(1)),
            Resolution::Resolved(_)
        ));

        graph.clear();
        let res = resolver.resolve(&graph, AgentId(0), AgentId(1));
        assert!(res.translation().is_none());
        assert_eq!(resolver.failing_pairs(), 1);
    }

    #[test]
    fn test_failure_holds_last_transform_when_enabled() {
        let graph = ScriptedGraph::new();
        graph.set(
            "/hummingbird0/base_link_cam",
            "/hummingbird1/base_link",
            Vector3::new(2.0, 1.0, 0.0),
        );
        let mut resolver = RelativePoseResolver::new(frames(2), true);
        resolver.resolve(&graph, AgentId(0), AgentId(1));

        graph.clear();
        let res = resolver.resolve(&graph, AgentId(0), AgentId(1));
        assert!(matches!(res, Resolution::Held { .. }));
        assert_relative_eq!(*res.translation().unwrap(), Vector3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn test_hold_without_prior_success_is_unavailable() {
        let graph = ScriptedGraph::new();
        let mut resolver = RelativePoseResolver::new(frames(2), true);
        let res = resolver.resolve(&graph, AgentId(0), AgentId(1));
        assert!(matches!(res, Resolution::Unavailable(_)));
    }

    #[test]
    fn test_recovery_clears_failing_pair() {
        let graph = ScriptedGraph::new();
        let mut resolver = RelativePoseResolver::new(frames(2), false);
        resolver.resolve(&graph, AgentId(0), AgentId(1));
        assert_eq!(resolver.failing_pairs(), 1);

        graph.set(
            "/hummingbird0/base_link_cam",
            "/hummingbird1/base_link",
            Vector3::new(1.0, 0.0, 0.0),
        );
        assert!(matches!(
            resolver.resolve(&graph, AgentId(0), AgentId(1)),
            Resolution::Resolved(_)
        ));
        assert_eq!(resolver.failing_pairs(), 0);
    }

    #[test]
    fn test_agent_outside_session_is_unavailable() {
        let graph = ScriptedGraph::new();
        let mut resolver = RelativePoseResolver::new(frames(2), false);
        let res = resolver.resolve(&graph, AgentId(0), AgentId(4));
        assert_eq!(res, Resolution::Unavailable(LookupError::UnknownFrame("agent4".to_string())));
    }
}

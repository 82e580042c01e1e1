//! Frame graph boundary: named coordinate frames and transform lookups.
//!
//! Every agent contributes two frames, its body (`/{ns}{i}/base_link`) and
//! its onboard camera (`/{ns}{i}/base_link_cam`). A [`FrameGraph`] answers
//! "where is frame `source` as seen from frame `target`" at the latest time it
//! knows about.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::geometry::{CameraMount, SE3};
use crate::state::{AgentId, VehicleStateStore};

/// Why a transform lookup produced no result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    #[error("unknown frame {0}")]
    UnknownFrame(String),

    #[error("no pose received yet for frame {0}")]
    NoData(String),

    #[error("pose for frame {frame} is stale ({age:?} old)")]
    Stale { frame: String, age: Duration },

    #[error("pose for frame {0} has a degenerate orientation")]
    Degenerate(String),
}

/// Source of relative transforms between named frames.
pub trait FrameGraph {
    /// Latest transform `T_target_source`, mapping points expressed in
    /// `source_frame` into `target_frame`. Its translation is the origin of
    /// `source_frame` seen from `target_frame`.
    fn lookup_latest(&self, target_frame: &str, source_frame: &str) -> Result<SE3, LookupError>;
}

/// Frame names of one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNames {
    pub body: String,
    pub camera: String,
}

impl FrameNames {
    pub fn for_agent(namespace: &str, agent: AgentId) -> Self {
        Self {
            body: format!("/{}{}/base_link", namespace, agent.0),
            camera: format!("/{}{}/base_link_cam", namespace, agent.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Body,
    Camera,
}

/// Reverse index from frame name to the agent (and part of it) it belongs to.
#[derive(Debug, Clone, Default)]
pub struct FrameIndex {
    frames: HashMap<String, (AgentId, FrameKind)>,
}

impl FrameIndex {
    pub fn new(names: &[FrameNames]) -> Self {
        let mut frames = HashMap::with_capacity(names.len() * 2);
        for (idx, name) in names.iter().enumerate() {
            frames.insert(name.body.clone(), (AgentId(idx), FrameKind::Body));
            frames.insert(name.camera.clone(), (AgentId(idx), FrameKind::Camera));
        }
        Self { frames }
    }

    fn get(&self, frame: &str) -> Result<(AgentId, FrameKind), LookupError> {
        self.frames
            .get(frame)
            .copied()
            .ok_or_else(|| LookupError::UnknownFrame(frame.to_string()))
    }
}

/// Frame graph evaluated directly from the vehicle state store.
///
/// Body frames sit at each agent's stored pose; camera frames add the shared
/// [`CameraMount`]. Poses older than `max_age` (when set) count as stale.
pub struct StoreFrameGraph<'a> {
    store: &'a VehicleStateStore,
    index: &'a FrameIndex,
    mount: &'a CameraMount,
    max_age: Option<Duration>,
    now: Instant,
}

impl<'a> StoreFrameGraph<'a> {
    pub fn new(
        store: &'a VehicleStateStore,
        index: &'a FrameIndex,
        mount: &'a CameraMount,
        max_age: Option<Duration>,
        now: Instant,
    ) -> Self {
        Self {
            store,
            index,
            mount,
            max_age,
            now,
        }
    }

    /// Pose of a named frame in the world (T_world_frame).
    fn world_pose(&self, frame: &str) -> Result<SE3, LookupError> {
        let (agent, kind) = self.index.get(frame)?;
        let state = self
            .store
            .get(agent)
            .ok_or_else(|| LookupError::UnknownFrame(frame.to_string()))?;

        let age = state
            .age(self.now)
            .ok_or_else(|| LookupError::NoData(frame.to_string()))?;
        if let Some(max_age) = self.max_age {
            if age > max_age {
                return Err(LookupError::Stale {
                    frame: frame.to_string(),
                    age,
                });
            }
        }

        let t_world_body = state
            .body_pose()
            .ok_or_else(|| LookupError::Degenerate(frame.to_string()))?;
        Ok(match kind {
            FrameKind::Body => t_world_body,
            FrameKind::Camera => self.mount.camera_pose(&t_world_body),
        })
    }
}

impl FrameGraph for StoreFrameGraph<'_> {
    fn lookup_latest(&self, target_frame: &str, source_frame: &str) -> Result<SE3, LookupError> {
        let t_world_target = self.world_pose(target_frame)?;
        let t_world_source = self.world_pose(source_frame)?;
        Ok(t_world_target.inverse().compose(&t_world_source))
    }
}

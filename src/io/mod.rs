//! File inputs: session configuration and recorded pose logs.

pub mod config;
pub mod pose_log;

pub use config::{
    AgentsConfig, InitialPose, OutputConfig, PublishConfig, RenderConfig, RunConfig,
    SessionConfig, SinkKind,
};
pub use pose_log::{PoseRecord, load_pose_log, read_pose_log, replay, spawn_replay};

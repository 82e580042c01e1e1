//! Render Bridge Adapter - boundary to the external image renderer.
//!
//! The session registers every agent once, connects once after a startup
//! grace period, then on each render tick pushes every agent's state and,
//! only when the connection is ready, requests and collects a frame per agent.

pub mod offline;
pub mod state;

pub use offline::OfflineBridge;
pub use state::BridgeState;

use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::camera::CameraConfig;
use crate::state::{AgentId, VehicleState};

/// Scene loaded by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneId {
    Industrial,
    #[default]
    Warehouse,
    Garage,
    NatureForest,
}

impl SceneId {
    /// Numeric scene identifier understood by the renderer.
    pub fn index(self) -> u32 {
        match self {
            SceneId::Industrial => 0,
            SceneId::Warehouse => 1,
            SceneId::Garage => 2,
            SceneId::NatureForest => 3,
        }
    }
}

/// Interface onto the external renderer.
pub trait RenderBridge {
    /// Register an agent and its camera. Called once per agent at session start.
    fn register_agent(
        &mut self,
        agent: AgentId,
        camera: &CameraConfig,
        initial: &VehicleState,
    ) -> Result<()>;

    /// Single connection attempt. The caller caches the result.
    fn connect(&mut self, scene: SceneId) -> bool;

    /// Forward the latest render-frame state of an agent.
    fn push_state(&mut self, agent: AgentId, state: &VehicleState) -> Result<()>;

    /// Ask the renderer to synthesize frames for the pushed states.
    fn synthesize_frame(&mut self) -> Result<()>;

    /// Fetch the most recently synthesized frame of an agent's camera.
    /// May block until the renderer responds.
    fn retrieve_frame(&mut self, agent: AgentId) -> Result<RgbImage>;
}

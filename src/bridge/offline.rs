//! In-process stand-in for the external renderer.
//!
//! Produces a flat two-tone canvas (sky over floor) at each registered camera's
//! resolution. It is enough to drive the annotation pipeline end to end when
//! no renderer is attached, and it records what the session pushed.

use anyhow::{Context, Result, bail};
use image::{Rgb, RgbImage};
use tracing::{debug, info};

use crate::camera::CameraConfig;
use crate::state::{AgentId, VehicleState};

use super::{RenderBridge, SceneId};

const SKY: Rgb<u8> = Rgb([150, 180, 210]);
const FLOOR: Rgb<u8> = Rgb([90, 90, 90]);

#[derive(Debug, Clone)]
struct OfflineCamera {
    width: u32,
    height: u32,
    state: VehicleState,
    frame: Option<RgbImage>,
}

/// Render bridge that synthesizes placeholder frames locally.
#[derive(Debug, Clone)]
pub struct OfflineBridge {
    cameras: Vec<Option<OfflineCamera>>,
    connected_scene: Option<SceneId>,
}

impl OfflineBridge {
    pub fn new() -> Self {
        Self {
            cameras: Vec::new(),
            connected_scene: None,
        }
    }

    /// Last state pushed (or registered) for an agent.
    pub fn last_state(&self, agent: AgentId) -> Option<&VehicleState> {
        self.camera(agent).map(|cam| &cam.state)
    }

    fn camera(&self, agent: AgentId) -> Option<&OfflineCamera> {
        self.cameras.get(agent.index()).and_then(Option::as_ref)
    }

    fn camera_mut(&mut self, agent: AgentId) -> Result<&mut OfflineCamera> {
        self.cameras
            .get_mut(agent.index())
            .and_then(Option::as_mut)
            .with_context(|| format!("{} is not registered with the offline renderer", agent))
    }
}

impl Default for OfflineBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBridge for OfflineBridge {
    fn register_agent(
        &mut self,
        agent: AgentId,
        camera: &CameraConfig,
        initial: &VehicleState,
    ) -> Result<()> {
        if self.cameras.len() <= agent.index() {
            self.cameras.resize(agent.index() + 1, None);
        }
        self.cameras[agent.index()] = Some(OfflineCamera {
            width: camera.width,
            height: camera.height,
            state: *initial,
            frame: None,
        });
        debug!("Offline renderer registered {} ({}x{})", agent, camera.width, camera.height);
        Ok(())
    }

    fn connect(&mut self, scene: SceneId) -> bool {
        info!("Offline renderer connected (scene {:?}, index {})", scene, scene.index());
        self.connected_scene = Some(scene);
        true
    }

    fn push_state(&mut self, agent: AgentId, state: &VehicleState) -> Result<()> {
        self.camera_mut(agent)?.state = *state;
        Ok(())
    }

    fn synthesize_frame(&mut self) -> Result<()> {
        if self.connected_scene.is_none() {
            bail!("offline renderer is not connected");
        }
        for camera in self.cameras.iter_mut().flatten() {
            let horizon = camera.height / 2;
            camera.frame = Some(RgbImage::from_fn(camera.width, camera.height, |_, y| {
                if y < horizon { SKY } else { FLOOR }
            }));
        }
        Ok(())
    }

    fn retrieve_frame(&mut self, agent: AgentId) -> Result<RgbImage> {
        self.camera_mut(agent)?
            .frame
            .clone()
            .with_context(|| format!("no frame synthesized yet for {}", agent))
    }
}

//! Session - owns every agent and runs the two periodic drivers.
//!
//! One `Session` replaces the per-agent duplicated state of a fixed-size rig:
//! agents live in a `Vec<Agent>` of runtime length N, and the store, the
//! resolver, the render bridge and the output sink are all owned here. The
//! session is driven from a single thread (see
//! [`Dispatcher`](super::dispatcher::Dispatcher)); nothing in it is shared.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use image::{Rgb, RgbImage};
use tracing::{debug, info, warn};

use crate::bridge::{BridgeState, RenderBridge, SceneId};
use crate::camera::{CameraConfig, CameraInfo, CameraModel, Projector};
use crate::geometry::{CameraMount, telemetry_orientation_to_render, telemetry_position_to_render};
use crate::io::SessionConfig;
use crate::publish::{AgentOutput, ChannelNames, MarkerStyle, OutputSink, TrackFrame, annotate};
use crate::resolve::{FrameGraph, FrameIndex, FrameNames, RelativePoseResolver, StoreFrameGraph};
use crate::state::{AgentId, VehicleState, VehicleStateStore, ordered_pairs};

use super::messages::PoseMsg;

/// Where relative transforms come from.
pub enum FrameSource {
    /// Computed from the session's own vehicle state store.
    Store,
    /// An external transform tree.
    External(Box<dyn FrameGraph>),
}

/// Per-agent publishing state.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub frames: FrameNames,
    pub channels: ChannelNames,
    /// Latest frame retrieved from the renderer.
    last_frame: Option<RgbImage>,
    /// Track frame of the latest publish tick.
    track: Option<TrackFrame>,
}

impl Agent {
    fn new(namespace: &str, id: AgentId) -> Self {
        Self {
            id,
            frames: FrameNames::for_agent(namespace, id),
            channels: ChannelNames::for_agent(namespace, id),
            last_frame: None,
            track: None,
        }
    }

    pub fn last_frame(&self) -> Option<&RgbImage> {
        self.last_frame.as_ref()
    }

    pub fn track(&self) -> Option<&TrackFrame> {
        self.track.as_ref()
    }
}

pub struct Session {
    agents: Vec<Agent>,
    store: VehicleStateStore,

    camera_config: CameraConfig,
    camera_info: CameraInfo,
    projector: Projector,
    mount: CameraMount,

    frame_index: FrameIndex,
    frame_source: FrameSource,
    resolver: RelativePoseResolver,
    max_pose_age: Option<std::time::Duration>,

    bridge: Option<Box<dyn RenderBridge>>,
    bridge_state: BridgeState,
    scene: SceneId,

    sink: Box<dyn OutputSink>,
    marker: MarkerStyle,
    /// Published when an agent has no rendered frame yet.
    blank_frame: RgbImage,

    render_ticks: u64,
    publish_ticks: u64,
}

impl Session {
    /// Build a session from a validated configuration.
    ///
    /// Every agent is registered with the bridge here, once. With rendering
    /// disabled (or no bridge) the bridge stays [`BridgeState::Disabled`] and
    /// the session publishes blank frames.
    pub fn new(
        config: &SessionConfig,
        bridge: Option<Box<dyn RenderBridge>>,
        sink: Box<dyn OutputSink>,
    ) -> Self {
        let count = config.agents.count;
        let namespace = &config.agents.namespace;
        let agents: Vec<Agent> = (0..count)
            .map(|idx| Agent::new(namespace, AgentId(idx)))
            .collect();

        let mut store = VehicleStateStore::new(count);
        for pose in &config.agents.initial_poses {
            let seeded = VehicleState {
                position: telemetry_position_to_render(&pose.position()),
                orientation: telemetry_orientation_to_render(&pose.orientation()),
                updated_at: None,
            };
            if let Err(e) = store.seed(AgentId(pose.agent), seeded) {
                warn!("Initial pose dropped: {:#}", e);
            }
        }

        let camera = CameraModel::from_config(&config.camera);
        let frames: Vec<FrameNames> = agents.iter().map(|a| a.frames.clone()).collect();

        let bridge = match bridge {
            Some(bridge) if config.render.enabled => Some(bridge),
            Some(_) => {
                info!("Rendering disabled, frames will be blank");
                None
            }
            None => {
                if config.render.enabled {
                    warn!("Rendering enabled but no render bridge given, frames will be blank");
                }
                None
            }
        };

        let mut session = Self {
            agents,
            store,
            camera_info: camera.camera_info(&config.camera.frame_id),
            projector: Projector::new(camera, config.publish.behind_camera),
            mount: config.camera.mount(),
            camera_config: config.camera.clone(),
            frame_index: FrameIndex::new(&frames),
            frame_source: FrameSource::Store,
            resolver: RelativePoseResolver::new(frames, config.publish.hold_last_transform),
            max_pose_age: config.publish.max_pose_age(),
            bridge,
            bridge_state: BridgeState::Disabled,
            scene: config.render.scene,
            sink,
            marker: config.publish.marker_style(),
            blank_frame: RgbImage::from_pixel(camera.width, camera.height, Rgb([0, 0, 0])),
            render_ticks: 0,
            publish_ticks: 0,
        };
        session.register_agents();

        info!(
            "Session ready: {} agents, camera {}x{} f={:.1}, bridge {:?}",
            session.agents.len(),
            camera.width,
            camera.height,
            camera.fx,
            session.bridge_state
        );
        session
    }

    /// Resolve relative transforms from an external frame graph instead of
    /// the vehicle state store.
    pub fn with_frame_graph(mut self, graph: Box<dyn FrameGraph>) -> Self {
        self.frame_source = FrameSource::External(graph);
        self
    }

    fn register_agents(&mut self) {
        let Some(bridge) = self.bridge.as_mut() else {
            return;
        };
        for agent in &self.agents {
            let initial = self.store.get(agent.id).copied().unwrap_or_default();
            if let Err(e) = bridge.register_agent(agent.id, &self.camera_config, &initial) {
                warn!("Failed to register {} with the renderer: {:#}", agent.id, e);
            }
        }
        self.bridge_state = BridgeState::Connecting;
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id.index())
    }

    pub fn track(&self, id: AgentId) -> Option<&TrackFrame> {
        self.agent(id).and_then(Agent::track)
    }

    pub fn store(&self) -> &VehicleStateStore {
        &self.store
    }

    pub fn camera(&self) -> &CameraModel {
        self.projector.camera()
    }

    pub fn camera_info(&self) -> &CameraInfo {
        &self.camera_info
    }

    pub fn bridge_state(&self) -> BridgeState {
        self.bridge_state
    }

    pub fn render_ticks(&self) -> u64 {
        self.render_ticks
    }

    pub fn publish_ticks(&self) -> u64 {
        self.publish_ticks
    }

    // ------------------------------------------------------------------------
    // Pose ingestion
    // ------------------------------------------------------------------------

    /// Commit one telemetry pose to the store. Returns `false` (and logs) when
    /// the agent is not part of the session.
    pub fn ingest_pose(&mut self, msg: &PoseMsg) -> bool {
        match self.store.update(msg.agent, msg.position, msg.orientation) {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping pose: {:#}", e);
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Render driver
    // ------------------------------------------------------------------------

    /// Single connection attempt. Only acts while the bridge is `Connecting`;
    /// the outcome is kept for the rest of the session.
    pub fn connect_bridge(&mut self) -> BridgeState {
        if self.bridge_state != BridgeState::Connecting {
            return self.bridge_state;
        }
        let Some(bridge) = self.bridge.as_mut() else {
            return self.bridge_state;
        };

        self.bridge_state = if bridge.connect(self.scene) {
            info!("Render bridge connected (scene {:?})", self.scene);
            BridgeState::Ready
        } else {
            warn!("Render bridge connection failed, continuing without frames");
            BridgeState::Unavailable
        };
        self.bridge_state
    }

    /// Push every agent's state and, when the bridge is ready, refresh every
    /// agent's frame. Returns whether frames were synthesized.
    pub fn render_tick(&mut self) -> bool {
        let Some(bridge) = self.bridge.as_mut() else {
            return false;
        };
        self.render_ticks += 1;

        for agent in &self.agents {
            let Some(state) = self.store.get(agent.id) else {
                continue;
            };
            if let Err(e) = bridge.push_state(agent.id, state) {
                debug!("push_state failed for {}: {:#}", agent.id, e);
            }
        }

        if !self.bridge_state.is_ready() {
            return false;
        }

        if let Err(e) = bridge.synthesize_frame() {
            warn!("Frame synthesis failed: {:#}", e);
            return false;
        }
        for agent in &mut self.agents {
            match bridge.retrieve_frame(agent.id) {
                Ok(frame) => agent.last_frame = Some(frame),
                Err(e) => debug!("No frame for {}, keeping previous: {:#}", agent.id, e),
            }
        }
        true
    }

    // ------------------------------------------------------------------------
    // Publish driver
    // ------------------------------------------------------------------------

    pub fn publish_tick(&mut self) {
        self.publish_tick_at(Instant::now(), unix_nanos());
    }

    /// Resolve and project every ordered pair, then annotate and publish every
    /// agent. All outputs of the tick carry `stamp_ns`.
    pub fn publish_tick_at(&mut self, now: Instant, stamp_ns: u64) {
        self.publish_ticks += 1;
        let tick = self.publish_ticks;
        let count = self.agents.len();

        let store_graph;
        let graph: &dyn FrameGraph = match &self.frame_source {
            FrameSource::Store => {
                store_graph = StoreFrameGraph::new(
                    &self.store,
                    &self.frame_index,
                    &self.mount,
                    self.max_pose_age,
                    now,
                );
                &store_graph
            }
            FrameSource::External(graph) => graph.as_ref(),
        };

        let mut tracks: Vec<TrackFrame> = self
            .agents
            .iter()
            .map(|agent| TrackFrame::new(agent.id, tick, stamp_ns, count.saturating_sub(1)))
            .collect();
        for (observer, target) in ordered_pairs(count) {
            let resolution = self.resolver.resolve(graph, observer, target);
            let point = self.projector.project_or_fallback(resolution.translation());
            tracks[observer.index()].push(target, point);
        }
        for (agent, track) in self.agents.iter_mut().zip(tracks) {
            agent.track = Some(track);
        }

        for agent in &self.agents {
            let Some(track) = agent.track.as_ref() else {
                continue;
            };
            let raw = agent.last_frame.as_ref().unwrap_or(&self.blank_frame);
            let annotated = annotate(raw, track, &self.marker);
            let output = AgentOutput {
                agent: agent.id,
                channels: &agent.channels,
                stamp_ns,
                raw,
                camera_info: &self.camera_info,
                annotated: &annotated,
                track,
            };
            if let Err(e) = self.sink.publish(&output) {
                warn!("Publishing {} failed: {:#}", agent.channels.track, e);
            }
        }
    }

    /// Flush the output sink. Called once when the dispatcher stops.
    pub fn finish(&mut self) {
        if let Err(e) = self.sink.flush() {
            warn!("Flushing output sink failed: {:#}", e);
        }
        info!(
            "Session finished after {} render / {} publish ticks ({} pairs unresolved)",
            self.render_ticks,
            self.publish_ticks,
            self.resolver.failing_pairs()
        );
    }
}

/// Nanoseconds since the UNIX epoch, saturating at zero for clocks set
/// before 1970.
pub fn unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

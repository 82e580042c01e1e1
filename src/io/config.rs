//! Session configuration (YAML).
//!
//! Every field has a default, so an empty file or a missing section is valid.
//! Loading never aborts the session: an unreadable file falls back to the
//! defaults, and individual out-of-range values are replaced by their default
//! with a warning.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bridge::SceneId;
use crate::camera::{BehindCameraPolicy, CameraConfig};
use crate::publish::MarkerStyle;
use crate::publish::annotate::{MAX_MARKER_RADIUS, MAX_MARKER_THICKNESS};
use crate::state::MAX_AGENTS;

/// Accepted loop rates. The lower bound keeps the timer period finite.
const RATE_HZ_RANGE: std::ops::RangeInclusive<f64> = 1.0e-3..=1.0e4;
/// Longest accepted duration setting (about 115 days).
const MAX_SECONDS: f64 = 1.0e7;
const MAX_RESOLUTION: u32 = 16_384;
const MAX_POSE_QUEUE: usize = 65_536;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub agents: AgentsConfig,
    pub camera: CameraConfig,
    pub render: RenderConfig,
    pub publish: PublishConfig,
    pub output: OutputConfig,
    pub session: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub count: usize,
    /// Prefix of every frame and channel name: `/{namespace}{i}/...`.
    pub namespace: String,
    pub initial_poses: Vec<InitialPose>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            count: 3,
            namespace: "hummingbird".to_string(),
            initial_poses: Vec::new(),
        }
    }
}

/// Spawn pose of one agent, telemetry convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialPose {
    pub agent: usize,
    pub position: [f64; 3],
    /// `[w, x, y, z]`
    #[serde(default = "identity_wxyz")]
    pub orientation: [f64; 4],
}

impl InitialPose {
    pub fn position(&self) -> Vector3<f64> {
        Vector3::from(self.position)
    }

    pub fn orientation(&self) -> Quaternion<f64> {
        let [w, x, y, z] = self.orientation;
        Quaternion::new(w, x, y, z)
    }
}

fn identity_wxyz() -> [f64; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub enabled: bool,
    pub scene: SceneId,
    pub rate_hz: f64,
    /// Blocking wait before the single connection attempt.
    pub startup_grace_s: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scene: SceneId::default(),
            rate_hz: 30.0,
            startup_grace_s: 5.0,
        }
    }
}

impl RenderConfig {
    pub fn startup_grace(&self) -> Duration {
        Duration::try_from_secs_f64(self.startup_grace_s)
            .unwrap_or_else(|_| Duration::from_secs_f64(RenderConfig::default().startup_grace_s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub rate_hz: f64,
    pub behind_camera: BehindCameraPolicy,
    /// Reuse the last good transform of a pair when its lookup fails.
    pub hold_last_transform: bool,
    /// Poses older than this are treated as unavailable. `None` disables the check.
    pub max_pose_age_s: Option<f64>,
    pub marker_radius: u32,
    pub marker_thickness: u32,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            rate_hz: 30.0,
            behind_camera: BehindCameraPolicy::default(),
            hold_last_transform: false,
            max_pose_age_s: None,
            marker_radius: 4,
            marker_thickness: 2,
        }
    }
}

impl PublishConfig {
    pub fn max_pose_age(&self) -> Option<Duration> {
        self.max_pose_age_s
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
    }

    pub fn marker_style(&self) -> MarkerStyle {
        MarkerStyle {
            radius: self.marker_radius,
            thickness: self.marker_thickness,
            ..MarkerStyle::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Trace,
    RerunSpawn,
    RerunSave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub sink: SinkKind,
    /// Recording path for [`SinkKind::RerunSave`].
    pub rrd_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            rrd_path: PathBuf::from("swarm_vision.rrd"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop after this long. `None` runs until shutdown.
    pub duration_s: Option<f64>,
    /// Capacity of the pose channel.
    pub pose_queue: usize,
    /// Stop once every pose producer has hung up.
    pub stop_on_feed_end: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration_s: None,
            pose_queue: 64,
            stop_on_feed_end: false,
        }
    }
}

impl RunConfig {
    pub fn duration(&self) -> Option<Duration> {
        self.duration_s
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
    }
}

impl SessionConfig {
    /// Parse a YAML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let config: SessionConfig = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config.validated())
    }

    /// Like [`SessionConfig::load`], but a missing or broken file yields the
    /// defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("No configuration file given, using defaults");
            return Self::default();
        };
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{:#}; using default configuration", e);
                Self::default()
            }
        }
    }

    /// Replace every out-of-range value with its default, warning for each.
    pub fn validated(mut self) -> Self {
        let agents = AgentsConfig::default();
        if self.agents.count == 0 || self.agents.count > MAX_AGENTS {
            warn!(
                "agents.count = {} outside 1..={}, using {}",
                self.agents.count, MAX_AGENTS, agents.count
            );
            self.agents.count = agents.count;
        }
        let count = self.agents.count;
        self.agents.initial_poses.retain(|pose| {
            let keep = pose.agent < count;
            if !keep {
                warn!("Ignoring initial pose for unknown agent {}", pose.agent);
            }
            keep
        });

        let camera = CameraConfig::default();
        if !(self.camera.fov_deg > 0.0 && self.camera.fov_deg < 180.0) {
            warn!("camera.fov_deg = {} outside (0, 180), using {}", self.camera.fov_deg, camera.fov_deg);
            self.camera.fov_deg = camera.fov_deg;
        }
        let dims = 1..=MAX_RESOLUTION;
        if !dims.contains(&self.camera.width) || !dims.contains(&self.camera.height) {
            warn!(
                "camera resolution {}x{} outside 1..={}, using {}x{}",
                self.camera.width, self.camera.height, MAX_RESOLUTION, camera.width, camera.height
            );
            self.camera.width = camera.width;
            self.camera.height = camera.height;
        }
        if self.camera.mount_offset.iter().any(|c| !c.is_finite()) {
            warn!("camera.mount_offset is not finite, using default");
            self.camera.mount_offset = camera.mount_offset;
        }
        let rotation_norm = self.camera.mount_rotation.iter().map(|c| c * c).sum::<f64>().sqrt();
        if !(rotation_norm.is_finite() && rotation_norm > 1e-9) {
            warn!("camera.mount_rotation is degenerate, using identity");
            self.camera.mount_rotation = camera.mount_rotation;
        }

        let render = RenderConfig::default();
        if !in_rate_range(self.render.rate_hz) {
            warn!(
                "render.rate_hz = {} outside {:?}, using {}",
                self.render.rate_hz, RATE_HZ_RANGE, render.rate_hz
            );
            self.render.rate_hz = render.rate_hz;
        }
        if !(self.render.startup_grace_s >= 0.0 && self.render.startup_grace_s <= MAX_SECONDS) {
            warn!(
                "render.startup_grace_s = {} outside [0, {}], using {}",
                self.render.startup_grace_s, MAX_SECONDS, render.startup_grace_s
            );
            self.render.startup_grace_s = render.startup_grace_s;
        }

        let publish = PublishConfig::default();
        if !in_rate_range(self.publish.rate_hz) {
            warn!(
                "publish.rate_hz = {} outside {:?}, using {}",
                self.publish.rate_hz, RATE_HZ_RANGE, publish.rate_hz
            );
            self.publish.rate_hz = publish.rate_hz;
        }
        if let Some(age) = self.publish.max_pose_age_s.filter(|a| !is_seconds(*a)) {
            warn!(
                "publish.max_pose_age_s = {} outside (0, {}], disabling the check",
                age, MAX_SECONDS
            );
            self.publish.max_pose_age_s = None;
        }
        if self.publish.marker_radius > MAX_MARKER_RADIUS {
            warn!(
                "publish.marker_radius = {} above {}, using {}",
                self.publish.marker_radius, MAX_MARKER_RADIUS, publish.marker_radius
            );
            self.publish.marker_radius = publish.marker_radius;
        }
        if self.publish.marker_thickness == 0 || self.publish.marker_thickness > MAX_MARKER_THICKNESS {
            warn!(
                "publish.marker_thickness = {} outside 1..={}, using {}",
                self.publish.marker_thickness, MAX_MARKER_THICKNESS, publish.marker_thickness
            );
            self.publish.marker_thickness = publish.marker_thickness;
        }

        let run = RunConfig::default();
        if self.session.pose_queue == 0 || self.session.pose_queue > MAX_POSE_QUEUE {
            warn!(
                "session.pose_queue = {} outside 1..={}, using {}",
                self.session.pose_queue, MAX_POSE_QUEUE, run.pose_queue
            );
            self.session.pose_queue = run.pose_queue;
        }
        if let Some(duration) = self.session.duration_s.filter(|d| !is_seconds(*d)) {
            warn!(
                "session.duration_s = {} outside (0, {}], running until shutdown",
                duration, MAX_SECONDS
            );
            self.session.duration_s = None;
        }

        self
    }
}

fn in_rate_range(rate_hz: f64) -> bool {
    RATE_HZ_RANGE.contains(&rate_hz)
}

/// Positive and small enough for `Duration`.
fn is_seconds(value: f64) -> bool {
    value > 0.0 && value <= MAX_SECONDS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config: SessionConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.agents.count, 3);
        assert_eq!(config.agents.namespace, "hummingbird");
        assert_eq!(config.camera.width, 360);
        assert_eq!(config.render.scene, SceneId::Warehouse);
        assert_eq!(config.publish.behind_camera, BehindCameraPolicy::Clip);
        assert_eq!(config.output.sink, SinkKind::Trace);
        assert_eq!(config.session.pose_queue, 64);
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
agents:
  count: 5
  initial_poses:
    - { agent: 1, position: [1.0, 2.0, 3.0] }
camera:
  fov_deg: 60.0
render:
  scene: nature_forest
  enabled: false
publish:
  behind_camera: raw
  hold_last_transform: true
  max_pose_age_s: 0.5
output:
  sink: rerun_save
  rrd_path: /tmp/out.rrd
"#;
        let config: SessionConfig = serde_yaml::from_str(yaml).unwrap();
        let config = config.validated();

        assert_eq!(config.agents.count, 5);
        assert_eq!(config.agents.namespace, "hummingbird");
        assert_eq!(config.agents.initial_poses[0].orientation, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(config.camera.fov_deg, 60.0);
        assert_eq!(config.camera.height, 240);
        assert_eq!(config.render.scene, SceneId::NatureForest);
        assert!(!config.render.enabled);
        assert_eq!(config.render.rate_hz, 30.0);
        assert_eq!(config.publish.behind_camera, BehindCameraPolicy::Raw);
        assert!(config.publish.hold_last_transform);
        assert_eq!(config.publish.max_pose_age(), Some(Duration::from_millis(500)));
        assert_eq!(config.output.sink, SinkKind::RerunSave);
        assert_eq!(config.output.rrd_path, PathBuf::from("/tmp/out.rrd"));
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let yaml = r#"
agents:
  count: 12
  initial_poses:
    - { agent: 7, position: [0.0, 0.0, 0.0] }
camera: { fov_deg: 180.0, width: 0 }
render: { rate_hz: -1.0, startup_grace_s: -2.0 }
publish: { rate_hz: 0.0, max_pose_age_s: 0.0, marker_thickness: 0 }
session: { pose_queue: 0, duration_s: -3.0 }
"#;
        let config: SessionConfig = serde_yaml::from_str(yaml).unwrap();
        let config = config.validated();
        let defaults = SessionConfig::default();

        assert_eq!(config.agents.count, 3);
        assert!(config.agents.initial_poses.is_empty());
        assert_eq!(config.camera, defaults.camera);
        assert_eq!(config.render, defaults.render);
        assert_eq!(config.publish, defaults.publish);
        assert_eq!(config.session, defaults.session);
    }

    #[test]
    fn test_extreme_values_are_rejected_before_conversion() {
        let yaml = r#"
camera: { width: 4000000000 }
render: { rate_hz: 1.0e-300, startup_grace_s: 1.0e20 }
publish: { rate_hz: 1.0e300, max_pose_age_s: 1.0e30, marker_radius: 4000000000, marker_thickness: 1000000 }
session: { duration_s: 1.0e20, pose_queue: 1000000000000 }
"#;
        let config: SessionConfig = serde_yaml::from_str(yaml).unwrap();
        let config = config.validated();
        let defaults = SessionConfig::default();

        assert_eq!(config.camera, defaults.camera);
        assert_eq!(config.render, defaults.render);
        assert_eq!(config.publish, defaults.publish);
        assert_eq!(config.session, defaults.session);

        // Every derived duration is now constructible.
        assert_eq!(config.render.startup_grace(), Duration::from_secs(5));
        assert_eq!(config.publish.max_pose_age(), None);
        assert_eq!(config.session.duration(), None);
        let timer = crate::system::PeriodicTimer::from_rate_hz(config.render.rate_hz, std::time::Instant::now());
        assert!(timer.period() > Duration::ZERO);
    }

    #[test]
    fn test_unvalidated_durations_do_not_panic() {
        let run = RunConfig {
            duration_s: Some(1.0e20),
            ..RunConfig::default()
        };
        assert_eq!(run.duration(), None);

        let render = RenderConfig {
            startup_grace_s: f64::NAN,
            ..RenderConfig::default()
        };
        assert_eq!(render.startup_grace(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = SessionConfig::load_or_default(Some(Path::new("/nonexistent/swarm.yaml")));
        assert_eq!(config, SessionConfig::default());
        assert!(SessionConfig::load("/nonexistent/swarm.yaml").is_err());
    }

    #[test]
    fn test_marker_style_from_publish_config() {
        let style = PublishConfig {
            marker_radius: 6,
            marker_thickness: 3,
            ..PublishConfig::default()
        }
        .marker_style();
        assert_eq!(style.radius, 6);
        assert_eq!(style.thickness, 3);
        assert_eq!(style.color, [0, 255, 0]);
    }
}

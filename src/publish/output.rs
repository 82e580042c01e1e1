//! Output boundary: what one agent emits on one publish tick.

use anyhow::Result;
use image::RgbImage;
use tracing::{debug, info};

use crate::camera::CameraInfo;
use crate::state::AgentId;

use super::track::TrackFrame;

/// Channel names of one agent, derived from the namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    pub rgb: String,
    pub camera_info: String,
    pub annotated: String,
    pub track: String,
}

impl ChannelNames {
    pub fn for_agent(namespace: &str, agent: AgentId) -> Self {
        let prefix = format!("/{}{}", namespace, agent.index());
        Self {
            rgb: format!("{prefix}/camera/rgb"),
            camera_info: format!("{prefix}/camera/camera_info"),
            annotated: format!("{prefix}/camera/bounding_box"),
            track: format!("{prefix}/track/bounding_box"),
        }
    }
}

/// Everything one agent publishes on one tick. All four outputs share
/// `stamp_ns`.
pub struct AgentOutput<'a> {
    pub agent: AgentId,
    pub channels: &'a ChannelNames,
    pub stamp_ns: u64,
    pub raw: &'a RgbImage,
    pub camera_info: &'a CameraInfo,
    pub annotated: &'a RgbImage,
    pub track: &'a TrackFrame,
}

/// Destination for published outputs.
pub trait OutputSink {
    fn publish(&mut self, output: &AgentOutput<'_>) -> Result<()>;

    /// Called once when the session stops.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sink that only logs track lists. Used when no viewer is wanted.
#[derive(Debug, Default)]
pub struct TraceSink {
    published: u64,
}

impl TraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of agent outputs received so far.
    pub fn published(&self) -> u64 {
        self.published
    }
}

impl OutputSink for TraceSink {
    fn publish(&mut self, output: &AgentOutput<'_>) -> Result<()> {
        self.published += 1;
        debug!(
            "{} tick {} @{}: {:?}",
            output.channels.track,
            output.track.tick,
            output.stamp_ns,
            output.track.pixels()
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        info!("Trace sink received {} agent outputs", self.published);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraConfig, CameraModel};

    #[test]
    fn test_channel_names() {
        let names = ChannelNames::for_agent("hummingbird", AgentId(2));
        assert_eq!(names.rgb, "/hummingbird2/camera/rgb");
        assert_eq!(names.camera_info, "/hummingbird2/camera/camera_info");
        assert_eq!(names.annotated, "/hummingbird2/camera/bounding_box");
        assert_eq!(names.track, "/hummingbird2/track/bounding_box");
    }

    #[test]
    fn test_trace_sink_counts() {
        let channels = ChannelNames::for_agent("hb", AgentId(0));
        let image = RgbImage::new(4, 4);
        let info = CameraModel::from_config(&CameraConfig::default()).camera_info("camera");
        let track = TrackFrame::new(AgentId(0), 1, 42, 0);
        let output = AgentOutput {
            agent: AgentId(0),
            channels: &channels,
            stamp_ns: 42,
            raw: &image,
            camera_info: &info,
            annotated: &image,
            track: &track,
        };

        let mut sink = TraceSink::new();
        sink.publish(&output).unwrap();
        sink.publish(&output).unwrap();
        assert_eq!(sink.published(), 2);
        sink.flush().unwrap();
    }
}

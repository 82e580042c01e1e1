//! Rerun-based output sink.
//!
//! Entity hierarchy, one subtree per agent named after its channel prefix:
//!     {ns}{i}/camera/rgb              - Raw frame with its pinhole projection
//!     {ns}{i}/camera/bounding_box     - Annotated frame
//!     {ns}{i}/camera/rgb/track        - Every track entry (2D), colored by status

use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;
use rerun::RecordingStream;

use crate::camera::{CameraInfo, PointStatus};
use crate::publish::{AgentOutput, OutputSink, TrackFrame};

pub struct RerunSink {
    rec: RecordingStream,
    start_stamp_ns: Option<u64>,
}

impl RerunSink {
    /// Spawn a viewer process and stream to it.
    pub fn spawn(app_name: &str) -> Result<Self> {
        let rec = rerun::RecordingStreamBuilder::new(app_name)
            .spawn()
            .context("Failed to spawn rerun viewer")?;
        Ok(Self::with_stream(rec))
    }

    /// Record to an `.rrd` file.
    pub fn save(app_name: &str, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let rec = rerun::RecordingStreamBuilder::new(app_name)
            .save(path)
            .with_context(|| format!("Failed to create recording {}", path.display()))?;
        Ok(Self::with_stream(rec))
    }

    pub fn with_stream(rec: RecordingStream) -> Self {
        Self {
            rec,
            start_stamp_ns: None,
        }
    }

    /// Time line relative to the first published tick.
    fn set_time(&mut self, stamp_ns: u64) {
        let start_ns = *self.start_stamp_ns.get_or_insert(stamp_ns);
        let relative_sec = stamp_ns.saturating_sub(start_ns) as f64 / 1e9;
        self.rec.set_duration_secs("time", relative_sec);
    }

    fn log_image(&self, entity: &str, image: &RgbImage) -> Result<()> {
        let (width, height) = image.dimensions();
        self.rec
            .log(
                entity,
                &rerun::Image::from_rgb24(image.as_raw().clone(), [width, height]),
            )
            .with_context(|| format!("Failed to log image {}", entity))
    }

    fn log_pinhole(&self, entity: &str, info: &CameraInfo) -> Result<()> {
        // k = [fx, 0, cx, 0, fy, cy, 0, 0, 1]
        let focal = [info.k[0] as f32, info.k[4] as f32];
        let principal = [info.k[2] as f32, info.k[5] as f32];
        self.rec
            .log(
                entity,
                &rerun::Pinhole::from_focal_length_and_resolution(
                    focal,
                    [info.width as f32, info.height as f32],
                )
                .with_principal_point(principal),
            )
            .with_context(|| format!("Failed to log camera info {}", entity))
    }
}

impl OutputSink for RerunSink {
    fn publish(&mut self, output: &AgentOutput<'_>) -> Result<()> {
        self.set_time(output.stamp_ns);
        self.rec.set_time_sequence("tick", output.track.tick as i64);

        let rgb = entity_path(&output.channels.rgb);
        self.log_pinhole(&rgb, output.camera_info)?;
        self.log_image(&rgb, output.raw)?;
        self.log_image(&entity_path(&output.channels.annotated), output.annotated)?;

        let track = TrackPoints::from_track(output.track);
        self.rec
            .log(
                format!("{}/track", rgb),
                &rerun::Points2D::new(track.positions)
                    .with_colors(track.colors)
                    .with_labels(track.labels)
                    .with_radii([3.0f32]),
            )
            .context("Failed to log track points")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.rec.flush_blocking();
        Ok(())
    }
}

/// Track entries in the shape `Points2D` wants. Entries whose pixel is not
/// finite (raw projections behind the camera) cannot be placed and are left
/// out.
struct TrackPoints {
    positions: Vec<[f32; 2]>,
    colors: Vec<[u8; 3]>,
    labels: Vec<String>,
}

impl TrackPoints {
    fn from_track(track: &TrackFrame) -> Self {
        let mut out = Self {
            positions: Vec::with_capacity(track.len()),
            colors: Vec::with_capacity(track.len()),
            labels: Vec::with_capacity(track.len()),
        };
        for entry in track.points() {
            let p = entry.point;
            if !(p.u.is_finite() && p.v.is_finite()) {
                continue;
            }
            out.positions.push([p.u as f32, p.v as f32]);
            out.colors.push(status_color(p.status));
            out.labels.push(entry.target.to_string());
        }
        out
    }
}

fn status_color(status: PointStatus) -> [u8; 3] {
    match status {
        PointStatus::Visible => [0, 255, 0],
        PointStatus::OutsideImage => [255, 200, 0],
        PointStatus::BehindCamera => [255, 0, 0],
        PointStatus::Unresolved => [128, 128, 128],
    }
}

/// Channel names carry a leading slash; entity paths do not.
fn entity_path(channel: &str) -> String {
    channel.trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::ProjectedPoint;
    use crate::state::AgentId;

    #[test]
    fn test_entity_path_strips_leading_slash() {
        assert_eq!(entity_path("/hummingbird0/camera/rgb"), "hummingbird0/camera/rgb");
        assert_eq!(entity_path("plain"), "plain");
    }

    #[test]
    fn test_track_points_keep_every_placeable_entry() {
        let mut track = TrackFrame::new(AgentId(0), 1, 0, 4);
        let at = |u, v, status| ProjectedPoint { u, v, status };
        track.push(AgentId(1), at(10.0, 20.0, PointStatus::Visible));
        track.push(AgentId(2), at(-40.0, 20.0, PointStatus::OutsideImage));
        track.push(AgentId(3), at(180.0, 120.0, PointStatus::BehindCamera));
        track.push(AgentId(4), at(180.0, 120.0, PointStatus::Unresolved));
        track.push(AgentId(5), at(f64::NAN, f64::INFINITY, PointStatus::BehindCamera));

        let points = TrackPoints::from_track(&track);

        assert_eq!(points.positions.len(), 4);
        assert_eq!(points.positions[1], [-40.0, 20.0]);
        assert_eq!(points.labels, vec!["agent1", "agent2", "agent3", "agent4"]);
        let mut colors = points.colors.clone();
        colors.sort();
        colors.dedup();
        assert_eq!(colors.len(), 4);
    }
}

//! Marker overlay on camera frames.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_circle_mut;
use serde::{Deserialize, Serialize};

use super::track::TrackFrame;

/// Largest ring radius drawn, in pixels.
pub const MAX_MARKER_RADIUS: u32 = 1_000;
/// Largest ring thickness drawn, in pixels.
pub const MAX_MARKER_THICKNESS: u32 = 100;

/// Appearance of the markers drawn at projected points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerStyle {
    pub radius: u32,
    /// Ring thickness in pixels, growing outwards from `radius`.
    pub thickness: u32,
    pub color: [u8; 3],
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            radius: 4,
            thickness: 2,
            color: [0, 255, 0],
        }
    }
}

/// Copy `frame` and draw a ring at every drawable point of `track`.
///
/// Points off the image plane are clipped by the canvas; points behind the
/// camera or without a transform are not drawn.
pub fn annotate(frame: &RgbImage, track: &TrackFrame, style: &MarkerStyle) -> RgbImage {
    let mut annotated = frame.clone();
    let color = Rgb(style.color);
    let radius = style.radius.min(MAX_MARKER_RADIUS);
    let thickness = style.thickness.clamp(1, MAX_MARKER_THICKNESS);

    for entry in track.points() {
        let point = entry.point;
        if !point.is_drawable() {
            continue;
        }
        // Far off-screen points would only waste time in the rasterizer.
        let (Some(cx), Some(cy)) = (to_pixel(point.u), to_pixel(point.v)) else {
            continue;
        };
        for ring in radius..radius + thickness {
            draw_hollow_circle_mut(&mut annotated, (cx, cy), ring as i32, color);
        }
    }

    annotated
}

/// Round a pixel coordinate to the integer grid, rejecting values that do not
/// fit comfortably in `i32`.
fn to_pixel(c: f64) -> Option<i32> {
    const LIMIT: f64 = 1.0e6;
    if c.is_finite() && c.abs() < LIMIT {
        Some(c.round() as i32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{PointStatus, ProjectedPoint};
    use crate::state::AgentId;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

    fn track_with(points: &[ProjectedPoint]) -> TrackFrame {
        let mut track = TrackFrame::new(AgentId(0), 0, 0, points.len());
        for (idx, p) in points.iter().enumerate() {
            track.push(AgentId(idx + 1), *p);
        }
        track
    }

    #[test]
    fn test_annotate_draws_ring_and_keeps_original() {
        let frame = RgbImage::from_pixel(360, 240, BLACK);
        let track = track_with(&[ProjectedPoint {
            u: 120.0,
            v: 120.0,
            status: PointStatus::Visible,
        }]);

        let annotated = annotate(&frame, &track, &MarkerStyle::default());

        // Ring passes through (u + r, v); centre stays untouched.
        assert_eq!(*annotated.get_pixel(124, 120), GREEN);
        assert_eq!(*annotated.get_pixel(125, 120), GREEN);
        assert_eq!(*annotated.get_pixel(120, 120), BLACK);
        // Input frame is not modified.
        assert_eq!(*frame.get_pixel(124, 120), BLACK);
    }

    #[test]
    fn test_annotate_skips_undrawable_points() {
        let frame = RgbImage::from_pixel(360, 240, BLACK);
        let track = track_with(&[
            ProjectedPoint {
                u: 180.0,
                v: 120.0,
                status: PointStatus::Unresolved,
            },
            ProjectedPoint {
                u: 180.0,
                v: 120.0,
                status: PointStatus::BehindCamera,
            },
            ProjectedPoint {
                u: f64::INFINITY,
                v: 3.0,
                status: PointStatus::OutsideImage,
            },
        ]);

        let annotated = annotate(&frame, &track, &MarkerStyle::default());
        assert_eq!(annotated, frame);
    }

    #[test]
    fn test_annotate_clamps_oversized_style() {
        let frame = RgbImage::from_pixel(64, 48, BLACK);
        let track = track_with(&[ProjectedPoint {
            u: 32.0,
            v: 24.0,
            status: PointStatus::Visible,
        }]);
        let style = MarkerStyle {
            radius: u32::MAX,
            thickness: u32::MAX,
            ..MarkerStyle::default()
        };

        // Rings are far outside this canvas once clamped; nothing to draw.
        let annotated = annotate(&frame, &track, &style);
        assert_eq!(annotated, frame);
    }

    #[test]
    fn test_annotate_clips_partially_visible_marker() {
        let frame = RgbImage::from_pixel(360, 240, BLACK);
        let track = track_with(&[ProjectedPoint {
            u: -2.0,
            v: 100.0,
            status: PointStatus::OutsideImage,
        }]);

        let annotated = annotate(&frame, &track, &MarkerStyle::default());
        assert_eq!(*annotated.get_pixel(2, 100), GREEN);
    }
}

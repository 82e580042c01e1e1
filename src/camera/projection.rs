//! Projection engine: relative position → pixel coordinates.
//!
//! The camera frame used here has its optical axis along **+X** (see
//! [`crate::geometry::frames`]). For a target at `(rx, ry, rz)` in the
//! observer's camera frame:
//!
//! ```text
//! u = -fy * (ry / rx) + cx
//! v = -fx * (rz / rx) + cy
//! ```
//!
//! +Y (left) maps to decreasing `u`, +Z (up) maps to decreasing `v`.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::CameraModel;

/// What to report for targets at or behind the camera plane (`rx <= 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehindCameraPolicy {
    /// Report the image centre; the division is never evaluated.
    #[default]
    Clip,
    /// Evaluate the raw formula (the result may be non-finite).
    Raw,
}

/// Classification of a projected point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointStatus {
    /// In front of the camera and on the image plane.
    Visible,
    /// In front of the camera but projecting off the image plane.
    OutsideImage,
    /// At or behind the camera plane.
    BehindCamera,
    /// No relative transform was available; the point is the image centre.
    Unresolved,
}

/// Pixel position of one target in one observer's image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub u: f64,
    pub v: f64,
    pub status: PointStatus,
}

impl ProjectedPoint {
    /// Fallback point for a pair whose transform is unavailable.
    pub fn unresolved(camera: &CameraModel) -> Self {
        let (u, v) = camera.center();
        Self {
            u,
            v,
            status: PointStatus::Unresolved,
        }
    }

    /// Whether the annotation pipeline should draw a marker for this point.
    pub fn is_drawable(&self) -> bool {
        matches!(self.status, PointStatus::Visible | PointStatus::OutsideImage)
            && self.u.is_finite()
            && self.v.is_finite()
    }
}

/// Raw pinhole formula, without any validity handling.
pub fn project_raw(camera: &CameraModel, rel: &Vector3<f64>) -> (f64, f64) {
    let u = -camera.fy * (rel.y / rel.x) + camera.cx;
    let v = -camera.fx * (rel.z / rel.x) + camera.cy;
    (u, v)
}

/// Projects relative positions for one camera model under one edge-case policy.
#[derive(Debug, Clone, Copy)]
pub struct Projector {
    camera: CameraModel,
    policy: BehindCameraPolicy,
}

impl Projector {
    pub fn new(camera: CameraModel, policy: BehindCameraPolicy) -> Self {
        Self { camera, policy }
    }

    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    pub fn policy(&self) -> BehindCameraPolicy {
        self.policy
    }

    /// Project a target position expressed in the observer's camera frame.
    pub fn project(&self, rel: &Vector3<f64>) -> ProjectedPoint {
        if rel.x <= 0.0 || rel.x.is_nan() {
            let (u, v) = match self.policy {
                BehindCameraPolicy::Clip => self.camera.center(),
                BehindCameraPolicy::Raw => project_raw(&self.camera, rel),
            };
            return ProjectedPoint {
                u,
                v,
                status: PointStatus::BehindCamera,
            };
        }

        let (u, v) = project_raw(&self.camera, rel);
        let status = if self.camera.contains(u, v) {
            PointStatus::Visible
        } else {
            PointStatus::OutsideImage
        };
        ProjectedPoint { u, v, status }
    }

    /// Project when a transform is available, fall back to the image centre
    /// otherwise.
    pub fn project_or_fallback(&self, rel: Option<&Vector3<f64>>) -> ProjectedPoint {
        match rel {
            Some(rel) => self.project(rel),
            None => ProjectedPoint::unresolved(&self.camera),
        }
    }
}

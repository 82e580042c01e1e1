//! Camera model: shared configuration, pinhole intrinsics, camera-info metadata
//! and the projection engine.

pub mod projection;

pub use projection::{BehindCameraPolicy, PointStatus, ProjectedPoint, Projector};

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::geometry::CameraMount;

/// Distortion model advertised in camera-info metadata. The simulated
/// cameras have no distortion, so the coefficient list is always empty.
pub const DISTORTION_MODEL: &str = "plumb_bob";

/// Renderer post-processing layers requested for each camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessing {
    pub depth: bool,
    pub segmentation: bool,
    pub optical_flow: bool,
}

impl Default for PostProcessing {
    fn default() -> Self {
        Self {
            depth: true,
            segmentation: false,
            optical_flow: false,
        }
    }
}

/// Onboard camera parameters, identical for every agent of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov_deg: f64,
    pub width: u32,
    pub height: u32,
    /// Camera origin in the body frame (meters).
    pub mount_offset: [f64; 3],
    /// Camera rotation relative to the body frame, `[w, x, y, z]`.
    pub mount_rotation: [f64; 4],
    /// Frame id reported in camera-info metadata.
    pub frame_id: String,
    pub post_processing: PostProcessing,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 90.0,
            width: 360,
            height: 240,
            mount_offset: [0.0, 0.5, 0.0],
            mount_rotation: [1.0, 0.0, 0.0, 0.0],
            frame_id: "camera".to_string(),
            post_processing: PostProcessing::default(),
        }
    }
}

impl CameraConfig {
    pub fn mount(&self) -> CameraMount {
        CameraMount::from_offset_rotation(self.mount_offset, self.mount_rotation)
    }
}

/// Pinhole intrinsics derived once from a [`CameraConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraModel {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,
}

impl CameraModel {
    /// Derive intrinsics from field of view and resolution.
    ///
    /// ```text
    /// f  = (height/2) / tan(fov/2)
    /// fx = fy = f
    /// cx = width/2,  cy = height/2
    /// ```
    /// Half sizes use integer division, so odd resolutions put the principal
    /// point on the pixel grid.
    pub fn from_config(config: &CameraConfig) -> Self {
        let half_w = (config.width / 2) as f64;
        let half_h = (config.height / 2) as f64;
        let f = half_h / (config.fov_deg.to_radians() / 2.0).tan();
        Self {
            fx: f,
            fy: f,
            cx: half_w,
            cy: half_h,
            width: config.width,
            height: config.height,
        }
    }

    /// K-matrix `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn k_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Image centre, used as the fallback pixel.
    pub fn center(&self) -> (f64, f64) {
        (self.cx, self.cy)
    }

    /// Whether a pixel lies on the image plane `[0, width) x [0, height)`.
    pub fn contains(&self, u: f64, v: f64) -> bool {
        u >= 0.0 && v >= 0.0 && u < self.width as f64 && v < self.height as f64
    }

    #[rustfmt::skip]
    pub fn camera_info(&self, frame_id: &str) -> CameraInfo {
        let k = self.k_matrix();
        CameraInfo {
            frame_id: frame_id.to_string(),
            distortion_model: DISTORTION_MODEL.to_string(),
            width: self.width,
            height: self.height,
            k: [
                k[(0, 0)], k[(0, 1)], k[(0, 2)],
                k[(1, 0)], k[(1, 1)], k[(1, 2)],
                k[(2, 0)], k[(2, 1)], k[(2, 2)],
            ],
        }
    }
}

/// Camera intrinsic metadata published next to every frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraInfo {
    pub frame_id: String,
    pub distortion_model: String,
    pub width: u32,
    pub height: u32,
    /// Row-major K-matrix.
    pub k: [f64; 9],
}

//! Coordinate frame definitions and transformations for the multi-agent camera rig.
//!
//! This module centralizes every axis convention used between pose ingestion
//! and projection.
//!
//! # Frame Conventions
//!
//! ## Telemetry Frame (pose feed)
//! Positions and orientations arrive in the convention of the vehicle
//! simulator that produces them.
//!
//! ## Render Frame (world)
//! The renderer's world frame is the telemetry frame relabeled by a fixed
//! +90° rotation about Z:
//! ```text
//! render X = -telemetry Y
//! render Y =  telemetry X
//! render Z =  telemetry Z
//! ```
//! The quaternion's vector part is relabeled with the same matrix and the
//! scalar part is unchanged. The mapping is applied exactly once, at ingestion
//! into the vehicle state store. No inverse is provided; nothing downstream
//! needs to go back to telemetry coordinates.
//!
//! ## Body Frame
//! Attached to each vehicle: X forward, Y left, Z up.
//!
//! ## Camera Frame
//! Rigidly mounted on the body through a [`CameraMount`] (offset + rotation).
//! With the default identity mount rotation the camera axes coincide with the
//! body axes, so the optical axis is **+X**, not the +Z of the usual pinhole
//! convention. The projection engine works in this frame.
//!
//! # Transformation Naming Convention
//!
//! `T_target_source` maps points from `source` into `target`:
//! ```text
//! p_world = T_world_body * p_body
//! p_body  = T_body_cam   * p_cam
//! ```

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

use super::SE3;

// ============================================================================
// Telemetry -> Render
// ============================================================================

/// Fixed rotation matrix from the telemetry frame to the render frame.
///
/// Maps:
/// - Telemetry +X → Render +Y
/// - Telemetry +Y → Render -X
/// - Telemetry +Z → Render +Z
#[rustfmt::skip]
pub fn rotation_render_telemetry() -> Matrix3<f64> {
    Matrix3::new(
        0.0, -1.0, 0.0,  // Render X = -Telemetry Y
        1.0,  0.0, 0.0,  // Render Y =  Telemetry X
        0.0,  0.0, 1.0,  // Render Z =  Telemetry Z
    )
}

/// Relabel a telemetry-frame position into the render frame.
pub fn telemetry_position_to_render(p: &Vector3<f64>) -> Vector3<f64> {
    rotation_render_telemetry() * p
}

/// Relabel a telemetry-frame orientation into the render frame.
///
/// Component-wise: `(w, x, y, z) → (w, -y, x, z)`. The quaternion is not
/// normalized or validated.
pub fn telemetry_orientation_to_render(q: &Quaternion<f64>) -> Quaternion<f64> {
    let v = telemetry_position_to_render(&q.imag());
    Quaternion::new(q.w, v.x, v.y, v.z)
}

// ============================================================================
// Camera Mount
// ============================================================================

/// Camera-to-body transform shared by every agent of a session.
#[derive(Debug, Clone, Copy)]
pub struct CameraMount {
    /// Transform from camera to body frame (mount offset and rotation).
    pub t_body_cam: SE3,

    /// Inverse: transform from body to camera frame.
    pub t_cam_body: SE3,
}

impl CameraMount {
    pub fn new(t_body_cam: SE3) -> Self {
        let t_cam_body = t_body_cam.inverse();
        Self {
            t_body_cam,
            t_cam_body,
        }
    }

    /// Mount from a body-frame offset and a `[w, x, y, z]` rotation.
    ///
    /// The rotation is normalized here because it is a deployment constant,
    /// unlike the telemetry orientations.
    pub fn from_offset_rotation(offset: [f64; 3], rotation_wxyz: [f64; 4]) -> Self {
        let [w, x, y, z] = rotation_wxyz;
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z));
        Self::new(SE3::from_quaternion(rotation, Vector3::from(offset)))
    }

    /// Camera co-located with the body origin and axes.
    pub fn aligned() -> Self {
        Self::new(SE3::identity())
    }

    /// Camera pose in the world given the body pose.
    ///
    /// Formula: T_wc = T_wb * T_bc
    pub fn camera_pose(&self, t_world_body: &SE3) -> SE3 {
        t_world_body.compose(&self.t_body_cam)
    }
}

impl Default for CameraMount {
    fn default() -> Self {
        Self::aligned()
    }
}

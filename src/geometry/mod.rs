//! Geometry utilities: SE3 transforms, axis conventions, camera mount.

pub mod frames;
pub mod se3;

pub use frames::{CameraMount, telemetry_orientation_to_render, telemetry_position_to_render};
pub use se3::SE3;

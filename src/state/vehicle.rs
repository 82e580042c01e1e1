//! Per-agent vehicle pose record.

use std::time::{Duration, Instant};

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use crate::geometry::SE3;

/// Orientations with a smaller norm cannot be turned into a rotation.
const MIN_QUATERNION_NORM: f64 = 1e-9;

/// Latest committed pose of one vehicle, in render-frame convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub position: Vector3<f64>,

    /// Raw orientation as ingested. Never normalized by the store, so
    /// malformed telemetry passes through unchanged.
    pub orientation: Quaternion<f64>,

    /// Time of the last update. `None` until the first pose arrives.
    pub updated_at: Option<Instant>,
}

impl VehicleState {
    /// Zeroed state (origin, identity orientation) that has never been updated.
    pub fn zero() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: Quaternion::identity(),
            updated_at: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.updated_at.is_some()
    }

    /// Age of the record relative to `now`, if it has ever been updated.
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.updated_at.map(|t| now.saturating_duration_since(t))
    }

    /// Body pose in the world (T_world_body).
    ///
    /// Returns `None` when the stored orientation is degenerate (zero or
    /// non-finite), since no rotation can be derived from it.
    pub fn body_pose(&self) -> Option<SE3> {
        let norm = self.orientation.norm();
        if !norm.is_finite() || norm < MIN_QUATERNION_NORM || !self.position.iter().all(|c| c.is_finite()) {
            return None;
        }
        Some(SE3::from_quaternion(
            UnitQuaternion::new_normalize(self.orientation),
            self.position,
        ))
    }
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::zero()
    }
}

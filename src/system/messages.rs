//! Inter-thread message types.
//!
//! Pose producers (the CSV replay thread, or any other feed) hand poses to the
//! dispatcher through a bounded channel of these messages.

use nalgebra::{Quaternion, Vector3};

use crate::state::AgentId;

/// One pose update for one agent, in the telemetry convention.
///
/// The dispatcher remaps it to the render convention on ingestion; producers
/// never do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseMsg {
    pub agent: AgentId,

    /// Position in the telemetry frame (meters).
    pub position: Vector3<f64>,

    /// Orientation in the telemetry frame, `(w, x, y, z)`, not validated.
    pub orientation: Quaternion<f64>,
}

impl PoseMsg {
    pub fn new(agent: AgentId, position: Vector3<f64>, orientation: Quaternion<f64>) -> Self {
        Self {
            agent,
            position,
            orientation,
        }
    }
}

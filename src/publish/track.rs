//! Track frames: per-observer list of where the other agents appear.

use crate::camera::ProjectedPoint;
use crate::state::AgentId;

/// Projected position of one target agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub target: AgentId,
    pub point: ProjectedPoint,
}

/// Ordered projections of every other agent into one observer's image for a
/// single publish tick.
///
/// A new `TrackFrame` is built for every tick; entries never carry over from
/// the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFrame {
    pub observer: AgentId,
    /// Publish tick this frame was built on.
    pub tick: u64,
    /// Emission time, nanoseconds since the UNIX epoch.
    pub stamp_ns: u64,
    points: Vec<TrackPoint>,
}

impl TrackFrame {
    /// Empty frame with room for `capacity` targets.
    pub fn new(observer: AgentId, tick: u64, stamp_ns: u64, capacity: usize) -> Self {
        Self {
            observer,
            tick,
            stamp_ns,
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, target: AgentId, point: ProjectedPoint) {
        self.points.push(TrackPoint { target, point });
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(u, v)` pairs in target order.
    pub fn pixels(&self) -> Vec<(f64, f64)> {
        self.points.iter().map(|p| (p.point.u, p.point.v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PointStatus;

    fn point(u: f64, v: f64, status: PointStatus) -> ProjectedPoint {
        ProjectedPoint { u, v, status }
    }

    #[test]
    fn test_track_frame_keeps_insertion_order() {
        let mut track = TrackFrame::new(AgentId(1), 7, 0, 2);
        track.push(AgentId(0), point(10.0, 20.0, PointStatus::Visible));
        track.push(AgentId(2), point(180.0, 120.0, PointStatus::Unresolved));

        assert_eq!(track.len(), 2);
        assert_eq!(track.points()[0].target, AgentId(0));
        assert_eq!(track.points()[1].target, AgentId(2));
        assert_eq!(track.pixels(), vec![(10.0, 20.0), (180.0, 120.0)]);
        assert_eq!(track.points()[1].point.status, PointStatus::Unresolved);
    }
}

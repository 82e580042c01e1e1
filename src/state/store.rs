//! Vehicle State Store - one mutable pose record per agent.
//!
//! Written by the pose-ingestion path, read by the render and publish drivers.
//! The store has no interior synchronization: it is owned by the session,
//! which is driven by a single dispatcher thread.

use std::time::Instant;

use anyhow::{Result, bail};
use nalgebra::{Quaternion, Vector3};

use crate::geometry::{telemetry_orientation_to_render, telemetry_position_to_render};

use super::types::AgentId;
use super::vehicle::VehicleState;

/// Fixed-size collection of per-agent vehicle states, indexed by [`AgentId`].
#[derive(Debug, Clone)]
pub struct VehicleStateStore {
    records: Vec<VehicleState>,
}

impl VehicleStateStore {
    /// Create a store with `count` zeroed records.
    pub fn new(count: usize) -> Self {
        Self {
            records: vec![VehicleState::zero(); count],
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Overwrite the record of `agent` with a telemetry-frame pose.
    ///
    /// The telemetry → render remap is applied here and nowhere else.
    pub fn update(
        &mut self,
        agent: AgentId,
        position: Vector3<f64>,
        orientation: Quaternion<f64>,
    ) -> Result<()> {
        self.update_at(agent, position, orientation, Instant::now())
    }

    /// Same as [`update`](Self::update) with an explicit commit time.
    pub fn update_at(
        &mut self,
        agent: AgentId,
        position: Vector3<f64>,
        orientation: Quaternion<f64>,
        at: Instant,
    ) -> Result<()> {
        let record = self.record_mut(agent)?;
        *record = VehicleState {
            position: telemetry_position_to_render(&position),
            orientation: telemetry_orientation_to_render(&orientation),
            updated_at: Some(at),
        };
        Ok(())
    }

    /// Install an initial render-frame state (no remap) at session start.
    pub fn seed(&mut self, agent: AgentId, state: VehicleState) -> Result<()> {
        *self.record_mut(agent)? = state;
        Ok(())
    }

    /// Latest committed state of `agent`.
    pub fn read(&self, agent: AgentId) -> Result<VehicleState> {
        match self.records.get(agent.index()) {
            Some(state) => Ok(*state),
            None => bail!("{} is not part of this session ({} agents)", agent, self.len()),
        }
    }

    pub fn get(&self, agent: AgentId) -> Option<&VehicleState> {
        self.records.get(agent.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &VehicleState)> {
        self.records
            .iter()
            .enumerate()
            .map(|(idx, state)| (AgentId(idx), state))
    }

    fn record_mut(&mut self, agent: AgentId) -> Result<&mut VehicleState> {
        let count = self.records.len();
        match self.records.get_mut(agent.index()) {
            Some(record) => Ok(record),
            None => bail!("{} is not part of this session ({} agents)", agent, count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_update_remaps_position() {
        let mut store = VehicleStateStore::new(3);
        store
            .update(AgentId(1), Vector3::new(1.0, 2.0, 3.0), Quaternion::identity())
            .unwrap();

        let state = store.read(AgentId(1)).unwrap();
        assert_relative_eq!(state.position, Vector3::new(-2.0, 1.0, 3.0));
        assert!(state.has_data());
    }

    #[test]
    fn test_update_remaps_orientation() {
        let mut store = VehicleStateStore::new(1);
        store
            .update(AgentId(0), Vector3::zeros(), Quaternion::new(0.9, 0.1, 0.2, 0.3))
            .unwrap();

        let q = store.read(AgentId(0)).unwrap().orientation;
        assert_eq!(q, Quaternion::new(0.9, -0.2, 0.1, 0.3));
    }

    #[test]
    fn test_update_does_not_alias_records() {
        let mut store = VehicleStateStore::new(3);
        store
            .update(AgentId(0), Vector3::new(1.0, 0.0, 0.0), Quaternion::identity())
            .unwrap();
        store
            .update(AgentId(2), Vector3::new(0.0, 5.0, 0.0), Quaternion::identity())
            .unwrap();

        assert_relative_eq!(store.read(AgentId(0)).unwrap().position, Vector3::new(0.0, 1.0, 0.0));
        assert!(!store.read(AgentId(1)).unwrap().has_data());
        assert_relative_eq!(store.read(AgentId(2)).unwrap().position, Vector3::new(-5.0, 0.0, 0.0));
    }

    #[test]
    fn test_update_overwrites_previous_value() {
        let mut store = VehicleStateStore::new(1);
        store
            .update(AgentId(0), Vector3::new(1.0, 0.0, 0.0), Quaternion::identity())
            .unwrap();
        store
            .update(AgentId(0), Vector3::new(2.0, 0.0, 0.0), Quaternion::identity())
            .unwrap();

        assert_relative_eq!(store.read(AgentId(0)).unwrap().position, Vector3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_unknown_agent_is_an_error() {
        let mut store = VehicleStateStore::new(2);
        assert!(store.read(AgentId(2)).is_err());
        assert!(
            store
                .update(AgentId(5), Vector3::zeros(), Quaternion::identity())
                .is_err()
        );
    }

    #[test]
    fn test_seed_skips_remap() {
        let mut store = VehicleStateStore::new(1);
        let state = VehicleState {
            position: Vector3::new(1.0, 2.0, 3.0),
            orientation: Quaternion::identity(),
            updated_at: Some(Instant::now()),
        };
        store.seed(AgentId(0), state).unwrap();
        assert_eq!(store.read(AgentId(0)).unwrap(), state);
    }
}

//! Vehicle state: agent identifiers, pose records and the per-session store.

pub mod store;
pub mod types;
pub mod vehicle;

pub use store::VehicleStateStore;
pub use types::{AgentId, MAX_AGENTS, ordered_pairs};
pub use vehicle::VehicleState;

//! Agent identifiers.

/// Upper bound on the number of agents in one session.
pub const MAX_AGENTS: usize = 9;

/// Identifier of one simulated vehicle within a session.
///
/// AgentIds are dense indices `0..N-1` assigned at session start; they index
/// directly into the per-agent collections of the session and the state
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub usize);

impl AgentId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agent{}", self.0)
    }
}

/// All ordered `(observer, target)` pairs with `observer != target`,
/// grouped by observer and ordered by target id.
pub fn ordered_pairs(count: usize) -> impl Iterator<Item = (AgentId, AgentId)> {
    (0..count).flat_map(move |obs| {
        (0..count)
            .filter(move |&tgt| tgt != obs)
            .map(move |tgt| (AgentId(obs), AgentId(tgt)))
    })
}

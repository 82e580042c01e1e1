//! Connection state of the render bridge.

/// Lifecycle of the render bridge within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Rendering turned off by configuration; the bridge is never used.
    Disabled,
    /// Agents registered, waiting for the startup grace period to elapse.
    Connecting,
    /// Connected; render ticks synthesize and retrieve frames.
    Ready,
    /// The single connection attempt failed; render ticks only push states.
    Unavailable,
}

impl BridgeState {
    pub fn is_ready(self) -> bool {
        self == BridgeState::Ready
    }
}

impl Default for BridgeState {
    fn default() -> Self {
        Self::Disabled
    }
}

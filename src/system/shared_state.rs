//! State shared between the dispatcher thread and the rest of the process.
//!
//! This is the only cross-thread surface: a shutdown flag and the dispatch
//! counters. The vehicle state store stays inside the dispatcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

/// Counters updated by the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub poses_ingested: u64,
    pub poses_rejected: u64,
    pub render_ticks: u64,
    pub render_skipped: u64,
    pub publish_ticks: u64,
    pub publish_skipped: u64,
}

pub struct SharedState {
    /// Protected by RwLock: the dispatcher writes, observers read.
    pub stats: RwLock<DispatchStats>,

    /// Request the dispatcher to stop after the current iteration.
    pub shutdown_requested: AtomicBool,
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Copy of the current counters.
    pub fn stats(&self) -> DispatchStats {
        *self.stats.read()
    }

    pub fn update_stats(&self, f: impl FnOnce(&mut DispatchStats)) {
        f(&mut self.stats.write());
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            stats: RwLock::new(DispatchStats::default()),
            shutdown_requested: AtomicBool::new(false),
        }
    }
}

//! Session orchestration: the per-session state, the dual-rate scheduler and
//! the single-threaded dispatcher that drives them.
//!
//! Pose producers run on their own threads and reach the dispatcher only
//! through a bounded channel of [`PoseMsg`]; [`SharedState`] is the only other
//! cross-thread surface.

pub mod dispatcher;
pub mod messages;
pub mod scheduler;
pub mod session;
pub mod shared_state;

pub use dispatcher::{Dispatcher, DispatcherOptions};
pub use messages::PoseMsg;
pub use scheduler::{Driver, DualRateScheduler, PeriodicTimer};
pub use session::{Agent, FrameSource, Session};
pub use shared_state::{DispatchStats, SharedState};

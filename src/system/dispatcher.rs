//! Single-threaded dispatcher: pose ingestion and both periodic drivers.
//!
//! The dispatcher owns the [`Session`]. It blocks on the pose channel until the
//! next timer deadline, commits poses as they arrive and fires whichever
//! drivers are due. Because everything runs on this one thread, the vehicle
//! state store needs no synchronization.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use tracing::{debug, info};

use crate::bridge::BridgeState;
use crate::io::SessionConfig;

use super::messages::PoseMsg;
use super::scheduler::{Driver, DualRateScheduler};
use super::session::Session;
use super::shared_state::SharedState;

/// Longest uninterrupted sleep, so shutdown requests are noticed promptly.
const SHUTDOWN_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherOptions {
    pub render_rate_hz: f64,
    pub publish_rate_hz: f64,
    /// Wait before the single bridge connection attempt.
    pub startup_grace: Duration,
    pub duration: Option<Duration>,
    pub stop_on_feed_end: bool,
}

impl DispatcherOptions {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            render_rate_hz: config.render.rate_hz,
            publish_rate_hz: config.publish.rate_hz,
            startup_grace: config.render.startup_grace(),
            duration: config.session.duration(),
            stop_on_feed_end: config.session.stop_on_feed_end,
        }
    }
}

pub struct Dispatcher {
    session: Session,
    poses: Receiver<PoseMsg>,
    shared: Arc<SharedState>,
    options: DispatcherOptions,
}

impl Dispatcher {
    pub fn new(
        session: Session,
        poses: Receiver<PoseMsg>,
        shared: Arc<SharedState>,
        options: DispatcherOptions,
    ) -> Self {
        Self {
            session,
            poses,
            shared,
            options,
        }
    }

    /// Run until shutdown, the configured duration, or (optionally) the end of
    /// the pose feed. Returns the session for inspection.
    pub fn run(mut self) -> Session {
        if self.session.bridge_state() == BridgeState::Connecting {
            info!(
                "Waiting {:.1}s for the renderer before connecting",
                self.options.startup_grace.as_secs_f64()
            );
            if !self.sleep_until(Instant::now() + self.options.startup_grace) {
                self.session.finish();
                return self.session;
            }
            self.session.connect_bridge();
        }

        let start = Instant::now();
        let end = self.options.duration.map(|d| start + d);
        let mut scheduler =
            DualRateScheduler::new(self.options.render_rate_hz, self.options.publish_rate_hz, start);
        let mut feed_open = true;

        loop {
            if self.shared.is_shutdown_requested() {
                info!("Shutdown requested");
                break;
            }
            let now = Instant::now();
            if end.is_some_and(|end| now >= end) {
                info!("Run duration elapsed");
                break;
            }

            let due = scheduler.poll(now);
            for driver in due.drivers() {
                self.fire(driver);
            }
            if due.any() {
                let render = scheduler.timer(Driver::Render);
                let publish = scheduler.timer(Driver::Publish);
                let (render_fired, render_skipped) = (render.fired(), render.skipped());
                let (publish_fired, publish_skipped) = (publish.fired(), publish.skipped());
                self.shared.update_stats(|s| {
                    s.render_ticks = render_fired;
                    s.render_skipped = render_skipped;
                    s.publish_ticks = publish_fired;
                    s.publish_skipped = publish_skipped;
                });

                // Drivers that overrun their period are due again immediately;
                // poses queued meanwhile are committed before the next round.
                if feed_open && !self.drain_pending() {
                    feed_open = false;
                    info!("Pose feed closed");
                    if self.options.stop_on_feed_end {
                        break;
                    }
                }
                continue;
            }

            let deadline = match end {
                Some(end) => scheduler.next_deadline().min(end),
                None => scheduler.next_deadline(),
            };

            if !feed_open {
                self.sleep_until(deadline);
                continue;
            }

            match self.poses.recv_deadline(deadline) {
                Ok(msg) => self.ingest(&msg),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    feed_open = false;
                    info!("Pose feed closed");
                    if self.options.stop_on_feed_end {
                        break;
                    }
                }
            }
        }

        self.session.finish();
        self.session
    }

    fn ingest(&mut self, msg: &PoseMsg) {
        let accepted = self.session.ingest_pose(msg);
        self.shared.update_stats(|s| {
            if accepted {
                s.poses_ingested += 1;
            } else {
                s.poses_rejected += 1;
            }
        });
    }

    /// Commit the poses already queued, without blocking. Returns `false` once
    /// the feed is disconnected.
    fn drain_pending(&mut self) -> bool {
        // One extra attempt observes an empty or disconnected channel.
        for _ in 0..=self.poses.len() {
            match self.poses.try_recv() {
                Ok(msg) => self.ingest(&msg),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
        true
    }

    fn fire(&mut self, driver: Driver) {
        let started = Instant::now();
        match driver {
            Driver::Render => {
                self.session.render_tick();
            }
            Driver::Publish => {
                self.session.publish_tick();
            }
        }
        debug!("{:?} driver took {:?}", driver, started.elapsed());
    }

    /// Sleep until `deadline` in short slices. Returns `false` if shutdown was
    /// requested meanwhile.
    fn sleep_until(&self, deadline: Instant) -> bool {
        loop {
            if self.shared.is_shutdown_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(SHUTDOWN_POLL));
        }
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::bounded;
    use nalgebra::{Quaternion, Vector3};

    use super::*;
    use crate::bridge::OfflineBridge;
    use crate::publish::{AgentOutput, OutputSink};
    use crate::state::AgentId;
    use crate::system::session::tests::CollectingSink;

    fn options(duration_ms: Option<u64>) -> DispatcherOptions {
        DispatcherOptions {
            render_rate_hz: 50.0,
            publish_rate_hz: 50.0,
            startup_grace: Duration::from_millis(30),
            duration: duration_ms.map(Duration::from_millis),
            stop_on_feed_end: false,
        }
    }

    /// Sink that takes longer than any publish period.
    struct SlowSink(Duration);

    impl OutputSink for SlowSink {
        fn publish(&mut self, _output: &AgentOutput<'_>) -> anyhow::Result<()> {
            std::thread::sleep(self.0);
            Ok(())
        }
    }

    fn headless_session(sink: &CollectingSink) -> Session {
        let mut config = SessionConfig::default();
        config.render.enabled = false;
        Session::new(&config, None, Box::new(sink.clone()))
    }

    #[test]
    fn test_runs_for_configured_duration() {
        let sink = CollectingSink::default();
        let (_tx, rx) = bounded::<PoseMsg>(4);
        let shared = SharedState::new();

        let started = Instant::now();
        let session = Dispatcher::new(headless_session(&sink), rx, Arc::clone(&shared), options(Some(200))).run();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_secs(2));
        // 50 Hz over 200 ms, with generous slack for a loaded machine.
        let ticks = session.publish_ticks();
        assert!((3..=11).contains(&ticks), "publish ticks = {}", ticks);
        assert_eq!(shared.stats().publish_ticks, ticks);
        assert_eq!(sink.0.borrow().len() as u64, ticks * 3);
    }

    #[test]
    fn test_ingests_poses_and_stops_on_feed_end() {
        let sink = CollectingSink::default();
        let (tx, rx) = bounded::<PoseMsg>(8);
        let shared = SharedState::new();

        let q = Quaternion::new(1.0, 0.0, 0.0, 0.0);
        tx.send(PoseMsg::new(AgentId(0), Vector3::new(1.0, 2.0, 3.0), q)).unwrap();
        tx.send(PoseMsg::new(AgentId(1), Vector3::zeros(), q)).unwrap();
        tx.send(PoseMsg::new(AgentId(9), Vector3::zeros(), q)).unwrap();
        drop(tx);

        let mut opts = options(Some(5_000));
        opts.stop_on_feed_end = true;
        let started = Instant::now();
        let session = Dispatcher::new(headless_session(&sink), rx, Arc::clone(&shared), opts).run();

        assert!(started.elapsed() < Duration::from_secs(2));
        let stats = shared.stats();
        assert_eq!(stats.poses_ingested, 2);
        assert_eq!(stats.poses_rejected, 1);
        let state = session.store().read(AgentId(0)).unwrap();
        assert_eq!(state.position, Vector3::new(-2.0, 1.0, 3.0));
    }

    #[test]
    fn test_overrunning_drivers_still_ingest_poses() {
        let mut config = SessionConfig::default();
        config.render.enabled = false;
        let session = Session::new(&config, None, Box::new(SlowSink(Duration::from_millis(10))));
        let (tx, rx) = bounded::<PoseMsg>(8);
        let shared = SharedState::new();

        // Poses arrive only once the publish driver is permanently behind.
        let feeder = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            let q = Quaternion::new(1.0, 0.0, 0.0, 0.0);
            tx.send(PoseMsg::new(AgentId(0), Vector3::new(1.0, 2.0, 3.0), q)).unwrap();
            tx.send(PoseMsg::new(AgentId(2), Vector3::zeros(), q)).unwrap();
        });

        let mut opts = options(Some(5_000));
        opts.startup_grace = Duration::ZERO;
        opts.publish_rate_hz = 1_000.0;
        opts.stop_on_feed_end = true;
        let started = Instant::now();
        let session = Dispatcher::new(session, rx, Arc::clone(&shared), opts).run();
        feeder.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        let stats = shared.stats();
        assert_eq!(stats.poses_ingested, 2);
        assert!(stats.publish_ticks >= 2);
        assert!(stats.publish_skipped > 0);
        let state = session.store().read(AgentId(0)).unwrap();
        assert_eq!(state.position, Vector3::new(-2.0, 1.0, 3.0));
    }

    #[test]
    fn test_shutdown_before_start() {
        let sink = CollectingSink::default();
        let (_tx, rx) = bounded::<PoseMsg>(1);
        let shared = SharedState::new();
        shared.request_shutdown();

        let session = Dispatcher::new(headless_session(&sink), rx, shared, options(None)).run();
        assert_eq!(session.publish_ticks(), 0);
        assert!(sink.0.borrow().is_empty());
    }

    #[test]
    fn test_connects_after_grace_and_renders() {
        let sink = CollectingSink::default();
        let (_tx, rx) = bounded::<PoseMsg>(1);
        let session = Session::new(
            &SessionConfig::default(),
            Some(Box::new(OfflineBridge::new())),
            Box::new(sink.clone()),
        );
        assert_eq!(session.bridge_state(), BridgeState::Connecting);

        let session = Dispatcher::new(session, rx, SharedState::new(), options(Some(150))).run();

        assert_eq!(session.bridge_state(), BridgeState::Ready);
        assert!(session.render_ticks() > 0);
        assert!(session.agent(AgentId(0)).unwrap().last_frame().is_some());
    }
}

//! Dual-Rate Scheduler: two independent periodic timers on one thread.
//!
//! The render driver and the publish driver each own a [`PeriodicTimer`]. The
//! dispatcher asks the scheduler which drivers are due and how long it may
//! wait for pose messages before the next one is.

use std::time::{Duration, Instant};

const MIN_RATE_HZ: f64 = 1.0e-3;
const MIN_PERIOD: Duration = Duration::from_micros(1);

/// The two periodic callbacks of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    Render,
    Publish,
}

/// Fixed-period timer with skip-on-overrun semantics.
///
/// The first fire is one period after `start`. When the caller falls more than
/// one period behind, the missed ticks are dropped rather than fired back to
/// back.
#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    period: Duration,
    next_due: Instant,
    fired: u64,
    skipped: u64,
}

impl PeriodicTimer {
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next_due: start + period,
            fired: 0,
            skipped: 0,
        }
    }

    /// Timer for a rate in Hz. Rates below `MIN_RATE_HZ` (including non-finite
    /// ones) fall back to 1 Hz; the period never drops below `MIN_PERIOD`.
    pub fn from_rate_hz(rate_hz: f64, start: Instant) -> Self {
        let period = if rate_hz.is_finite() && rate_hz >= MIN_RATE_HZ {
            Duration::try_from_secs_f64(1.0 / rate_hz)
                .unwrap_or(Duration::from_secs(1))
                .max(MIN_PERIOD)
        } else {
            Duration::from_secs(1)
        };
        Self::new(period, start)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// Fire if due. Returns whether the timer fired.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }

        self.fired += 1;
        self.next_due += self.period;

        if self.next_due <= now {
            let behind = now - self.next_due;
            let missed = behind.as_nanos() / self.period.as_nanos().max(1) + 1;
            self.skipped += missed as u64;
            self.next_due = now + self.period;
        }
        true
    }
}

/// Which drivers fired on one poll. Render is always dispatched first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Due {
    pub render: bool,
    pub publish: bool,
}

impl Due {
    pub fn any(&self) -> bool {
        self.render || self.publish
    }

    pub fn drivers(&self) -> impl Iterator<Item = Driver> {
        [
            self.render.then_some(Driver::Render),
            self.publish.then_some(Driver::Publish),
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone)]
pub struct DualRateScheduler {
    render: PeriodicTimer,
    publish: PeriodicTimer,
}

impl DualRateScheduler {
    pub fn new(render_rate_hz: f64, publish_rate_hz: f64, start: Instant) -> Self {
        Self {
            render: PeriodicTimer::from_rate_hz(render_rate_hz, start),
            publish: PeriodicTimer::from_rate_hz(publish_rate_hz, start),
        }
    }

    pub fn timer(&self, driver: Driver) -> &PeriodicTimer {
        match driver {
            Driver::Render => &self.render,
            Driver::Publish => &self.publish,
        }
    }

    /// Earliest instant at which a driver becomes due.
    pub fn next_deadline(&self) -> Instant {
        self.render.next_due().min(self.publish.next_due())
    }

    pub fn poll(&mut self, now: Instant) -> Due {
        Due {
            render: self.render.poll(now),
            publish: self.publish.poll(now),
        }
    }
}

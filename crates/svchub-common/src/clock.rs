//! Injectable time source.
//!
//! All heartbeat and staleness math goes through [`Clock::now`], which is
//! monotonic and therefore safe to subtract. [`Clock::wall`] is only for
//! display (log entries, dashboard timestamps). Production code uses
//! [`SystemClock`]; tests drive [`ManualClock`] deterministically.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync + 'static {
    /// Monotonic, non-decreasing time since the clock was created.
    fn now(&self) -> Duration;

    /// Wall-clock time for display purposes.
    fn wall(&self) -> DateTime<Utc>;
}

/// Real clock backed by [`Instant`] and the system wall clock.
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-advanced clock for tests.
///
/// `now()` only moves when [`ManualClock::advance`] is called, so sweeps and
/// heartbeat ages can be replayed exactly.
pub struct ManualClock {
    elapsed: Mutex<Duration>,
    base: DateTime<Utc>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            elapsed: Mutex::new(Duration::ZERO),
            base: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wall(&self) -> DateTime<Utc> {
        self.base
            + chrono::Duration::from_std(self.now()).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

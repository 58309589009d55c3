//! Wall-clock access for key derivation and reset scheduling.
//!
//! Quotas reset at UTC midnight of the *caller's* clock, so every piece of
//! date math goes through a [`Clock`]. Production code uses [`SystemClock`];
//! tests drive [`ManualClock`] across day boundaries.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Source of the current UTC instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock.
///
/// Clones share the same instant, so a test can hand one clone to the engine
/// and keep another to advance time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The next UTC midnight strictly after `now`.
#[must_use]
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map_or(DateTime::<Utc>::MAX_UTC, |midnight| midnight.and_utc())
}

/// Time left until the next UTC midnight.
#[must_use]
pub fn time_until_reset(now: DateTime<Utc>) -> Duration {
    (next_reset(now) - now).to_std().unwrap_or_default()
}

/// Whole seconds until the next UTC midnight, rounded up.
///
/// Never returns 0: an expiry of zero seconds would delete the counter the
/// moment it is created.
#[must_use]
pub fn seconds_until_reset(now: DateTime<Utc>) -> u64 {
    let millis = (next_reset(now) - now).num_milliseconds();
    let secs = (millis + 999) / 1000;
    u64::try_from(secs).unwrap_or(0).max(1)
}

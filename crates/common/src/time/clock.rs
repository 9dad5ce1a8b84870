//! Time abstraction for testability
//!
//! Cache deadlines are wall-clock milliseconds since the UNIX epoch while
//! latencies are measured on the monotonic clock. Both come from a [`Clock`]
//! so tests can drive expiry and call spans without sleeping.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use cacheflow_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! assert_eq!(clock.millis_since_epoch(), 0);
//!
//! clock.advance(Duration::from_secs(30));
//! assert_eq!(clock.millis_since_epoch(), 30_000);
//! ```

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic and wall-clock time.
pub trait Clock: Send + Sync + 'static {
    /// Current monotonic instant, used for latency measurement
    fn now(&self) -> Instant;

    /// Current wall-clock time
    fn system_time(&self) -> SystemTime;

    /// Milliseconds since the UNIX epoch, used for deadlines and call history
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Mock clock for deterministic testing
///
/// Wall-clock time starts at the UNIX epoch plus an optional offset, so a
/// fresh clock reports `millis_since_epoch() == 0`. Clones share the same
/// elapsed counter.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    offset: Duration,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a mock clock positioned at the UNIX epoch
    pub fn new() -> Self {
        Self::starting_at_millis(0)
    }

    /// Create a mock clock whose wall-clock time starts `millis` after the
    /// UNIX epoch
    pub fn starting_at_millis(millis: u64) -> Self {
        Self {
            start: Instant::now(),
            offset: Duration::from_millis(millis),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += duration;
        }
    }

    /// Advance the mock clock by milliseconds
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed = duration;
        }
    }

    /// Get the simulated elapsed time
    pub fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|e| *e).unwrap_or(Duration::ZERO)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + self.offset + self.elapsed()
    }
}

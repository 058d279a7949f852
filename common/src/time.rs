//! Time utilities and constants for Vaultline.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Ledger timing constants.
pub mod constants {
    use super::Duration;

    /// How long a fetched price stays fresh (5 minutes).
    pub fn price_cache_ttl() -> Duration {
        Duration::minutes(5)
    }

    /// Upper bound on a single quote provider call (10 seconds).
    pub fn fetch_attempt_timeout() -> std::time::Duration {
        std::time::Duration::from_secs(10)
    }

    /// Delay before the second fetch attempt; doubled after each failure.
    pub fn initial_fetch_backoff() -> std::time::Duration {
        std::time::Duration::from_millis(1000)
    }

    /// Provider calls allowed per fetch.
    pub const MAX_FETCH_ATTEMPTS: u32 = 3;
}

/// A timestamp (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Source of the current time.
///
/// Components that reason about staleness read time through this trait so
/// tests can move time deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Create a clock frozen at the current wall time.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: Timestamp) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

/// Age of `then` relative to `now`, floored at zero.
pub fn age(then: Timestamp, now: Timestamp) -> Duration {
    let age = now.signed_duration_since(then);
    if age < Duration::zero() {
        Duration::zero()
    } else {
        age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::starting_now();
        let t0 = clock.now();
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now() - t0, Duration::seconds(90));
    }

    #[test]
    fn test_age_floors_at_zero() {
        let now = Utc::now();
        assert_eq!(age(now + Duration::seconds(5), now), Duration::zero());
        assert_eq!(age(now - Duration::seconds(5), now), Duration::seconds(5));
    }

    #[test]
    fn test_constants() {
        assert_eq!(constants::price_cache_ttl(), Duration::minutes(5));
        assert_eq!(constants::MAX_FETCH_ATTEMPTS, 3);
        assert_eq!(constants::initial_fetch_backoff().as_millis(), 1000);
    }
}

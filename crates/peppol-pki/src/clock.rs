//! Injected clock abstraction
//!
//! Cache expiry, rate-limit windows, and circuit-breaker timing all read the
//! current time through [`Clock`] instead of calling `Instant::now()` /
//! `Utc::now()` directly, so tests can drive time forward deterministically
//! with [`ManualClock`].

use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of both monotonic and wall-clock time.
///
/// Monotonic instants drive TTLs and windows; wall-clock time is needed to
/// compare against ASN.1 timestamps (CRL `nextUpdate`, OCSP `thisUpdate`).
pub trait Clock: fmt::Debug + Send + Sync {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Current wall-clock time.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Production clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests.
///
/// Both time sources move together: `advance` shifts the monotonic instant
/// and the wall clock by the same amount.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    base_utc: DateTime<Utc>,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Create a clock whose wall-clock time starts at `base_utc`.
    pub fn new(base_utc: DateTime<Utc>) -> Self {
        Self {
            base: Instant::now(),
            base_utc,
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut offset = self.offset.lock().unwrap();
        *offset += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        let offset = *self.offset.lock().unwrap();
        self.base_utc + TimeDelta::from_std(offset).expect("clock offset out of range")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_starts_at_base() {
        let base = Utc::now();
        let clock = ManualClock::new(base);
        assert_eq!(clock.now_utc(), base);
    }

    #[test]
    fn manual_clock_advances_both_sources() {
        let base = Utc::now();
        let clock = ManualClock::new(base);
        let start = clock.now();

        clock.advance(Duration::from_secs(90));

        assert_eq!(clock.now().duration_since(start), Duration::from_secs(90));
        assert_eq!(clock.now_utc() - base, TimeDelta::seconds(90));
    }

    #[test]
    fn manual_clock_clones_share_offset() {
        let clock = ManualClock::new(Utc::now());
        let other = clock.clone();
        let start = clock.now();

        other.advance(Duration::from_secs(5));

        assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
    }
}

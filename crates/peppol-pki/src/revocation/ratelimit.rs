//! Per-responder rate limiting
//!
//! Caps the number of OCSP requests sent to any single responder within a
//! fixed window, so a burst of lookups cannot hammer an external CA service.
//! The cap is consulted after the verdict cache: cache hits never consume
//! rate-limit budget.

use crate::clock::Clock;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Request counter for one responder URL within the current window.
#[derive(Debug)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed-window rate limiter keyed by responder URL.
#[derive(Debug)]
pub struct ResponderRateLimiter {
    windows: DashMap<String, Window>,
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl ResponderRateLimiter {
    /// Allow `max_requests` per responder per `window`.
    pub fn new(max_requests: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
            clock,
        }
    }

    /// Try to consume one request slot for `url`.
    ///
    /// Returns `false` without blocking when the responder's window is
    /// exhausted. The window resets once more than the window duration has
    /// passed since it started.
    pub fn try_acquire(&self, url: &str) -> bool {
        let now = self.clock.now();
        let mut window = self
            .windows
            .entry(url.to_string())
            .or_insert_with(|| Window {
                started_at: now,
                count: 0,
            });

        if now.duration_since(window.started_at) > self.window {
            window.started_at = now;
            window.count = 0;
        }

        if window.count >= self.max_requests {
            warn!(responder = url, "OCSP responder rate limit exhausted");
            return false;
        }

        window.count += 1;
        true
    }

    /// Number of responders currently tracked.
    pub fn tracked_responders(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Utc;

    fn limiter(max: u32, window_secs: u64) -> (ResponderRateLimiter, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let limiter = ResponderRateLimiter::new(
            max,
            Duration::from_secs(window_secs),
            Arc::new(clock.clone()),
        );
        (limiter, clock)
    }

    #[test]
    fn allows_up_to_the_cap() {
        let (limiter, _clock) = limiter(3, 60);
        assert!(limiter.try_acquire("http://ocsp.example.com"));
        assert!(limiter.try_acquire("http://ocsp.example.com"));
        assert!(limiter.try_acquire("http://ocsp.example.com"));
        assert!(!limiter.try_acquire("http://ocsp.example.com"));
    }

    #[test]
    fn responders_are_limited_independently() {
        let (limiter, _clock) = limiter(1, 60);
        assert!(limiter.try_acquire("http://ocsp-a.example.com"));
        assert!(!limiter.try_acquire("http://ocsp-a.example.com"));

        assert!(limiter.try_acquire("http://ocsp-b.example.com"));
        assert_eq!(limiter.tracked_responders(), 2);
    }

    #[test]
    fn window_resets_after_elapsing() {
        let (limiter, clock) = limiter(2, 60);
        assert!(limiter.try_acquire("http://ocsp.example.com"));
        assert!(limiter.try_acquire("http://ocsp.example.com"));
        assert!(!limiter.try_acquire("http://ocsp.example.com"));

        // Not yet past the window: still limited
        clock.advance(Duration::from_secs(60));
        assert!(!limiter.try_acquire("http://ocsp.example.com"));

        // Past the window: budget restored
        clock.advance(Duration::from_secs(1));
        assert!(limiter.try_acquire("http://ocsp.example.com"));
    }
}

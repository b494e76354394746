//! Per-dependency circuit breaker
//!
//! Shields the validation pipeline from slow or failing external revocation
//! services. Each dependency name owns one breaker record for the lifetime
//! of the process, created lazily on first use and never destroyed.
//!
//! # State Machine
//!
//! ```text
//!                 failure rate over window >= threshold
//!       CLOSED ──────────────────────────────────────────> OPEN
//!         ^                                                  │
//!         │ trial successes == permitted count               │ open wait elapsed,
//!         │                                                  │ next call admitted
//!       HALF_OPEN <──────────────────────────────────────────┘
//!         │
//!         └─ any trial failure ──> OPEN (wait restarts)
//! ```
//!
//! While OPEN, calls are rejected immediately without invoking the wrapped
//! operation - that is the point of the breaker. Rejection is reported as a
//! distinct [`CircuitOutcome::Rejected`] variant so callers can tell
//! "breaker open" apart from "call failed" for health metrics and fallback
//! selection.
//!
//! # Concurrency
//!
//! State transitions serialize on a per-record mutex; the wrapped operation
//! itself runs outside any lock. Different dependency names never block
//! each other.

use dashmap::DashMap;
use peppol_pki::Clock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Fraction of failures over the sliding window that opens the breaker
    #[serde(default = "default_failure_rate_threshold")]
    pub failure_rate_threshold: f64,

    /// Number of most recent call outcomes considered
    #[serde(default = "default_sliding_window_size")]
    pub sliding_window_size: usize,

    /// Outcomes that must be observed before the failure rate is evaluated
    #[serde(default = "default_minimum_calls")]
    pub minimum_calls: u32,

    /// How long the breaker stays open before admitting a trial call, in seconds
    #[serde(default = "default_open_wait")]
    pub open_wait_secs: u64,

    /// Trial calls admitted while half-open; the same number of consecutive
    /// successes closes the breaker
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: default_failure_rate_threshold(),
            sliding_window_size: default_sliding_window_size(),
            minimum_calls: default_minimum_calls(),
            open_wait_secs: default_open_wait(),
            half_open_max_calls: default_half_open_max_calls(),
        }
    }
}

fn default_failure_rate_threshold() -> f64 {
    0.5
}

fn default_sliding_window_size() -> usize {
    10
}

fn default_minimum_calls() -> u32 {
    5
}

fn default_open_wait() -> u64 {
    30
}

fn default_half_open_max_calls() -> u32 {
    3
}

/// Breaker state for one dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through; outcomes feed the sliding window
    Closed,
    /// Calls are rejected without being attempted
    Open,
    /// A bounded number of trial calls probe the dependency
    HalfOpen,
}

/// Rejection signal: the breaker is open for this dependency.
#[derive(Debug, Clone, thiserror::Error)]
#[error("circuit breaker '{dependency}' is open; call not permitted")]
pub struct CallNotPermitted {
    /// The dependency whose breaker rejected the call
    pub dependency: String,
}

/// Result of a breaker-guarded call.
///
/// `Rejected` means the operation was never invoked; `Failure` means it ran
/// and failed.
#[derive(Debug)]
pub enum CircuitOutcome<T, E> {
    Success(T),
    Rejected(CallNotPermitted),
    Failure(E),
}

impl<T, E> CircuitOutcome<T, E> {
    /// True for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, CircuitOutcome::Success(_))
    }

    /// True for `Rejected`.
    pub fn is_rejected(&self) -> bool {
        matches!(self, CircuitOutcome::Rejected(_))
    }
}

/// Health metrics snapshot for one dependency
///
/// Computed from the same counters the state transitions use, never by
/// re-scanning call history.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerHealth {
    /// Current state
    pub state: CircuitState,
    /// Calls that were admitted (successes + failures)
    pub total_calls: u64,
    /// Admitted calls that succeeded
    pub successful_calls: u64,
    /// Admitted calls that failed
    pub failed_calls: u64,
    /// Calls rejected while open or half-open saturated
    pub rejected_calls: u64,
    /// successful_calls / total_calls, 0 when nothing was admitted
    pub success_rate: f64,
    /// failed_calls / total_calls, 0 when nothing was admitted
    pub failure_rate: f64,
    /// Seconds since the last state change
    pub seconds_since_state_change: u64,
    /// Times the breaker transitioned to open (including forced opens)
    pub open_events: u64,
}

/// Mutable breaker state for one dependency.
#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    /// Most recent call outcomes, true = success
    window: VecDeque<bool>,
    consecutive_failures: u32,
    half_open_in_flight: u32,
    half_open_successes: u32,
    last_state_change: Instant,
    total_calls: u64,
    successful_calls: u64,
    failed_calls: u64,
    rejected_calls: u64,
    open_events: u64,
}

impl BreakerCore {
    fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            window: VecDeque::new(),
            consecutive_failures: 0,
            half_open_in_flight: 0,
            half_open_successes: 0,
            last_state_change: now,
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            rejected_calls: 0,
            open_events: 0,
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.open_events += 1;
        self.last_state_change = now;
        self.window.clear();
        self.half_open_in_flight = 0;
        self.half_open_successes = 0;
    }

    fn close(&mut self, now: Instant) {
        self.state = CircuitState::Closed;
        self.last_state_change = now;
        self.window.clear();
        self.consecutive_failures = 0;
        self.half_open_in_flight = 0;
        self.half_open_successes = 0;
    }
}

/// Registry of per-dependency circuit breakers.
///
/// One instance is shared by every request handler in the process; hidden
/// global state is deliberately avoided so tests can run isolated breakers.
#[derive(Debug)]
pub struct CircuitBreaker {
    records: DashMap<String, Arc<Mutex<BreakerCore>>>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// Create a breaker registry.
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            config,
            clock,
        }
    }

    /// Run `operation` guarded by the breaker for `dependency`.
    ///
    /// A blank dependency name is a programming error and panics rather than
    /// being swallowed.
    pub fn call<T, E, F>(&self, dependency: &str, operation: F) -> CircuitOutcome<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        assert!(
            !dependency.trim().is_empty(),
            "circuit breaker dependency name must not be blank"
        );

        let record = self.record(dependency);

        // Admission decision under the record lock
        {
            let mut core = record.lock().unwrap();
            let now = self.clock.now();
            match core.state {
                CircuitState::Closed => {}
                CircuitState::Open => {
                    let waited = now.duration_since(core.last_state_change);
                    if waited >= Duration::from_secs(self.config.open_wait_secs) {
                        core.state = CircuitState::HalfOpen;
                        core.last_state_change = now;
                        core.half_open_in_flight = 1;
                        core.half_open_successes = 0;
                        info!(dependency, "circuit breaker half-open, admitting trial call");
                    } else {
                        core.rejected_calls += 1;
                        return CircuitOutcome::Rejected(CallNotPermitted {
                            dependency: dependency.to_string(),
                        });
                    }
                }
                CircuitState::HalfOpen => {
                    if core.half_open_in_flight >= self.config.half_open_max_calls {
                        core.rejected_calls += 1;
                        return CircuitOutcome::Rejected(CallNotPermitted {
                            dependency: dependency.to_string(),
                        });
                    }
                    core.half_open_in_flight += 1;
                }
            }
        }

        // The operation runs outside the lock
        let result = operation();
        self.record_outcome(&record, dependency, result.is_ok());

        match result {
            Ok(value) => CircuitOutcome::Success(value),
            Err(error) => CircuitOutcome::Failure(error),
        }
    }

    /// Run `primary` guarded by the breaker; on any rejection or failure,
    /// return `fallback()` instead. Never fails.
    pub fn call_with_fallback<T, E, F, G>(&self, dependency: &str, primary: F, fallback: G) -> T
    where
        F: FnOnce() -> Result<T, E>,
        G: FnOnce() -> T,
    {
        match self.call(dependency, primary) {
            CircuitOutcome::Success(value) => value,
            CircuitOutcome::Rejected(_) | CircuitOutcome::Failure(_) => fallback(),
        }
    }

    /// Current state for `dependency`, creating its record if needed.
    pub fn state(&self, dependency: &str) -> CircuitState {
        let record = self.record(dependency);
        let state = record.lock().unwrap().state;
        state
    }

    /// Health metrics snapshot for `dependency`.
    pub fn health(&self, dependency: &str) -> BreakerHealth {
        let record = self.record(dependency);
        let core = record.lock().unwrap();
        let total = core.total_calls;
        let (success_rate, failure_rate) = if total > 0 {
            (
                core.successful_calls as f64 / total as f64,
                core.failed_calls as f64 / total as f64,
            )
        } else {
            (0.0, 0.0)
        };
        BreakerHealth {
            state: core.state,
            total_calls: total,
            successful_calls: core.successful_calls,
            failed_calls: core.failed_calls,
            rejected_calls: core.rejected_calls,
            success_rate,
            failure_rate,
            seconds_since_state_change: self
                .clock
                .now()
                .duration_since(core.last_state_change)
                .as_secs(),
            open_events: core.open_events,
        }
    }

    /// Force the breaker open, bypassing the automatic logic.
    pub fn force_open(&self, dependency: &str) {
        let record = self.record(dependency);
        let mut core = record.lock().unwrap();
        core.open(self.clock.now());
        warn!(dependency, "circuit breaker forced open");
    }

    /// Force the breaker closed, bypassing the automatic logic.
    pub fn force_close(&self, dependency: &str) {
        let record = self.record(dependency);
        let mut core = record.lock().unwrap();
        core.close(self.clock.now());
        info!(dependency, "circuit breaker forced closed");
    }

    /// Dependency names with a breaker record.
    pub fn dependencies(&self) -> Vec<String> {
        self.records.iter().map(|e| e.key().clone()).collect()
    }

    fn record(&self, dependency: &str) -> Arc<Mutex<BreakerCore>> {
        self.records
            .entry(dependency.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(BreakerCore::new(self.clock.now()))))
            .clone()
    }

    fn record_outcome(&self, record: &Arc<Mutex<BreakerCore>>, dependency: &str, success: bool) {
        let mut core = record.lock().unwrap();
        let now = self.clock.now();

        core.total_calls += 1;
        if success {
            core.successful_calls += 1;
            core.consecutive_failures = 0;
        } else {
            core.failed_calls += 1;
            core.consecutive_failures += 1;
        }

        match core.state {
            CircuitState::Closed => {
                core.window.push_back(success);
                while core.window.len() > self.config.sliding_window_size {
                    core.window.pop_front();
                }
                if core.window.len() as u32 >= self.config.minimum_calls {
                    let failures = core.window.iter().filter(|ok| !**ok).count();
                    let rate = failures as f64 / core.window.len() as f64;
                    if rate >= self.config.failure_rate_threshold {
                        core.open(now);
                        warn!(
                            dependency,
                            failure_rate = rate,
                            "circuit breaker opened"
                        );
                    }
                }
            }
            CircuitState::HalfOpen => {
                core.half_open_in_flight = core.half_open_in_flight.saturating_sub(1);
                if success {
                    core.half_open_successes += 1;
                    if core.half_open_successes >= self.config.half_open_max_calls {
                        core.close(now);
                        info!(dependency, "circuit breaker closed after successful trials");
                    }
                } else {
                    core.open(now);
                    warn!(dependency, "trial call failed, circuit breaker reopened");
                }
            }
            // A late outcome from a call admitted before a forced transition:
            // only the counters matter.
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use peppol_pki::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn breaker(config: CircuitBreakerConfig) -> (CircuitBreaker, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let breaker = CircuitBreaker::new(config, Arc::new(clock.clone()));
        (breaker, clock)
    }

    fn failing_call(breaker: &CircuitBreaker, dependency: &str) -> CircuitOutcome<(), &'static str> {
        breaker.call(dependency, || Err("boom"))
    }

    #[test]
    fn closed_breaker_passes_calls_through() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig::default());
        let outcome = breaker.call::<_, (), _>("dep", || Ok(42));
        assert!(matches!(outcome, CircuitOutcome::Success(42)));
        assert_eq!(breaker.state("dep"), CircuitState::Closed);
    }

    #[test]
    fn opens_after_five_consecutive_failures_and_rejects_without_invoking() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig::default());

        for _ in 0..5 {
            assert!(!failing_call(&breaker, "ocsp-service").is_success());
        }
        assert_eq!(breaker.state("ocsp-service"), CircuitState::Open);

        // The sixth call is rejected and the operation is NOT invoked
        let invoked = AtomicUsize::new(0);
        let outcome = breaker.call::<(), &str, _>("ocsp-service", || {
            invoked.fetch_add(1, Ordering::SeqCst);
            Err("boom")
        });
        assert!(outcome.is_rejected());
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn below_minimum_calls_no_transition() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig::default());
        for _ in 0..4 {
            failing_call(&breaker, "dep");
        }
        assert_eq!(breaker.state("dep"), CircuitState::Closed);
    }

    #[test]
    fn mixed_outcomes_below_threshold_stay_closed() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig::default());
        // 10 calls, 4 failures: 40% < 50% threshold
        for i in 0..10 {
            breaker.call::<_, &str, _>("dep", || if i % 3 == 0 { Err("boom") } else { Ok(()) });
        }
        assert_eq!(breaker.state("dep"), CircuitState::Closed);
    }

    #[test]
    fn half_open_after_wait_then_closes_on_success() {
        let config = CircuitBreakerConfig {
            half_open_max_calls: 1,
            ..CircuitBreakerConfig::default()
        };
        let (breaker, clock) = breaker(config);

        breaker.force_open("dep");
        assert!(failing_call(&breaker, "dep").is_rejected());

        // After the wait the next call is attempted, not rejected
        clock.advance(Duration::from_secs(31));
        let invoked = AtomicUsize::new(0);
        let outcome = breaker.call::<_, &str, _>("dep", || {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(outcome.is_success());
        assert_eq!(invoked.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.state("dep"), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let (breaker, clock) = breaker(CircuitBreakerConfig::default());
        breaker.force_open("dep");

        clock.advance(Duration::from_secs(31));
        assert!(!failing_call(&breaker, "dep").is_rejected());
        assert_eq!(breaker.state("dep"), CircuitState::Open);

        // The wait restarts from the reopen
        assert!(failing_call(&breaker, "dep").is_rejected());
    }

    #[test]
    fn half_open_requires_a_run_of_successes() {
        let config = CircuitBreakerConfig {
            half_open_max_calls: 3,
            ..CircuitBreakerConfig::default()
        };
        let (breaker, clock) = breaker(config);
        breaker.force_open("dep");
        clock.advance(Duration::from_secs(31));

        breaker.call::<_, &str, _>("dep", || Ok(()));
        assert_eq!(breaker.state("dep"), CircuitState::HalfOpen);
        breaker.call::<_, &str, _>("dep", || Ok(()));
        assert_eq!(breaker.state("dep"), CircuitState::HalfOpen);
        breaker.call::<_, &str, _>("dep", || Ok(()));
        assert_eq!(breaker.state("dep"), CircuitState::Closed);
    }

    #[test]
    fn fallback_runs_on_failure_and_rejection() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig::default());

        let value = breaker.call_with_fallback("dep", || Err::<u32, _>("boom"), || 99);
        assert_eq!(value, 99);

        breaker.force_open("dep");
        let value = breaker.call_with_fallback("dep", || Ok::<u32, &str>(1), || 99);
        assert_eq!(value, 99);
    }

    #[test]
    fn force_close_restores_traffic() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig::default());
        breaker.force_open("dep");
        assert!(failing_call(&breaker, "dep").is_rejected());

        breaker.force_close("dep");
        let outcome = breaker.call::<_, &str, _>("dep", || Ok(7));
        assert!(outcome.is_success());
    }

    #[test]
    fn dependencies_are_isolated() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig::default());
        for _ in 0..5 {
            failing_call(&breaker, "crl-service");
        }
        assert_eq!(breaker.state("crl-service"), CircuitState::Open);
        assert_eq!(breaker.state("ocsp-service"), CircuitState::Closed);

        let outcome = breaker.call::<_, &str, _>("ocsp-service", || Ok(()));
        assert!(outcome.is_success());
    }

    #[test]
    fn health_reflects_the_transition_counters() {
        let (breaker, clock) = breaker(CircuitBreakerConfig::default());

        breaker.call::<_, &str, _>("dep", || Ok(()));
        // The window fills at the fourth failure (five observed outcomes,
        // 80% failure rate) and the breaker opens; the fifth is rejected.
        for _ in 0..5 {
            failing_call(&breaker, "dep");
        }

        clock.advance(Duration::from_secs(10));
        let health = breaker.health("dep");
        assert_eq!(health.state, CircuitState::Open);
        assert_eq!(health.total_calls, 5);
        assert_eq!(health.successful_calls, 1);
        assert_eq!(health.failed_calls, 4);
        assert_eq!(health.rejected_calls, 1);
        assert_eq!(health.open_events, 1);
        assert!((health.failure_rate - 4.0 / 5.0).abs() < 1e-9);
        assert!((health.success_rate - 1.0 / 5.0).abs() < 1e-9);
        assert_eq!(health.seconds_since_state_change, 10);
    }

    #[test]
    fn force_open_counts_as_open_event() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig::default());
        breaker.force_open("dep");
        breaker.force_close("dep");
        breaker.force_open("dep");
        assert_eq!(breaker.health("dep").open_events, 2);
    }

    #[test]
    #[should_panic(expected = "must not be blank")]
    fn blank_dependency_name_is_a_programming_error() {
        let (breaker, _clock) = breaker(CircuitBreakerConfig::default());
        breaker.call::<_, &str, _>("  ", || Ok(()));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: CircuitBreakerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CircuitBreakerConfig::default());
        assert_eq!(config.minimum_calls, 5);
        assert_eq!(config.open_wait_secs, 30);
    }
}

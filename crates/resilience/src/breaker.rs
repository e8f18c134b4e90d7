//! Circuit breaker with a rolling failure-rate window.
//!
//! # States
//!
//! ```text
//! Closed ──(failure rate ≥ threshold over ≥ minimum calls)──▶ Open
//! Open ──(first call after wait duration)──▶ HalfOpen
//! HalfOpen ──(trial failure rate < threshold)──▶ Closed
//! HalfOpen ──(trial failure rate ≥ threshold)──▶ Open
//! ```
//!
//! Callers acquire a [`CallPermit`] before invoking the protected operation
//! and hand it back with the outcome. A permit dropped without an outcome
//! (the call was cancelled) is released. Every transition starts a new
//! epoch; outcomes carried by permits from an earlier epoch are discarded.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::error::CallNotPermitted;
use crate::window::SlidingWindow;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    fn gauge_value(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a call made under a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
}

/// Permission to make one call through the breaker.
#[derive(Debug)]
#[must_use = "dropping a permit releases it without recording an outcome"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    epoch: u64,
    settled: bool,
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release_epoch(self.epoch);
        }
    }
}

/// Point-in-time view of the breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerMetrics {
    pub state: CircuitState,
    /// Failure rate in percent, or `None` until enough calls are recorded.
    pub failure_rate: Option<f32>,
    pub buffered_calls: usize,
    pub failed_calls: usize,
    pub not_permitted_calls: u64,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    epoch: u64,
    window: SlidingWindow,
    opened_at: Instant,
    trials_admitted: u32,
    trial_successes: u32,
    trial_failures: u32,
    not_permitted: u64,
}

/// Thread-safe circuit breaker shared by all concurrent callers.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker. The config is expected to be validated.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        let window = SlidingWindow::new(config.sliding_window_type, config.sliding_window_size);
        metrics::gauge!("circuit_breaker_state", "name" => name.clone())
            .set(CircuitState::Closed.gauge_value());

        Self {
            name,
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                epoch: 0,
                window,
                opened_at: Instant::now(),
                trials_admitted: 0,
                trial_successes: 0,
                trial_failures: 0,
                not_permitted: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. An open breaker whose wait has elapsed still reports
    /// `Open` until the next call attempt.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Asks for permission to make a call.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, CallNotPermitted> {
        let now = Instant::now();
        let mut inner = self.lock();

        if inner.state == CircuitState::Open
            && now.duration_since(inner.opened_at) >= self.config.wait_duration_in_open_state
        {
            self.transition(&mut inner, CircuitState::HalfOpen, now);
        }

        let permitted = match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if inner.trials_admitted < self.config.permitted_calls_in_half_open_state {
                    inner.trials_admitted += 1;
                    true
                } else {
                    false
                }
            }
        };

        if permitted {
            Ok(CallPermit {
                breaker: self,
                epoch: inner.epoch,
                settled: false,
            })
        } else {
            inner.not_permitted += 1;
            metrics::counter!("circuit_breaker_calls_total", "name" => self.name.clone(), "outcome" => "not_permitted")
                .increment(1);
            Err(CallNotPermitted {
                name: self.name.clone(),
                state: inner.state,
            })
        }
    }

    /// Records the outcome of a permitted call.
    pub fn record(&self, mut permit: CallPermit<'_>, outcome: CallOutcome) {
        permit.settled = true;
        let epoch = permit.epoch;
        drop(permit);

        let outcome_label = match outcome {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
        };
        metrics::counter!("circuit_breaker_calls_total", "name" => self.name.clone(), "outcome" => outcome_label)
            .increment(1);

        let now = Instant::now();
        let mut inner = self.lock();
        if epoch != inner.epoch {
            tracing::debug!(breaker = %self.name, "discarding outcome from a previous breaker epoch");
            return;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.window.record(outcome, now);
                let snapshot = inner.window.snapshot(now);
                if snapshot.calls >= self.config.effective_minimum_calls()
                    && snapshot.failure_rate() >= self.config.failure_rate_threshold
                {
                    tracing::warn!(
                        breaker = %self.name,
                        failure_rate = snapshot.failure_rate(),
                        calls = snapshot.calls,
                        "failure rate reached threshold"
                    );
                    self.transition(&mut inner, CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => {
                match outcome {
                    CallOutcome::Success => inner.trial_successes += 1,
                    CallOutcome::Failure => inner.trial_failures += 1,
                }
                let recorded = inner.trial_successes + inner.trial_failures;
                if recorded >= self.config.permitted_calls_in_half_open_state {
                    let failure_rate = inner.trial_failures as f32 * 100.0 / recorded as f32;
                    let next = if failure_rate >= self.config.failure_rate_threshold {
                        CircuitState::Open
                    } else {
                        CircuitState::Closed
                    };
                    self.transition(&mut inner, next, now);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_success(&self, permit: CallPermit<'_>) {
        self.record(permit, CallOutcome::Success);
    }

    pub fn record_failure(&self, permit: CallPermit<'_>) {
        self.record(permit, CallOutcome::Failure);
    }

    /// Returns a permit without recording an outcome, for calls whose
    /// result says nothing about downstream health.
    pub fn release(&self, permit: CallPermit<'_>) {
        drop(permit);
    }

    fn release_epoch(&self, epoch: u64) {
        let mut inner = self.lock();
        if epoch == inner.epoch && inner.state == CircuitState::HalfOpen {
            inner.trials_admitted = inner.trials_admitted.saturating_sub(1);
        }
    }

    /// Opens the breaker now, restarting the wait.
    pub fn transition_to_open(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, CircuitState::Open, Instant::now());
    }

    /// Closes the breaker and forgets recorded calls.
    pub fn reset(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, CircuitState::Closed, Instant::now());
    }

    pub fn metrics(&self) -> BreakerMetrics {
        let now = Instant::now();
        let mut inner = self.lock();

        let (calls, failures) = match inner.state {
            CircuitState::HalfOpen => (
                (inner.trial_successes + inner.trial_failures) as usize,
                inner.trial_failures as usize,
            ),
            _ => {
                let snapshot = inner.window.snapshot(now);
                (snapshot.calls, snapshot.failures)
            }
        };
        let minimum = match inner.state {
            CircuitState::HalfOpen => self.config.permitted_calls_in_half_open_state as usize,
            _ => self.config.effective_minimum_calls(),
        };
        let failure_rate =
            (calls >= minimum && calls > 0).then(|| failures as f32 * 100.0 / calls as f32);

        BreakerMetrics {
            state: inner.state,
            failure_rate,
            buffered_calls: calls,
            failed_calls: failures,
            not_permitted_calls: inner.not_permitted,
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState, now: Instant) {
        let from = inner.state;
        inner.state = to;
        inner.epoch += 1;
        inner.window.clear();
        inner.trials_admitted = 0;
        inner.trial_successes = 0;
        inner.trial_failures = 0;
        if to == CircuitState::Open {
            inner.opened_at = now;
        }

        tracing::warn!(breaker = %self.name, %from, %to, "circuit breaker state transition");
        metrics::counter!("circuit_breaker_transitions_total", "name" => self.name.clone(), "to" => to.as_str())
            .increment(1);
        metrics::gauge!("circuit_breaker_state", "name" => self.name.clone()).set(to.gauge_value());
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::SlidingWindowType;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_rate_threshold: 50.0,
            sliding_window_type: SlidingWindowType::CountBased,
            sliding_window_size: 4,
            minimum_number_of_calls: 4,
            wait_duration_in_open_state: Duration::from_secs(10),
            permitted_calls_in_half_open_state: 2,
        }
    }

    fn fail(breaker: &CircuitBreaker) {
        let permit = breaker.try_acquire().unwrap();
        breaker.record_failure(permit);
    }

    fn succeed(breaker: &CircuitBreaker) {
        let permit = breaker.try_acquire().unwrap();
        breaker.record_success(permit);
    }

    fn open(breaker: &CircuitBreaker) {
        for _ in 0..4 {
            fail(breaker);
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn starts_closed() {
        let breaker = CircuitBreaker::new("test", config());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn stays_closed_below_minimum_calls() {
        let breaker = CircuitBreaker::new("test", config());
        for _ in 0..3 {
            fail(&breaker);
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().failure_rate, None);
    }

    #[test]
    fn stays_closed_below_threshold() {
        let breaker = CircuitBreaker::new("test", config());
        fail(&breaker);
        succeed(&breaker);
        succeed(&breaker);
        succeed(&breaker);

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().failure_rate, Some(25.0));
    }

    #[test]
    fn opens_at_threshold() {
        let breaker = CircuitBreaker::new("test", config());
        succeed(&breaker);
        succeed(&breaker);
        fail(&breaker);
        fail(&breaker);

        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn open_breaker_rejects_calls() {
        let breaker = CircuitBreaker::new("test", config());
        open(&breaker);

        let err = breaker.try_acquire().unwrap_err();
        assert_eq!(err.state, CircuitState::Open);
        assert_eq!(err.name, "test");
        assert_eq!(breaker.metrics().not_permitted_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn half_opens_after_wait_duration() {
        let breaker = CircuitBreaker::new("test", config());
        open(&breaker);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(breaker.try_acquire().is_err());

        tokio::time::advance(Duration::from_secs(1)).await;
        let permit = breaker.try_acquire().unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.release(permit);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_limits_trial_calls() {
        let breaker = CircuitBreaker::new("test", config());
        open(&breaker);
        tokio::time::advance(Duration::from_secs(10)).await;

        let first = breaker.try_acquire().unwrap();
        let second = breaker.try_acquire().unwrap();
        let third = breaker.try_acquire();
        assert!(matches!(
            third,
            Err(CallNotPermitted {
                state: CircuitState::HalfOpen,
                ..
            })
        ));

        breaker.release(first);
        breaker.release(second);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_closes_on_successful_trials() {
        let breaker = CircuitBreaker::new("test", config());
        open(&breaker);
        tokio::time::advance(Duration::from_secs(10)).await;

        succeed(&breaker);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        succeed(&breaker);
        assert_eq!(breaker.state(), CircuitState::Closed);

        let metrics = breaker.metrics();
        assert_eq!(metrics.buffered_calls, 0);
        assert_eq!(metrics.failed_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_reopens_on_failed_trials() {
        let breaker = CircuitBreaker::new("test", config());
        open(&breaker);
        tokio::time::advance(Duration::from_secs(10)).await;

        succeed(&breaker);
        fail(&breaker);
        assert_eq!(breaker.state(), CircuitState::Open);

        // The wait restarts from the reopen.
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.try_acquire().is_err());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn stale_outcomes_are_discarded() {
        let breaker = CircuitBreaker::new("test", config());
        let stale = breaker.try_acquire().unwrap();
        open(&breaker);
        breaker.reset();

        breaker.record_failure(stale);
        assert_eq!(breaker.metrics().buffered_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn released_trial_permit_can_be_reused() {
        let breaker = CircuitBreaker::new("test", config());
        open(&breaker);
        tokio::time::advance(Duration::from_secs(10)).await;

        let first = breaker.try_acquire().unwrap();
        let second = breaker.try_acquire().unwrap();
        breaker.release(first);

        let third = breaker.try_acquire().unwrap();
        breaker.record_success(second);
        breaker.record_success(third);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn manual_transitions() {
        let breaker = CircuitBreaker::new("test", config());
        breaker.transition_to_open();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire().is_err());

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn time_based_window_forgets_old_failures() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                sliding_window_type: SlidingWindowType::TimeBased,
                sliding_window_size: 5,
                minimum_number_of_calls: 3,
                ..config()
            },
        );

        fail(&breaker);
        fail(&breaker);
        tokio::time::advance(Duration::from_secs(6)).await;
        fail(&breaker);
        succeed(&breaker);
        succeed(&breaker);

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().buffered_calls, 3);
    }

    #[test]
    fn concurrent_failures_open_the_breaker() {
        let breaker = std::sync::Arc::new(CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                sliding_window_size: 100,
                minimum_number_of_calls: 100,
                ..config()
            },
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let breaker = breaker.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        if let Ok(permit) = breaker.try_acquire() {
                            breaker.record_failure(permit);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(breaker.state(), CircuitState::Open);
    }
}

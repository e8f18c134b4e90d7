//! Circuit breaker and time limiter settings.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// How the breaker's rolling failure rate is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlidingWindowType {
    /// The last `sliding_window_size` calls.
    #[default]
    CountBased,
    /// Calls recorded in the last `sliding_window_size` seconds.
    TimeBased,
}

impl FromStr for SlidingWindowType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" | "count_based" => Ok(SlidingWindowType::CountBased),
            "time" | "time_based" => Ok(SlidingWindowType::TimeBased),
            other => Err(ConfigError::UnknownWindowType(other.to_string())),
        }
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Failure rate, in percent, at or above which the breaker opens.
    pub failure_rate_threshold: f32,
    pub sliding_window_type: SlidingWindowType,
    /// Number of calls, or seconds for a time-based window.
    pub sliding_window_size: u32,
    /// Calls that must be recorded before the failure rate is evaluated.
    pub minimum_number_of_calls: u32,
    /// How long the breaker stays open before admitting trial calls.
    pub wait_duration_in_open_state: Duration,
    /// Trial calls admitted while half-open.
    pub permitted_calls_in_half_open_state: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            sliding_window_type: SlidingWindowType::CountBased,
            sliding_window_size: 10,
            minimum_number_of_calls: 5,
            wait_duration_in_open_state: Duration::from_secs(5),
            permitted_calls_in_half_open_state: 3,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 100.0) {
            return Err(ConfigError::FailureRateThreshold(
                self.failure_rate_threshold,
            ));
        }
        if self.sliding_window_size == 0 {
            return Err(ConfigError::ZeroCount {
                field: "sliding_window_size",
            });
        }
        if self.minimum_number_of_calls == 0 {
            return Err(ConfigError::ZeroCount {
                field: "minimum_number_of_calls",
            });
        }
        if self.permitted_calls_in_half_open_state == 0 {
            return Err(ConfigError::ZeroCount {
                field: "permitted_calls_in_half_open_state",
            });
        }
        Ok(())
    }

    /// Minimum number of calls actually required before evaluation.
    ///
    /// A count-based window can never hold more than its size, so the
    /// minimum is capped there.
    pub(crate) fn effective_minimum_calls(&self) -> usize {
        let minimum = self.minimum_number_of_calls as usize;
        match self.sliding_window_type {
            SlidingWindowType::CountBased => minimum.min(self.sliding_window_size as usize),
            SlidingWindowType::TimeBased => minimum,
        }
    }
}

/// Time limiter settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeLimiterConfig {
    pub timeout: Duration,
    /// Abort the task once the timeout fires.
    pub cancel_running_future: bool,
}

impl Default for TimeLimiterConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            cancel_running_future: true,
        }
    }
}

impl TimeLimiterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

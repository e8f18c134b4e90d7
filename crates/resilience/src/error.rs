//! Resilience error types.

use std::time::Duration;

use thiserror::Error;

use crate::breaker::CircuitState;

/// Invalid breaker or time limiter settings.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("failure rate threshold must be in (0, 100], got {0}")]
    FailureRateThreshold(f32),

    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("unknown sliding window type '{0}', expected 'count' or 'time'")]
    UnknownWindowType(String),
}

/// The circuit breaker refused to let a call through.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("circuit breaker '{name}' is {state} and does not permit further calls")]
pub struct CallNotPermitted {
    pub name: String,
    pub state: CircuitState,
}

/// A time-limited task did not produce a value.
#[derive(Debug, Error)]
pub enum TimeLimiterError {
    /// The task did not finish within the bound.
    #[error("task did not complete within {0:?}")]
    Timeout(Duration),

    /// The task panicked or was cancelled before finishing.
    #[error("task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

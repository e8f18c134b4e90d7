//! Fault tolerance for the payment service.
//!
//! Submission goes through a [`CircuitBreaker`] and lookup through a
//! [`TimeLimiter`]. Instead of propagating downstream faults, the
//! [`ResilientPaymentGateway`] substitutes well-known fallback records and
//! reports them as [`GatewayOutcome::Fallback`].
//!
//! Nothing here retries: every call gets a single attempt, and the breaker
//! is the only behavior that adapts across calls.

pub mod breaker;
pub mod config;
pub mod error;
pub mod gateway;
pub mod time_limiter;
mod window;

pub use breaker::{BreakerMetrics, CallOutcome, CallPermit, CircuitBreaker, CircuitState};
pub use config::{CircuitBreakerConfig, SlidingWindowType, TimeLimiterConfig};
pub use error::{CallNotPermitted, ConfigError, TimeLimiterError};
pub use gateway::{
    FallbackReason, GatewayOutcome, LOOKUP_FALLBACK_STATUS, PendingLookup,
    ResilientPaymentGateway, SUBMISSION_FALLBACK_STATUS,
};
pub use time_limiter::{TimeLimited, TimeLimiter};

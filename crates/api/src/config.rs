//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use resilience::{CircuitBreakerConfig, ConfigError, SlidingWindowType, TimeLimiterConfig};

/// Log output format for the `fmt` layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `DATABASE_URL` — PostgreSQL URL; the in-memory store is used when unset
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `5`)
/// - `BREAKER_FAILURE_RATE_THRESHOLD` — percent (default: `50`)
/// - `BREAKER_SLIDING_WINDOW_TYPE` — `count` or `time` (default: `count`)
/// - `BREAKER_SLIDING_WINDOW_SIZE` — calls or seconds (default: `10`)
/// - `BREAKER_MINIMUM_CALLS` — default `5`
/// - `BREAKER_WAIT_DURATION_MS` — default `5000`
/// - `BREAKER_HALF_OPEN_CALLS` — default `3`
/// - `LOOKUP_TIMEOUT_MS` — default `3000`
/// - `LOOKUP_CANCEL_ON_TIMEOUT` — default `true`
///
/// Unparsable numbers fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub breaker: CircuitBreakerConfig,
    pub lookup: TimeLimiterConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup and validates the
    /// breaker and lookup settings.
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let sliding_window_type = match var("BREAKER_SLIDING_WINDOW_TYPE") {
            Some(value) => value.parse::<SlidingWindowType>()?,
            None => defaults.breaker.sliding_window_type,
        };

        let breaker = CircuitBreakerConfig {
            failure_rate_threshold: parsed(&var, "BREAKER_FAILURE_RATE_THRESHOLD")
                .unwrap_or(defaults.breaker.failure_rate_threshold),
            sliding_window_type,
            sliding_window_size: parsed(&var, "BREAKER_SLIDING_WINDOW_SIZE")
                .unwrap_or(defaults.breaker.sliding_window_size),
            minimum_number_of_calls: parsed(&var, "BREAKER_MINIMUM_CALLS")
                .unwrap_or(defaults.breaker.minimum_number_of_calls),
            wait_duration_in_open_state: parsed(&var, "BREAKER_WAIT_DURATION_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.breaker.wait_duration_in_open_state),
            permitted_calls_in_half_open_state: parsed(&var, "BREAKER_HALF_OPEN_CALLS")
                .unwrap_or(defaults.breaker.permitted_calls_in_half_open_state),
        };
        breaker.validate()?;

        let lookup = TimeLimiterConfig {
            timeout: parsed(&var, "LOOKUP_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.lookup.timeout),
            cancel_running_future: parsed(&var, "LOOKUP_CANCEL_ON_TIMEOUT")
                .unwrap_or(defaults.lookup.cancel_running_future),
        };
        lookup.validate()?;

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parsed(&var, "PORT").unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: var("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            database_url: var("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: parsed(&var, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            breaker,
            lookup,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T, F>(var: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    var(key).and_then(|value| value.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 5,
            breaker: CircuitBreakerConfig::default(),
            lookup: TimeLimiterConfig::default(),
        }
    }
}

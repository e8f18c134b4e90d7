//! Time-bounded execution of spawned work.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::config::TimeLimiterConfig;
use crate::error::TimeLimiterError;

/// Runs work on the runtime and gives up on it after a fixed bound.
#[derive(Debug, Clone)]
pub struct TimeLimiter {
    config: TimeLimiterConfig,
}

impl TimeLimiter {
    pub fn new(config: TimeLimiterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TimeLimiterConfig {
        &self.config
    }

    /// Spawns `future` immediately and returns a handle that resolves to
    /// whichever comes first: the future's output or the timeout.
    ///
    /// The deadline is fixed at the time of this call, not when the handle
    /// is first polled. Must be called within a tokio runtime.
    pub fn spawn<F>(&self, future: F) -> TimeLimited<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let timeout = self.config.timeout;
        let cancel = self.config.cancel_running_future;
        let deadline = Instant::now() + timeout;
        let mut handle = tokio::spawn(future);
        let abort = handle.abort_handle();
        let abort_on_timeout = abort.clone();

        let race = async move {
            tokio::select! {
                biased;
                joined = &mut handle => joined.map_err(TimeLimiterError::from),
                () = tokio::time::sleep_until(deadline) => {
                    if cancel {
                        abort_on_timeout.abort();
                    }
                    Err(TimeLimiterError::Timeout(timeout))
                }
            }
        };

        TimeLimited {
            race: Box::pin(race),
            abort: cancel.then_some(abort),
        }
    }
}

/// Pending result of time-limited work.
///
/// Dropping the handle before it resolves aborts the work when
/// cancellation is enabled.
pub struct TimeLimited<T> {
    race: BoxFuture<'static, Result<T, TimeLimiterError>>,
    abort: Option<AbortHandle>,
}

impl<T> Future for TimeLimited<T> {
    type Output = Result<T, TimeLimiterError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.race.as_mut().poll(cx)
    }
}

impl<T> Drop for TimeLimited<T> {
    fn drop(&mut self) {
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }
}

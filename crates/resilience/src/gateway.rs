//! Payment gateway with fallback substitution.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use common::{OrderId, Payment};
use futures_util::future::BoxFuture;
use payment_service::{
    OutcomeResolver, PaymentError, PaymentRequest, PaymentService, RandomOutcomeResolver,
};
use payment_store::PaymentStore;
use tokio::time::Instant;

use crate::breaker::CircuitBreaker;
use crate::config::{CircuitBreakerConfig, TimeLimiterConfig};
use crate::error::TimeLimiterError;
use crate::time_limiter::TimeLimiter;

/// Status of the record substituted for a failed or refused submission.
pub const SUBMISSION_FALLBACK_STATUS: &str = "Failed to process payment. Please try again later";

/// Status of the record substituted for a lookup that did not complete.
pub const LOOKUP_FALLBACK_STATUS: &str =
    "Unable to locate the payment information for the order Id. Please try again later";

/// Default breaker name.
pub const PAYMENT_BREAKER_NAME: &str = "payment-service";

/// Why a fallback record was returned.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// The breaker refused the call; the service was not invoked.
    CircuitOpen,
    /// The service failed while submitting.
    SubmissionFailed(String),
    /// The lookup did not complete within the bound.
    LookupTimedOut(Duration),
    /// The lookup failed before the bound.
    LookupFailed(String),
}

impl FallbackReason {
    /// Short machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            FallbackReason::CircuitOpen => "circuit_open",
            FallbackReason::SubmissionFailed(_) => "submission_failed",
            FallbackReason::LookupTimedOut(_) => "lookup_timeout",
            FallbackReason::LookupFailed(_) => "lookup_failed",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::CircuitOpen => write!(f, "circuit breaker is open"),
            FallbackReason::SubmissionFailed(e) => write!(f, "submission failed: {e}"),
            FallbackReason::LookupTimedOut(d) => write!(f, "lookup timed out after {d:?}"),
            FallbackReason::LookupFailed(e) => write!(f, "lookup failed: {e}"),
        }
    }
}

/// Result of a gateway call: the real record, or a substitute.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome {
    Completed(Payment),
    Fallback {
        payment: Payment,
        reason: FallbackReason,
    },
}

impl GatewayOutcome {
    fn submission_fallback(reason: FallbackReason) -> Self {
        GatewayOutcome::Fallback {
            payment: Payment::substitute(SUBMISSION_FALLBACK_STATUS),
            reason,
        }
    }

    fn lookup_fallback(reason: FallbackReason) -> Self {
        GatewayOutcome::Fallback {
            payment: Payment::substitute(LOOKUP_FALLBACK_STATUS),
            reason,
        }
    }

    pub fn payment(&self) -> &Payment {
        match self {
            GatewayOutcome::Completed(payment) => payment,
            GatewayOutcome::Fallback { payment, .. } => payment,
        }
    }

    pub fn into_payment(self) -> Payment {
        match self {
            GatewayOutcome::Completed(payment) => payment,
            GatewayOutcome::Fallback { payment, .. } => payment,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, GatewayOutcome::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            GatewayOutcome::Completed(_) => None,
            GatewayOutcome::Fallback { reason, .. } => Some(reason),
        }
    }
}

/// Wraps a [`PaymentService`] with a circuit breaker on submission and a
/// time limiter on lookup.
///
/// Downstream faults never reach the caller: they come back as
/// [`GatewayOutcome::Fallback`]. Only rejected requests and missing
/// payments surface as [`PaymentError`].
pub struct ResilientPaymentGateway<S: PaymentStore, R: OutcomeResolver = RandomOutcomeResolver> {
    service: Arc<PaymentService<S, R>>,
    breaker: Arc<CircuitBreaker>,
    time_limiter: TimeLimiter,
}

impl<S, R> ResilientPaymentGateway<S, R>
where
    S: PaymentStore + 'static,
    R: OutcomeResolver + 'static,
{
    pub fn new(
        service: PaymentService<S, R>,
        breaker_config: CircuitBreakerConfig,
        time_limiter_config: TimeLimiterConfig,
    ) -> Self {
        Self::with_breaker(
            service,
            Arc::new(CircuitBreaker::new(PAYMENT_BREAKER_NAME, breaker_config)),
            TimeLimiter::new(time_limiter_config),
        )
    }

    /// Builds a gateway around an existing breaker, e.g. one shared with
    /// a health endpoint.
    pub fn with_breaker(
        service: PaymentService<S, R>,
        breaker: Arc<CircuitBreaker>,
        time_limiter: TimeLimiter,
    ) -> Self {
        Self {
            service: Arc::new(service),
            breaker,
            time_limiter,
        }
    }

    pub fn service(&self) -> &PaymentService<S, R> {
        &self.service
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Submits a payment through the breaker.
    ///
    /// Runs on the caller's task. Returns the submission fallback when the
    /// breaker is open or the service fails; a rejected request is
    /// returned as an error and does not count against the breaker.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn submit(&self, request: PaymentRequest) -> Result<GatewayOutcome, PaymentError> {
        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(not_permitted) => {
                tracing::warn!(error = %not_permitted, "submission short-circuited");
                return Ok(submission_fallback(FallbackReason::CircuitOpen));
            }
        };

        match self.service.submit(request).await {
            Ok(payment) => {
                self.breaker.record_success(permit);
                Ok(GatewayOutcome::Completed(payment))
            }
            Err(err) if err.is_domain_fault() => {
                self.breaker.release(permit);
                Err(err)
            }
            Err(err) => {
                self.breaker.record_failure(permit);
                tracing::warn!(error = %err, "submission failed");
                Ok(submission_fallback(FallbackReason::SubmissionFailed(
                    err.to_string(),
                )))
            }
        }
    }

    /// Starts a lookup and returns immediately.
    ///
    /// The store read runs on its own task; the returned handle resolves
    /// when the read finishes or the time limit expires, whichever is
    /// first. On timeout the read is abandoned and the lookup fallback is
    /// returned.
    pub fn lookup(&self, order_id: OrderId) -> PendingLookup {
        let service = Arc::clone(&self.service);
        let started = Instant::now();
        let limited = self
            .time_limiter
            .spawn(async move { service.lookup(order_id).await });

        let resolve = async move {
            let outcome = match limited.await {
                Ok(Ok(payment)) => Ok(GatewayOutcome::Completed(payment)),
                Ok(Err(PaymentError::NotFound(order_id))) => Err(PaymentError::NotFound(order_id)),
                Ok(Err(err)) => {
                    tracing::warn!(%order_id, error = %err, "lookup failed");
                    Ok(lookup_fallback(FallbackReason::LookupFailed(err.to_string())))
                }
                Err(TimeLimiterError::Timeout(bound)) => {
                    tracing::warn!(%order_id, timeout = ?bound, "lookup timed out");
                    Ok(lookup_fallback(FallbackReason::LookupTimedOut(bound)))
                }
                Err(err @ TimeLimiterError::TaskFailed(_)) => {
                    tracing::error!(%order_id, error = %err, "lookup task failed");
                    Ok(lookup_fallback(FallbackReason::LookupFailed(err.to_string())))
                }
            };

            let result = match &outcome {
                Ok(GatewayOutcome::Completed(_)) => "found",
                Ok(GatewayOutcome::Fallback { .. }) => "fallback",
                Err(_) => "not_found",
            };
            metrics::counter!("payment_lookups_total", "result" => result).increment(1);
            metrics::histogram!("payment_lookup_duration_seconds")
                .record(started.elapsed().as_secs_f64());

            outcome
        };

        PendingLookup {
            order_id,
            resolve: Box::pin(resolve),
        }
    }
}

fn submission_fallback(reason: FallbackReason) -> GatewayOutcome {
    count_fallback("submit", &reason);
    GatewayOutcome::submission_fallback(reason)
}

fn lookup_fallback(reason: FallbackReason) -> GatewayOutcome {
    count_fallback("lookup", &reason);
    GatewayOutcome::lookup_fallback(reason)
}

fn count_fallback(operation: &'static str, reason: &FallbackReason) {
    metrics::counter!(
        "payment_fallbacks_total",
        "operation" => operation,
        "reason" => reason.code()
    )
    .increment(1);
}

/// Handle to a lookup in flight.
///
/// Dropping it abandons the lookup.
pub struct PendingLookup {
    order_id: OrderId,
    resolve: BoxFuture<'static, Result<GatewayOutcome, PaymentError>>,
}

impl PendingLookup {
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }
}

impl Future for PendingLookup {
    type Output = Result<GatewayOutcome, PaymentError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.resolve.as_mut().poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_records_have_zeroed_shape() {
        let outcome = GatewayOutcome::submission_fallback(FallbackReason::CircuitOpen);
        let payment = outcome.payment();

        assert!(outcome.is_fallback());
        assert_eq!(payment.id.as_i64(), 0);
        assert_eq!(payment.order_id.as_i64(), 0);
        assert_eq!(payment.amount, 0.0);
        assert!(payment.transaction_id.is_none());
        assert_eq!(payment.status, SUBMISSION_FALLBACK_STATUS);
    }

    #[test]
    fn lookup_fallback_uses_lookup_message() {
        let outcome =
            GatewayOutcome::lookup_fallback(FallbackReason::LookupTimedOut(Duration::from_secs(3)));
        assert_eq!(outcome.payment().status, LOOKUP_FALLBACK_STATUS);
        assert_eq!(outcome.fallback_reason().unwrap().code(), "lookup_timeout");
    }

    #[test]
    fn completed_outcome_is_not_fallback() {
        let outcome = GatewayOutcome::Completed(Payment::substitute("success"));
        assert!(!outcome.is_fallback());
        assert!(outcome.fallback_reason().is_none());
    }

    #[test]
    fn reason_codes() {
        assert_eq!(FallbackReason::CircuitOpen.code(), "circuit_open");
        assert_eq!(
            FallbackReason::SubmissionFailed("x".into()).code(),
            "submission_failed"
        );
        assert_eq!(FallbackReason::LookupFailed("x".into()).code(), "lookup_failed");
    }
}

//! Payment submission and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use common::OrderId;
use payment_service::{OutcomeResolver, PaymentRequest, RandomOutcomeResolver};
use payment_store::PaymentStore;
use resilience::{GatewayOutcome, ResilientPaymentGateway};

use crate::error::ApiError;

/// Response header naming the fallback reason when a substitute record
/// is returned.
pub const FALLBACK_HEADER: &str = "x-payment-fallback";

/// Shared application state accessible from all handlers.
pub struct AppState<S: PaymentStore, R: OutcomeResolver = RandomOutcomeResolver> {
    pub gateway: ResilientPaymentGateway<S, R>,
}

/// POST /payment/pay — record a payment through the circuit breaker.
///
/// Always 200 unless the request itself is rejected; an open breaker or a
/// store fault yields the submission fallback record.
#[tracing::instrument(skip(state, payload))]
pub async fn pay<S, R>(
    State(state): State<Arc<AppState<S, R>>>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<Response, ApiError>
where
    S: PaymentStore + 'static,
    R: OutcomeResolver + 'static,
{
    let Json(request) = payload?;
    let outcome = state.gateway.submit(request).await?;
    Ok(outcome_response(outcome))
}

/// GET /payment/{orderId} — fetch the latest payment for an order.
///
/// A lookup that does not finish within the time limit yields the lookup
/// fallback record; an order with no payment is a 404.
#[tracing::instrument(skip(state, order_id), fields(order_id = tracing::field::Empty))]
pub async fn find_by_order_id<S, R>(
    State(state): State<Arc<AppState<S, R>>>,
    order_id: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError>
where
    S: PaymentStore + 'static,
    R: OutcomeResolver + 'static,
{
    let Path(order_id) = order_id?;
    tracing::Span::current().record("order_id", order_id);
    let outcome = state.gateway.lookup(OrderId::new(order_id)).await?;
    Ok(outcome_response(outcome))
}

fn outcome_response(outcome: GatewayOutcome) -> Response {
    match outcome {
        GatewayOutcome::Completed(payment) => Json(payment).into_response(),
        GatewayOutcome::Fallback { payment, reason } => {
            tracing::info!(reason = %reason, "returning fallback record");
            ([(FALLBACK_HEADER, reason.code())], Json(payment)).into_response()
        }
    }
}

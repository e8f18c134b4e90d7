//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use payment_service::OutcomeResolver;
use payment_store::PaymentStore;
use serde::Serialize;

use crate::routes::payments::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub circuit_breaker: BreakerHealth,
}

#[derive(Serialize)]
pub struct BreakerHealth {
    pub name: String,
    pub state: &'static str,
    pub failure_rate: Option<f32>,
    pub buffered_calls: usize,
    pub failed_calls: usize,
    pub not_permitted_calls: u64,
}

/// GET /health — returns service status and the payment breaker's state.
///
/// The service reports `ok` even with an open breaker, since it keeps
/// answering with fallback records.
pub async fn check<S, R>(State(state): State<Arc<AppState<S, R>>>) -> Json<HealthResponse>
where
    S: PaymentStore + 'static,
    R: OutcomeResolver + 'static,
{
    let breaker = state.gateway.breaker();
    let metrics = breaker.metrics();

    Json(HealthResponse {
        status: "ok",
        circuit_breaker: BreakerHealth {
            name: breaker.name().to_string(),
            state: metrics.state.as_str(),
            failure_rate: metrics.failure_rate,
            buffered_calls: metrics.buffered_calls,
            failed_calls: metrics.failed_calls,
            not_permitted_calls: metrics.not_permitted_calls,
        },
    })
}

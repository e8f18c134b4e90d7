//! HTTP API server with observability for the payment service.
//!
//! Provides REST endpoints for recording and looking up payments behind a
//! circuit breaker and a lookup time limit, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use payment_service::{OutcomeResolver, PaymentService};
use payment_store::PaymentStore;
use resilience::ResilientPaymentGateway;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::payments::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, R>(state: Arc<AppState<S, R>>, metrics_handle: PrometheusHandle) -> Router
where
    S: PaymentStore + 'static,
    R: OutcomeResolver + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S, R>))
        .route("/payment/pay", post(routes::payments::pay::<S, R>))
        .route(
            "/payment/{order_id}",
            get(routes::payments::find_by_order_id::<S, R>),
        )
        .with_state(state)
        .merge(metrics_router)
        .fallback(routes::fallback::not_found)
        .method_not_allowed_fallback(routes::fallback::method_not_allowed)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state around a payment service, using the breaker
/// and lookup settings from `config`.
pub fn create_state<S, R>(service: PaymentService<S, R>, config: &Config) -> Arc<AppState<S, R>>
where
    S: PaymentStore + 'static,
    R: OutcomeResolver + 'static,
{
    let gateway =
        ResilientPaymentGateway::new(service, config.breaker.clone(), config.lookup.clone());
    Arc::new(AppState { gateway })
}

/// Creates the default application state: random payment outcomes over
/// the given store.
pub fn create_default_state<S: PaymentStore + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    create_state(PaymentService::new(store), config)
}

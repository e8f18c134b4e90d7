//! Router fallbacks for unmatched requests.

use axum::http::{Method, Uri};

use crate::error::ApiError;

/// Any request whose path matches no route.
pub async fn not_found(method: Method, uri: Uri) -> ApiError {
    tracing::debug!(%method, %uri, "no route matched");
    ApiError::RouteNotFound
}

/// A known path requested with a method it does not support.
pub async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    tracing::debug!(%method, %uri, "method not allowed");
    ApiError::MethodNotAllowed
}

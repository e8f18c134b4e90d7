//! Payment service error types.

use common::OrderId;
use payment_store::StoreError;
use thiserror::Error;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The request violates a payment rule and was not processed.
    #[error("Payment rejected: {0}")]
    Rejected(String),

    /// No payment has been recorded for the order.
    #[error("No payment found for order {0}")]
    NotFound(OrderId),

    /// The payment store failed.
    #[error("Payment store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl PaymentError {
    /// Returns true for business-rule violations, as opposed to faults of
    /// the downstream store.
    pub fn is_domain_fault(&self) -> bool {
        matches!(self, PaymentError::Rejected(_))
    }
}

/// Convenience type alias for payment results.
pub type Result<T> = std::result::Result<T, PaymentError>;

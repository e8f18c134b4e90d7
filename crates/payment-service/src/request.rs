use common::OrderId;
use serde::Deserialize;

use crate::error::{PaymentError, Result};

/// A payment submission as sent by a caller.
///
/// The body has the payment shape; `id`, `status` and `transactionId` are
/// assigned by the service and ignored on input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub amount: f64,
}

impl PaymentRequest {
    pub fn new(order_id: impl Into<OrderId>, amount: f64) -> Self {
        Self {
            order_id: order_id.into(),
            amount,
        }
    }

    /// Checks the request before any outcome is resolved.
    ///
    /// Order ids must be positive, so a stored payment can never look like
    /// a substituted record, and the amount must be a finite positive number.
    pub fn validate(&self) -> Result<()> {
        if self.order_id.as_i64() <= 0 {
            return Err(PaymentError::Rejected(format!(
                "order id must be positive, got {}",
                self.order_id
            )));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(PaymentError::Rejected(format!(
                "amount must be a positive number, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

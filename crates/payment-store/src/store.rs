use async_trait::async_trait;

use crate::{NewPayment, OrderId, Payment, Result};

/// Core trait for payment storage.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persists a payment and returns it with its store-assigned id.
    ///
    /// Assigned ids are positive and never reused.
    async fn save(&self, payment: NewPayment) -> Result<Payment>;

    /// Finds the payment recorded for an order.
    ///
    /// Order ids are not unique; when an order has several payments the
    /// most recently saved one (highest id) is returned.
    async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<Payment>>;
}

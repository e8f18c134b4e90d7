//! The payment record exchanged between the store, the service and the
//! HTTP boundary.

use serde::{Deserialize, Serialize};

use crate::types::{OrderId, PaymentId, TransactionId};

/// A payment as stored and as returned to callers.
///
/// The wire shape is `{id, status, transactionId, orderId, amount}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub status: String,
    pub transaction_id: Option<TransactionId>,
    pub order_id: OrderId,
    pub amount: f64,
}

impl Payment {
    /// Builds the zeroed record substituted for a real result.
    ///
    /// Carries only the given status message: no id, no transaction,
    /// order `0` and amount `0`.
    pub fn substitute(status: impl Into<String>) -> Self {
        Self {
            id: PaymentId::UNASSIGNED,
            status: status.into(),
            transaction_id: None,
            order_id: OrderId::default(),
            amount: 0.0,
        }
    }

    /// Returns true if this record was assigned an id by a store.
    pub fn is_persisted(&self) -> bool {
        self.id.is_assigned()
    }
}

/// A payment about to be saved; the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub status: String,
    pub transaction_id: TransactionId,
    pub order_id: OrderId,
    pub amount: f64,
}

impl NewPayment {
    /// Attaches a store-assigned id, producing the stored record.
    pub fn with_id(self, id: PaymentId) -> Payment {
        Payment {
            id,
            status: self.status,
            transaction_id: Some(self.transaction_id),
            order_id: self.order_id,
            amount: self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_has_zeroed_shape() {
        let payment = Payment::substitute("unavailable");
        assert_eq!(payment.id, PaymentId::UNASSIGNED);
        assert_eq!(payment.order_id, OrderId::new(0));
        assert_eq!(payment.amount, 0.0);
        assert!(payment.transaction_id.is_none());
        assert_eq!(payment.status, "unavailable");
        assert!(!payment.is_persisted());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let payment = Payment::substitute("unavailable");
        let json = serde_json::to_value(&payment).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 0,
                "status": "unavailable",
                "transactionId": null,
                "orderId": 0,
                "amount": 0.0
            })
        );
    }

    #[test]
    fn with_id_keeps_fields() {
        let transaction_id = TransactionId::new();
        let payment = NewPayment {
            status: "success".to_string(),
            transaction_id,
            order_id: OrderId::new(42),
            amount: 19.99,
        }
        .with_id(PaymentId::new(3));

        assert!(payment.is_persisted());
        assert_eq!(payment.transaction_id, Some(transaction_id));
        assert_eq!(payment.order_id, OrderId::new(42));
        assert_eq!(payment.amount, 19.99);
    }
}

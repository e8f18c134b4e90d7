//! Payment service providing submission and lookup over a payment store.

use common::{NewPayment, OrderId, Payment};
use payment_store::PaymentStore;

use crate::error::{PaymentError, Result};
use crate::request::PaymentRequest;
use crate::resolver::{OutcomeResolver, RandomOutcomeResolver};

/// Service for recording and looking up payments.
///
/// Dependencies are passed in explicitly; the service holds no state of its
/// own besides them.
pub struct PaymentService<S: PaymentStore, R: OutcomeResolver = RandomOutcomeResolver> {
    store: S,
    resolver: R,
}

impl<S: PaymentStore> PaymentService<S> {
    /// Creates a service that resolves outcomes at random.
    pub fn new(store: S) -> Self {
        Self::with_resolver(store, RandomOutcomeResolver::new())
    }
}

impl<S: PaymentStore, R: OutcomeResolver> PaymentService<S, R> {
    /// Creates a service with the given outcome resolver.
    pub fn with_resolver(store: S, resolver: R) -> Self {
        Self { store, resolver }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Processes and records a payment.
    ///
    /// Performs exactly one store write. Fails with
    /// [`PaymentError::Rejected`] before touching the store if the request is
    /// invalid, and with [`PaymentError::StoreUnavailable`] if the write fails.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn submit(&self, request: PaymentRequest) -> Result<Payment> {
        request.validate()?;

        let status = self.resolver.resolve();
        let payment = NewPayment {
            status: status.to_string(),
            transaction_id: self.resolver.transaction_token(),
            order_id: request.order_id,
            amount: request.amount,
        };

        let stored = self.store.save(payment).await?;

        metrics::counter!("payments_submitted_total", "status" => status.as_str()).increment(1);
        tracing::info!(
            payment_id = %stored.id,
            %status,
            "payment recorded"
        );

        Ok(stored)
    }

    /// Looks up the payment recorded for an order.
    #[tracing::instrument(skip(self))]
    pub async fn lookup(&self, order_id: OrderId) -> Result<Payment> {
        self.store
            .find_by_order_id(order_id)
            .await?
            .ok_or(PaymentError::NotFound(order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::FixedOutcomeResolver;
    use payment_store::InMemoryPaymentStore;

    fn service(
        resolver: FixedOutcomeResolver,
    ) -> (
        PaymentService<InMemoryPaymentStore, FixedOutcomeResolver>,
        InMemoryPaymentStore,
    ) {
        let store = InMemoryPaymentStore::new();
        (PaymentService::with_resolver(store.clone(), resolver), store)
    }

    #[tokio::test]
    async fn submit_stamps_status_and_token() {
        let (service, store) = service(FixedOutcomeResolver::success());

        let payment = service
            .submit(PaymentRequest::new(42, 19.99))
            .await
            .unwrap();

        assert!(payment.is_persisted());
        assert_eq!(payment.status, "success");
        assert_eq!(payment.order_id, OrderId::new(42));
        assert_eq!(payment.amount, 19.99);
        assert_eq!(payment.transaction_id.unwrap().to_string().len(), 36);
        assert_eq!(store.payment_count().await, 1);
    }

    #[tokio::test]
    async fn submit_records_failed_outcome() {
        let (service, _) = service(FixedOutcomeResolver::failure());

        let payment = service.submit(PaymentRequest::new(1, 5.0)).await.unwrap();
        assert_eq!(payment.status, "failure");
        assert!(payment.transaction_id.is_some());
    }

    #[tokio::test]
    async fn random_service_yields_known_status() {
        let store = InMemoryPaymentStore::new();
        let service = PaymentService::new(store);

        let payment = service.submit(PaymentRequest::new(3, 1.5)).await.unwrap();
        assert!(payment.status == "success" || payment.status == "failure");
    }

    #[tokio::test]
    async fn submit_surfaces_store_failure() {
        let (service, store) = service(FixedOutcomeResolver::success());
        store.set_fail_on_save(true).await;

        let err = service
            .submit(PaymentRequest::new(1, 5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::StoreUnavailable(_)));
        assert!(!err.is_domain_fault());
    }

    #[tokio::test]
    async fn submit_rejects_invalid_request_without_writing() {
        let (service, store) = service(FixedOutcomeResolver::success());

        let err = service
            .submit(PaymentRequest::new(1, -5.0))
            .await
            .unwrap_err();
        assert!(err.is_domain_fault());
        assert_eq!(store.save_calls().await, 0);
    }

    #[tokio::test]
    async fn lookup_returns_stored_record() {
        let (service, _) = service(FixedOutcomeResolver::success());
        let saved = service.submit(PaymentRequest::new(8, 2.0)).await.unwrap();

        let found = service.lookup(OrderId::new(8)).await.unwrap();
        assert_eq!(found, saved);
    }

    #[tokio::test]
    async fn lookup_missing_order_is_not_found() {
        let (service, _) = service(FixedOutcomeResolver::success());

        let err = service.lookup(OrderId::new(7)).await.unwrap_err();
        assert!(matches!(err, PaymentError::NotFound(id) if id == OrderId::new(7)));
    }
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{NewPayment, OrderId, Payment, PaymentId, Result, StoreError, store::PaymentStore};

#[derive(Debug, Default)]
struct InMemoryState {
    payments: Vec<Payment>,
    last_id: i64,
    save_calls: usize,
    fail_on_save: bool,
    fail_on_read: bool,
    read_delay: Option<Duration>,
}

/// In-memory payment store for tests and local runs.
///
/// Besides the [`PaymentStore`] contract it supports fault and latency
/// injection, so callers can exercise degraded-mode behavior.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryPaymentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save` fail with [`StoreError::Unavailable`].
    pub async fn set_fail_on_save(&self, fail: bool) {
        self.state.write().await.fail_on_save = fail;
    }

    /// Makes every subsequent `find_by_order_id` fail with [`StoreError::Unavailable`].
    pub async fn set_fail_on_read(&self, fail: bool) {
        self.state.write().await.fail_on_read = fail;
    }

    /// Delays every subsequent read by `delay`.
    pub async fn set_read_delay(&self, delay: Option<Duration>) {
        self.state.write().await.read_delay = delay;
    }

    /// Returns the number of stored payments.
    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }

    /// Returns the number of `save` calls received, failed ones included.
    pub async fn save_calls(&self) -> usize {
        self.state.read().await.save_calls
    }

    /// Clears all payments. Ids keep increasing.
    pub async fn clear(&self) {
        self.state.write().await.payments.clear();
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn save(&self, payment: NewPayment) -> Result<Payment> {
        let mut state = self.state.write().await;
        state.save_calls += 1;

        if state.fail_on_save {
            return Err(StoreError::Unavailable("save rejected".to_string()));
        }

        state.last_id += 1;
        let stored = payment.with_id(PaymentId::new(state.last_id));
        state.payments.push(stored.clone());

        tracing::debug!(payment_id = %stored.id, order_id = %stored.order_id, "payment saved");
        Ok(stored)
    }

    async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let (delay, fail) = {
            let state = self.state.read().await;
            (state.read_delay, state.fail_on_read)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fail {
            return Err(StoreError::Unavailable("read rejected".to_string()));
        }

        let state = self.state.read().await;
        Ok(state
            .payments
            .iter()
            .rev()
            .find(|p| p.order_id == order_id)
            .cloned())
    }
}

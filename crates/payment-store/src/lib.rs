//! Durable storage for payment records.
//!
//! The [`PaymentStore`] trait is the only seam the payment service depends
//! on; [`InMemoryPaymentStore`] backs tests and local runs, and
//! [`PostgresPaymentStore`] backs deployments.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::{NewPayment, OrderId, Payment, PaymentId, TransactionId};
pub use error::{Result, StoreError};
pub use memory::InMemoryPaymentStore;
pub use postgres::PostgresPaymentStore;
pub use store::PaymentStore;

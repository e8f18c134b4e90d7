//! Shared types for the payment service workspace.

pub mod payment;
pub mod types;

pub use payment::{NewPayment, Payment};
pub use types::{OrderId, PaymentId, TransactionId};

//! Payment gateway service.
//!
//! Submitting a payment resolves its outcome through an
//! [`OutcomeResolver`], stamps a transaction token and saves it through a
//! [`PaymentStore`](payment_store::PaymentStore). Lookups go straight to the
//! store.

pub mod error;
pub mod request;
pub mod resolver;
pub mod service;

pub use error::{PaymentError, Result};
pub use request::PaymentRequest;
pub use resolver::{FixedOutcomeResolver, OutcomeResolver, PaymentStatus, RandomOutcomeResolver};
pub use service::PaymentService;

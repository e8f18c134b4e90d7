//! Payment outcome resolution.
//!
//! Stands in for the call to an external payment processor: decides
//! whether a payment succeeded and issues the transaction token.

use common::TransactionId;

/// Outcome of processing a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    Success,
    Failure,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Success => "success",
            PaymentStatus::Failure => "failure",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides payment outcomes and issues transaction tokens.
///
/// Implementations never fail and must not be assumed deterministic.
pub trait OutcomeResolver: Send + Sync {
    /// Resolves the outcome of a new payment.
    fn resolve(&self) -> PaymentStatus;

    /// Issues a fresh, unique transaction token.
    fn transaction_token(&self) -> TransactionId {
        TransactionId::new()
    }
}

/// Resolves outcomes with a fair coin flip.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomOutcomeResolver;

impl RandomOutcomeResolver {
    pub fn new() -> Self {
        Self
    }
}

impl OutcomeResolver for RandomOutcomeResolver {
    fn resolve(&self) -> PaymentStatus {
        if rand::random::<bool>() {
            PaymentStatus::Success
        } else {
            PaymentStatus::Failure
        }
    }
}

/// Always resolves to the same outcome. Tokens are still unique.
#[derive(Debug, Clone, Copy)]
pub struct FixedOutcomeResolver {
    status: PaymentStatus,
}

impl FixedOutcomeResolver {
    pub fn new(status: PaymentStatus) -> Self {
        Self { status }
    }

    pub fn success() -> Self {
        Self::new(PaymentStatus::Success)
    }

    pub fn failure() -> Self {
        Self::new(PaymentStatus::Failure)
    }
}

impl OutcomeResolver for FixedOutcomeResolver {
    fn resolve(&self) -> PaymentStatus {
        self.status
    }
}

//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::delivery::DeliveryError;
use crate::loyalty::LoyaltyError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Loyalty error: {0}")]
    Loyalty(#[from] LoyaltyError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("{aggregate_type} not found: {aggregate_id}")]
    NotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Caller-facing classification of a [`DomainError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    UnavailableItems,
    InsufficientPoints,
    IllegalTransition,
    ConcurrencyConflict,
    /// Storage or serialization fault.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::UnavailableItems => "unavailable_items",
            ErrorKind::InsufficientPoints => "insufficient_points",
            ErrorKind::IllegalTransition => "illegal_transition",
            ErrorKind::ConcurrencyConflict => "concurrency_conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DomainError {
    pub fn not_found(aggregate_type: &'static str, aggregate_id: impl ToString) -> Self {
        DomainError::NotFound {
            aggregate_type,
            aggregate_id: aggregate_id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::EventStore(e) if e.is_conflict() => ErrorKind::ConcurrencyConflict,
            DomainError::EventStore(_) | DomainError::Serialization(_) => ErrorKind::Internal,
            DomainError::Cart(e) => e.kind(),
            DomainError::Loyalty(e) => e.kind(),
            DomainError::Order(e) => e.kind(),
            DomainError::Delivery(e) => e.kind(),
            DomainError::NotFound { .. } => ErrorKind::NotFound,
        }
    }

    /// True when reloading the aggregate and retrying may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ConcurrencyConflict
    }
}

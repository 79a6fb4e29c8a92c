//! Fulfillment error types.

use domain::{DomainError, ErrorKind};
use thiserror::Error;

/// Errors that can occur while coordinating aggregates.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// A checkout step failed after earlier steps had been committed; they
    /// were compensated.
    #[error("Checkout step '{step}' failed: {source}")]
    StepFailed {
        step: &'static str,
        #[source]
        source: DomainError,
    },

    /// Undoing a committed step failed; the aggregates need manual repair.
    #[error("Compensation step '{step}' failed: {reason}")]
    CompensationFailed { step: &'static str, reason: String },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl FulfillmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FulfillmentError::StepFailed { source, .. } => source.kind(),
            FulfillmentError::CompensationFailed { .. } => ErrorKind::Internal,
            FulfillmentError::Domain(e) => e.kind(),
        }
    }
}

impl From<domain::OrderError> for FulfillmentError {
    fn from(e: domain::OrderError) -> Self {
        FulfillmentError::Domain(e.into())
    }
}

impl From<domain::LoyaltyError> for FulfillmentError {
    fn from(e: domain::LoyaltyError) -> Self {
        FulfillmentError::Domain(e.into())
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use domain::LoyaltyError;

    #[test]
    fn step_failures_keep_the_cause_kind() {
        let err = FulfillmentError::StepFailed {
            step: crate::checkout::STEP_REDEEM_POINTS,
            source: LoyaltyError::InsufficientPoints {
                requested: 100,
                available: 40,
            }
            .into(),
        };
        assert_eq!(err.kind(), ErrorKind::InsufficientPoints);
        assert!(err.to_string().contains("redeem_points"));
    }

    #[test]
    fn failed_compensation_is_internal() {
        let err = FulfillmentError::CompensationFailed {
            step: crate::checkout::STEP_PLACE_ORDER,
            reason: "store offline".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}

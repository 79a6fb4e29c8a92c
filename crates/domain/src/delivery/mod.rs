//! Delivery tracker: courier assignment, geolocation and delivery status.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;

pub use aggregate::{Delivery, DeliveryStatusEntry};
pub use commands::*;
pub use events::{
    DeliveryCancelledData, DeliveryCompletedData, DeliveryCreatedData, DeliveryEvent,
    DeliveryFailedData, DeliveryStatusChangedData, DriverAssignedData, LocationUpdatedData,
};
pub use service::DeliveryService;
pub use state::DeliveryStatus;

use common::{Role, UserId};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::location::LocationError;

/// Errors that can occur during delivery operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeliveryError {
    #[error("Delivery already created")]
    AlreadyCreated,

    #[error("Invalid delivery transition from {from} to {to}")]
    IllegalTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("User {user_id} is not a driver")]
    NotADriver { user_id: UserId },

    #[error("Only the assigned driver may update this delivery")]
    NotAssignedDriver,

    #[error("Role {role} may not {action}")]
    NotPermitted { role: Role, action: &'static str },

    #[error("A reason is required")]
    ReasonRequired,

    #[error("Invalid location: {0}")]
    Location(#[from] LocationError),
}

impl DeliveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeliveryError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            DeliveryError::AlreadyCreated
            | DeliveryError::NotADriver { .. }
            | DeliveryError::NotAssignedDriver
            | DeliveryError::NotPermitted { .. }
            | DeliveryError::ReasonRequired
            | DeliveryError::Location(_) => ErrorKind::Validation,
        }
    }
}

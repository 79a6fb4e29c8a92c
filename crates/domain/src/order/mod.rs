//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod number;
mod policy;
mod service;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use commands::*;
pub use events::{
    AdjustmentAppliedData, DeliveryLinkedData, OrderEvent, OrderPlacedData,
    PaymentStatusChangedData, StatusChangedData,
};
pub use number::OrderNumber;
pub use policy::TransitionPolicy;
pub use service::OrderService;
pub use state::OrderStatus;
pub use value_objects::{
    LoyaltyPoints, OrderLine, OrderPayment, OrderPricing, PaymentStatus, StatusEntry,
    final_amount,
};

use common::{AggregateId, Role};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("Order already created")]
    AlreadyCreated,

    #[error("Cannot check out an empty cart")]
    EmptyCart,

    #[error("Delivery orders need a delivery address")]
    AddressRequired,

    /// Products that are out of their sale window, out of stock or gone.
    #[error("Unavailable items: {}", products.join(", "))]
    UnavailableItems { products: Vec<String> },

    #[error("Illegal transition from {from} to {to} for role {role}")]
    IllegalTransition {
        from: OrderStatus,
        to: OrderStatus,
        role: Role,
    },

    /// Amounts only change while the order is pending.
    #[error("Order is {status}; its amounts can no longer change")]
    Frozen { status: OrderStatus },

    #[error("Role {role} may not {action}")]
    NotPermitted { role: Role, action: &'static str },

    #[error("Adjustment must be a positive amount")]
    InvalidAdjustment,

    #[error("Payment was refunded and cannot change again")]
    PaymentRefunded,

    #[error("Order is not a delivery order")]
    NotADeliveryOrder,

    #[error("Order already has delivery {delivery_id}")]
    DeliveryAlreadyLinked { delivery_id: AggregateId },
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::UnavailableItems { .. } => ErrorKind::UnavailableItems,
            OrderError::IllegalTransition { .. }
            | OrderError::Frozen { .. }
            | OrderError::PaymentRefunded => ErrorKind::IllegalTransition,
            OrderError::AlreadyCreated
            | OrderError::EmptyCart
            | OrderError::AddressRequired
            | OrderError::NotPermitted { .. }
            | OrderError::InvalidAdjustment
            | OrderError::NotADeliveryOrder
            | OrderError::DeliveryAlreadyLinked { .. } => ErrorKind::Validation,
        }
    }
}

//! Order state machine.

use serde::{Deserialize, Serialize};

use crate::cart::DeliveryType;

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Confirmed ──► Preparing ──► Ready ──┬──► OutForDelivery ──┬──► Delivered
///                                                 │   (delivery)        └──► Failed
///                                                 ├──► Delivered (pickup / dine-in)
///                                                 └──► Failed (delivery)
///
/// any non-terminal ──► Cancelled | Refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    /// Ready for collection, or waiting for a courier.
    Ready,
    OutForDelivery,
    Delivered,
    Cancelled,
    Refunded,
    Failed,
}

impl OrderStatus {
    /// Returns true if this is a terminal state (no regular transition leaves it).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered
                | OrderStatus::Cancelled
                | OrderStatus::Refunded
                | OrderStatus::Failed
        )
    }

    /// The regular transition table, before any role restriction.
    pub fn can_transition_to(&self, to: OrderStatus, delivery_type: DeliveryType) -> bool {
        use OrderStatus::*;

        let delivery = delivery_type == DeliveryType::Delivery;
        match (self, to) {
            (from, Cancelled | Refunded) => !from.is_terminal(),
            (Pending, Confirmed) | (Confirmed, Preparing) | (Preparing, Ready) => true,
            (Ready, OutForDelivery) | (Ready, Failed) => delivery,
            (Ready, Delivered) => !delivery,
            (OutForDelivery, Delivered) | (OutForDelivery, Failed) => true,
            _ => false,
        }
    }

    /// History note used when a transition carries none.
    pub fn default_note(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Order placed",
            OrderStatus::Confirmed => "Order confirmed",
            OrderStatus::Preparing => "Order is being prepared",
            OrderStatus::Ready => "Order is ready",
            OrderStatus::OutForDelivery => "Order is out for delivery",
            OrderStatus::Delivered => "Order delivered",
            OrderStatus::Cancelled => "Order cancelled",
            OrderStatus::Refunded => "Order refunded",
            OrderStatus::Failed => "Order failed",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Failed => "failed",
        }
    }

    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
        OrderStatus::Failed,
    ];
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

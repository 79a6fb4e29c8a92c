//! Delivery state machine.

use serde::{Deserialize, Serialize};

/// The status of a delivery.
///
/// ```text
/// Pending ──► Assigned ──► PickedUp ──► InTransit ──► Delivered
///             Assigned ──► Assigned   (reassignment)
///             Assigned ──► InTransit  (first location update)
///             PickedUp ──► Delivered
///
/// any non-terminal ──► Failed | Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Assigned,
    PickedUp,
    #[serde(alias = "out_for_delivery")]
    InTransit,
    Delivered,
    Failed,
    Cancelled,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Delivered | DeliveryStatus::Failed | DeliveryStatus::Cancelled
        )
    }

    /// True while a courier is responsible for the parcel.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Assigned | DeliveryStatus::PickedUp | DeliveryStatus::InTransit
        )
    }

    pub fn can_transition_to(&self, to: DeliveryStatus) -> bool {
        use DeliveryStatus::*;

        match (self, to) {
            (from, Failed | Cancelled) => !from.is_terminal(),
            (Pending | Assigned, Assigned) => true,
            (Assigned, PickedUp) | (Assigned, InTransit) | (PickedUp, InTransit) => true,
            (PickedUp | InTransit, Delivered) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::PickedUp => "picked_up",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Delivery events.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::location::{Address, LocationFix};

use super::DeliveryStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DeliveryEvent {
    DeliveryCreated(DeliveryCreatedData),
    DriverAssigned(DriverAssignedData),
    LocationUpdated(LocationUpdatedData),
    StatusChanged(DeliveryStatusChangedData),
    DeliveryCompleted(DeliveryCompletedData),
    DeliveryFailed(DeliveryFailedData),
    DeliveryCancelled(DeliveryCancelledData),
}

impl DomainEvent for DeliveryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DeliveryEvent::DeliveryCreated(_) => "DeliveryCreated",
            DeliveryEvent::DriverAssigned(_) => "DriverAssigned",
            DeliveryEvent::LocationUpdated(_) => "LocationUpdated",
            DeliveryEvent::StatusChanged(_) => "DeliveryStatusChanged",
            DeliveryEvent::DeliveryCompleted(_) => "DeliveryCompleted",
            DeliveryEvent::DeliveryFailed(_) => "DeliveryFailed",
            DeliveryEvent::DeliveryCancelled(_) => "DeliveryCancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryCreatedData {
    pub delivery_id: AggregateId,
    pub order_id: AggregateId,
    pub customer_id: UserId,
    pub destination: Address,
    /// Kilometers from the bakery; unknown without destination coordinates.
    pub distance_km: Option<f64>,
    pub estimated_duration_secs: Option<i64>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverAssignedData {
    pub driver_id: UserId,
    pub previous_driver: Option<UserId>,
    pub actor: Actor,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationUpdatedData {
    pub fix: LocationFix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatusChangedData {
    pub from: DeliveryStatus,
    pub to: DeliveryStatus,
    pub note: String,
    pub actor: Actor,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryCompletedData {
    pub notes: Option<String>,
    pub actor: Actor,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryFailedData {
    pub reason: String,
    pub actor: Actor,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryCancelledData {
    pub reason: String,
    pub actor: Actor,
    pub cancelled_at: DateTime<Utc>,
}

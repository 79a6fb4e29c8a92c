//! Order domain events.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::cart::DeliveryPreference;
use crate::money::Money;

use super::{LoyaltyPoints, OrderLine, OrderNumber, OrderPayment, OrderStatus, PaymentStatus};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// A cart was checked out.
    OrderPlaced(OrderPlacedData),

    StatusChanged(StatusChangedData),

    PaymentStatusChanged(PaymentStatusChangedData),

    /// Staff took an extra amount off a pending order.
    AdjustmentApplied(AdjustmentAppliedData),

    /// The delivery carrying this order was created.
    DeliveryLinked(DeliveryLinkedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::StatusChanged(_) => "StatusChanged",
            OrderEvent::PaymentStatusChanged(_) => "PaymentStatusChanged",
            OrderEvent::AdjustmentApplied(_) => "AdjustmentApplied",
            OrderEvent::DeliveryLinked(_) => "DeliveryLinked",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub delivery: DeliveryPreference,
    pub payment: OrderPayment,
    pub loyalty_points: LoyaltyPoints,
    pub actor: Actor,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub note: String,
    pub actor: Actor,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusChangedData {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentAppliedData {
    pub discount: Money,
    pub reason: String,
    pub actor: Actor,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLinkedData {
    pub delivery_id: AggregateId,
    pub linked_at: DateTime<Utc>,
}

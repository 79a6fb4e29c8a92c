//! Order commands.

use common::{Actor, AggregateId, UserId};

use crate::cart::{DeliveryPreference, PaymentMethod};
use crate::command::Command;
use crate::money::Money;

use super::{Order, OrderLine, OrderNumber, OrderPricing, OrderStatus, PaymentStatus};

/// A fully priced checkout, ready to be recorded.
///
/// Built by [`super::OrderService::create_from_cart`] after the catalog
/// check; the aggregate only validates its shape.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: AggregateId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub delivery: DeliveryPreference,
    pub payment_method: PaymentMethod,
    pub loyalty_points_used: u64,
    pub pricing: OrderPricing,
}

impl Command for PlaceOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

#[derive(Debug, Clone)]
pub struct UpdateOrderStatus {
    pub order_id: AggregateId,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub actor: Actor,
}

impl UpdateOrderStatus {
    pub fn new(order_id: AggregateId, status: OrderStatus, actor: Actor) -> Self {
        Self {
            order_id,
            status,
            note: None,
            actor,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

impl Command for UpdateOrderStatus {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

#[derive(Debug, Clone)]
pub struct UpdatePaymentStatus {
    pub order_id: AggregateId,
    pub status: PaymentStatus,
}

impl UpdatePaymentStatus {
    pub fn new(order_id: AggregateId, status: PaymentStatus) -> Self {
        Self { order_id, status }
    }
}

impl Command for UpdatePaymentStatus {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Extra discount granted by staff before the order is confirmed.
#[derive(Debug, Clone)]
pub struct ApplyAdjustment {
    pub order_id: AggregateId,
    pub discount: Money,
    pub reason: String,
    pub actor: Actor,
}

impl ApplyAdjustment {
    pub fn new(
        order_id: AggregateId,
        discount: Money,
        reason: impl Into<String>,
        actor: Actor,
    ) -> Self {
        Self {
            order_id,
            discount,
            reason: reason.into(),
            actor,
        }
    }
}

impl Command for ApplyAdjustment {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

#[derive(Debug, Clone)]
pub struct LinkDelivery {
    pub order_id: AggregateId,
    pub delivery_id: AggregateId,
}

impl LinkDelivery {
    pub fn new(order_id: AggregateId, delivery_id: AggregateId) -> Self {
        Self {
            order_id,
            delivery_id,
        }
    }
}

impl Command for LinkDelivery {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

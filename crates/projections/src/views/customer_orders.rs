//! Customer orders read model: each customer's orders with status and totals.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::order::{OrderNumber, OrderPricing, PaymentStatus};
use domain::{Money, OrderEvent, OrderStatus};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// One order as a customer sees it in their history.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerOrder {
    pub order_id: AggregateId,
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub item_count: u32,
    pub pricing: OrderPricing,
    pub points_used: u64,
    pub delivery_id: Option<AggregateId>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerOrder {
    pub fn final_amount(&self) -> Money {
        self.pricing.final_amount
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Per-customer order statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerOrdersSummary {
    pub customer_id: UserId,
    pub total_orders: u64,
    pub active_orders: u64,
    pub delivered_orders: u64,
    pub cancelled_orders: u64,
    /// Sum of final amounts of delivered orders, less refunds.
    pub total_spent: Money,
}

impl CustomerOrdersSummary {
    fn new(customer_id: UserId) -> Self {
        Self {
            customer_id,
            total_orders: 0,
            active_orders: 0,
            delivered_orders: 0,
            cancelled_orders: 0,
            total_spent: Money::ZERO,
        }
    }
}

#[derive(Default)]
struct CustomerOrdersState {
    customers: HashMap<UserId, CustomerOrdersSummary>,
    orders: HashMap<AggregateId, CustomerOrder>,
    order_owner: HashMap<AggregateId, UserId>,
    position: ProjectionPosition,
}

impl CustomerOrdersState {
    fn on_status_changed(&mut self, order_id: AggregateId, from: OrderStatus, to: OrderStatus) {
        let Some(order) = self.orders.get(&order_id) else {
            return;
        };
        let amount = order.final_amount();
        let Some(customer) = self
            .order_owner
            .get(&order_id)
            .and_then(|owner| self.customers.get_mut(owner))
        else {
            return;
        };

        if !from.is_terminal() && to.is_terminal() {
            customer.active_orders = customer.active_orders.saturating_sub(1);
        }
        match to {
            OrderStatus::Delivered => {
                customer.delivered_orders += 1;
                customer.total_spent += amount;
            }
            OrderStatus::Cancelled => customer.cancelled_orders += 1,
            OrderStatus::Refunded if from == OrderStatus::Delivered => {
                customer.total_spent = (customer.total_spent - amount).non_negative();
            }
            _ => {}
        }
    }
}

/// Read model of orders grouped by customer.
#[derive(Clone, Default)]
pub struct CustomerOrdersView {
    state: Arc<RwLock<CustomerOrdersState>>,
}

impl CustomerOrdersView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_customer(&self, customer_id: UserId) -> Option<CustomerOrdersSummary> {
        self.state.read().await.customers.get(&customer_id).cloned()
    }

    pub async fn get_order(&self, order_id: AggregateId) -> Option<CustomerOrder> {
        self.state.read().await.orders.get(&order_id).cloned()
    }

    /// A customer's orders, newest first.
    pub async fn orders_for(&self, customer_id: UserId) -> Vec<CustomerOrder> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|order| state.order_owner.get(&order.order_id) == Some(&customer_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.placed_at
                .cmp(&a.placed_at)
                .then_with(|| b.order_number.as_str().cmp(a.order_number.as_str()))
        });
        orders
    }

    /// Orders not yet in a terminal status, newest first.
    pub async fn active_orders_for(&self, customer_id: UserId) -> Vec<CustomerOrder> {
        self.orders_for(customer_id)
            .await
            .into_iter()
            .filter(CustomerOrder::is_active)
            .collect()
    }
}

#[async_trait]
impl Projection for CustomerOrdersView {
    fn name(&self) -> &'static str {
        "CustomerOrdersView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        state.position = state.position.advance();
        if event.aggregate_type != "Order" {
            return Ok(());
        }

        let order_event: OrderEvent = serde_json::from_value(event.payload.clone())?;
        let order_id = event.aggregate_id;

        match order_event {
            OrderEvent::OrderPlaced(data) => {
                let customer = state
                    .customers
                    .entry(data.user_id)
                    .or_insert_with(|| CustomerOrdersSummary::new(data.user_id));
                customer.total_orders += 1;
                customer.active_orders += 1;

                state.order_owner.insert(order_id, data.user_id);
                state.orders.insert(
                    order_id,
                    CustomerOrder {
                        order_id,
                        order_number: data.order_number,
                        status: OrderStatus::Pending,
                        payment_status: data.payment.status,
                        item_count: data.lines.iter().map(|line| line.quantity).sum(),
                        pricing: data.payment.pricing,
                        points_used: data.loyalty_points.used,
                        delivery_id: None,
                        placed_at: data.placed_at,
                        updated_at: data.placed_at,
                    },
                );
            }
            OrderEvent::StatusChanged(data) => {
                if let Some(order) = state.orders.get_mut(&order_id) {
                    order.status = data.to;
                    order.updated_at = data.changed_at;
                }
                state.on_status_changed(order_id, data.from, data.to);
            }
            OrderEvent::PaymentStatusChanged(data) => {
                if let Some(order) = state.orders.get_mut(&order_id) {
                    order.payment_status = data.to;
                    order.updated_at = data.changed_at;
                }
            }
            OrderEvent::AdjustmentApplied(data) => {
                if let Some(order) = state.orders.get_mut(&order_id) {
                    order.pricing = order.pricing.with_extra_discount(data.discount);
                    order.updated_at = data.applied_at;
                }
            }
            OrderEvent::DeliveryLinked(data) => {
                if let Some(order) = state.orders.get_mut(&order_id) {
                    order.delivery_id = Some(data.delivery_id);
                    order.updated_at = data.linked_at;
                }
            }
        }

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = CustomerOrdersState::default();
        Ok(())
    }
}

impl ReadModel for CustomerOrdersView {
    fn name(&self) -> &'static str {
        "CustomerOrdersView"
    }

    fn count(&self) -> usize {
        self.state
            .try_read()
            .map(|s| s.customers.len())
            .unwrap_or(0)
    }
}

//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Actor, AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::cart::{DeliveryPreference, DeliveryType};
use crate::money::Money;

use super::{
    LoyaltyPoints, OrderError, OrderEvent, OrderLine, OrderNumber, OrderPayment, OrderStatus,
    PaymentStatus, PlaceOrder, StatusEntry, TransitionPolicy,
    events::{
        AdjustmentAppliedData, DeliveryLinkedData, OrderPlacedData, PaymentStatusChangedData,
        StatusChangedData,
    },
    final_amount,
};

/// Order aggregate root.
///
/// An immutable snapshot of a checked-out cart. Only the status, the payment
/// status and, while pending, staff adjustments change after placement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    order_number: OrderNumber,

    user_id: Option<UserId>,

    lines: Vec<OrderLine>,

    delivery: DeliveryPreference,

    payment: Option<OrderPayment>,

    loyalty_points: LoyaltyPoints,

    status: OrderStatus,

    /// Append-only; the first entry records placement.
    status_history: Vec<StatusEntry>,

    delivery_id: Option<AggregateId>,

    created_at: Option<DateTime<Utc>>,

    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => self.apply_placed(data),
            OrderEvent::StatusChanged(data) => {
                self.status = data.to;
                self.status_history.push(StatusEntry {
                    status: data.to,
                    timestamp: data.changed_at,
                    note: data.note,
                    actor: data.actor,
                });
                self.updated_at = Some(data.changed_at);
            }
            OrderEvent::PaymentStatusChanged(data) => {
                if let Some(payment) = self.payment.as_mut() {
                    payment.status = data.to;
                }
                self.updated_at = Some(data.changed_at);
            }
            OrderEvent::AdjustmentApplied(data) => {
                if let Some(payment) = self.payment.as_mut() {
                    payment.pricing = payment.pricing.with_extra_discount(data.discount);
                }
                self.updated_at = Some(data.applied_at);
            }
            OrderEvent::DeliveryLinked(data) => {
                self.delivery_id = Some(data.delivery_id);
                self.updated_at = Some(data.linked_at);
            }
        }
    }
}

impl SnapshotCapable for Order {
    fn snapshot_interval() -> usize {
        50
    }
}

impl Order {
    fn apply_placed(&mut self, data: OrderPlacedData) {
        let mut payment = data.payment;
        let pricing = &mut payment.pricing;
        pricing.final_amount = final_amount(
            pricing.subtotal,
            pricing.delivery_fee,
            pricing.tax,
            pricing.discount,
            pricing.loyalty_discount,
        );

        self.id = Some(data.order_id);
        self.order_number = data.order_number;
        self.user_id = Some(data.user_id);
        self.lines = data.lines;
        self.delivery = data.delivery;
        self.payment = Some(payment);
        self.loyalty_points = data.loyalty_points;
        self.status = OrderStatus::Pending;
        self.status_history.push(StatusEntry {
            status: OrderStatus::Pending,
            timestamp: data.placed_at,
            note: OrderStatus::Pending.default_note().to_string(),
            actor: data.actor,
        });
        self.created_at = Some(data.placed_at);
        self.updated_at = Some(data.placed_at);
    }
}

// Query methods
impl Order {
    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn delivery(&self) -> &DeliveryPreference {
        &self.delivery
    }

    pub fn delivery_type(&self) -> DeliveryType {
        self.delivery.delivery_type
    }

    pub fn payment(&self) -> Option<&OrderPayment> {
        self.payment.as_ref()
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment.map(|p| p.status).unwrap_or_default()
    }

    /// Amount charged, zero before placement.
    pub fn final_amount(&self) -> Money {
        self.payment.map_or(Money::ZERO, |p| p.pricing.final_amount)
    }

    /// Recomputes the final amount from the stored components.
    pub fn calculate_total(&self) -> Money {
        self.payment.map_or(Money::ZERO, |p| {
            final_amount(
                p.pricing.subtotal,
                p.pricing.delivery_fee,
                p.pricing.tax,
                p.pricing.discount,
                p.pricing.loyalty_discount,
            )
        })
    }

    pub fn loyalty_points(&self) -> LoyaltyPoints {
        self.loyalty_points
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn status_history(&self) -> &[StatusEntry] {
        &self.status_history
    }

    pub fn delivery_id(&self) -> Option<AggregateId> {
        self.delivery_id
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods (return events)
impl Order {
    /// Records a priced checkout.
    pub fn place(
        &self,
        cmd: &PlaceOrder,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyCreated);
        }
        if cmd.lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        if cmd.delivery.delivery_type == DeliveryType::Delivery && cmd.delivery.address.is_none() {
            return Err(OrderError::AddressRequired);
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlacedData {
            order_id: cmd.order_id,
            order_number: cmd.order_number.clone(),
            user_id: cmd.user_id,
            lines: cmd.lines.clone(),
            delivery: cmd.delivery.clone(),
            payment: OrderPayment {
                method: cmd.payment_method,
                status: PaymentStatus::Pending,
                pricing: cmd.pricing,
            },
            loyalty_points: LoyaltyPoints {
                earned: cmd.pricing.points_earned,
                used: cmd.loyalty_points_used,
            },
            actor,
            placed_at: now,
        })])
    }

    /// Moves the order to `to` if `policy` lets `actor` do so.
    ///
    /// Reaching `refunded` also marks the payment refunded.
    pub fn update_status(
        &self,
        to: OrderStatus,
        note: Option<&str>,
        actor: Actor,
        policy: &TransitionPolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        policy.check(self.status, to, self.delivery_type(), actor.role)?;

        let mut events = vec![OrderEvent::StatusChanged(StatusChangedData {
            from: self.status,
            to,
            note: note
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(to.default_note())
                .to_string(),
            actor,
            changed_at: now,
        })];

        let payment_status = self.payment_status();
        if to == OrderStatus::Refunded && payment_status != PaymentStatus::Refunded {
            events.push(OrderEvent::PaymentStatusChanged(PaymentStatusChangedData {
                from: payment_status,
                to: PaymentStatus::Refunded,
                changed_at: now,
            }));
        }

        Ok(events)
    }

    pub fn update_payment_status(
        &self,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let from = self.payment_status();
        if from == to {
            return Ok(vec![]);
        }
        if from == PaymentStatus::Refunded {
            return Err(OrderError::PaymentRefunded);
        }

        Ok(vec![OrderEvent::PaymentStatusChanged(PaymentStatusChangedData {
            from,
            to,
            changed_at: now,
        })])
    }

    /// Takes `discount` off a pending order. Staff only.
    pub fn apply_adjustment(
        &self,
        discount: Money,
        reason: &str,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !actor.role.is_staff() {
            return Err(OrderError::NotPermitted {
                role: actor.role,
                action: "adjust order amounts",
            });
        }
        if self.status != OrderStatus::Pending {
            return Err(OrderError::Frozen {
                status: self.status,
            });
        }
        if discount.is_negative() || discount.is_zero() {
            return Err(OrderError::InvalidAdjustment);
        }

        Ok(vec![OrderEvent::AdjustmentApplied(AdjustmentAppliedData {
            discount,
            reason: reason.to_string(),
            actor,
            applied_at: now,
        })])
    }

    pub fn link_delivery(
        &self,
        delivery_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.delivery_type() != DeliveryType::Delivery {
            return Err(OrderError::NotADeliveryOrder);
        }
        match self.delivery_id {
            Some(linked) if linked == delivery_id => Ok(vec![]),
            Some(linked) => Err(OrderError::DeliveryAlreadyLinked {
                delivery_id: linked,
            }),
            None => Ok(vec![OrderEvent::DeliveryLinked(DeliveryLinkedData {
                delivery_id,
                linked_at: now,
            })]),
        }
    }
}

//! Cart domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::catalog::ProductId;
use crate::money::Money;

use super::{CartItem, Customization, DeliveryPreference, PaymentPreference};

/// Events that can occur on a cart.
///
/// Every event carries the instant it happened; applying it refreshes the
/// cart's last-touched time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    CartCreated(CartCreatedData),
    ItemAdded(ItemAddedData),
    /// An already present product was added again.
    ItemUpdated(ItemUpdatedData),
    ItemQuantityChanged(ItemQuantityChangedData),
    ItemRemoved(ItemRemovedData),
    /// Stale lines were dropped before a new addition.
    ExpiredItemsDiscarded(ExpiredItemsDiscardedData),
    DeliveryPreferenceSet(DeliveryPreferenceSetData),
    PaymentPreferenceSet(PaymentPreferenceSetData),
    DiscountSet(DiscountSetData),
    CartCleared(CartClearedData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartCreated(_) => "CartCreated",
            CartEvent::ItemAdded(_) => "ItemAdded",
            CartEvent::ItemUpdated(_) => "ItemUpdated",
            CartEvent::ItemQuantityChanged(_) => "ItemQuantityChanged",
            CartEvent::ItemRemoved(_) => "ItemRemoved",
            CartEvent::ExpiredItemsDiscarded(_) => "ExpiredItemsDiscarded",
            CartEvent::DeliveryPreferenceSet(_) => "DeliveryPreferenceSet",
            CartEvent::PaymentPreferenceSet(_) => "PaymentPreferenceSet",
            CartEvent::DiscountSet(_) => "DiscountSet",
            CartEvent::CartCleared(_) => "CartCleared",
        }
    }
}

impl CartEvent {
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CartEvent::CartCreated(d) => d.created_at,
            CartEvent::ItemAdded(d) => d.added_at,
            CartEvent::ItemUpdated(d) => d.updated_at,
            CartEvent::ItemQuantityChanged(d) => d.changed_at,
            CartEvent::ItemRemoved(d) => d.removed_at,
            CartEvent::ExpiredItemsDiscarded(d) => d.discarded_at,
            CartEvent::DeliveryPreferenceSet(d) => d.set_at,
            CartEvent::PaymentPreferenceSet(d) => d.set_at,
            CartEvent::DiscountSet(d) => d.set_at,
            CartEvent::CartCleared(d) => d.cleared_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartCreatedData {
    pub cart_id: AggregateId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemAddedData {
    pub item: CartItem,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemUpdatedData {
    pub product_id: ProductId,
    /// Quantity after the addition.
    pub quantity: u32,
    pub customizations: Vec<Customization>,
    pub special_instructions: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemQuantityChangedData {
    pub product_id: ProductId,
    pub old_quantity: u32,
    pub new_quantity: u32,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRemovedData {
    pub product_id: ProductId,
    pub removed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiredItemsDiscardedData {
    pub item_count: usize,
    pub discarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPreferenceSetData {
    pub delivery: DeliveryPreference,
    pub set_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPreferenceSetData {
    pub payment: PaymentPreference,
    pub set_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountSetData {
    pub amount: Money,
    pub set_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartClearedData {
    pub reason: String,
    pub cleared_at: DateTime<Utc>,
}

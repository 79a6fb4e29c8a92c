//! Cart aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::catalog::ProductId;
use crate::location::GeoPoint;
use crate::money::Money;
use crate::settings::Settings;

use super::{
    AddCartItem, CartError, CartEvent, CartItem, CartTotals, DeliveryPreference, DeliveryType,
    PaymentPreference, SetPaymentPreference,
    events::{
        CartClearedData, CartCreatedData, DeliveryPreferenceSetData, DiscountSetData,
        ExpiredItemsDiscardedData, ItemAddedData, ItemQuantityChangedData, ItemRemovedData,
        ItemUpdatedData, PaymentPreferenceSetData,
    },
};

/// A customer's basket before checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    user_id: Option<UserId>,

    /// Lines in insertion order.
    items: Vec<CartItem>,

    delivery: DeliveryPreference,

    payment: PaymentPreference,

    discount: Money,

    created_at: Option<DateTime<Utc>>,

    last_touched: Option<DateTime<Utc>>,
}

impl Aggregate for Cart {
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
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
        self.last_touched = Some(event.occurred_at());
        match event {
            CartEvent::CartCreated(data) => {
                self.id = Some(data.cart_id);
                self.user_id = Some(data.user_id);
                self.created_at = Some(data.created_at);
            }
            CartEvent::ItemAdded(data) => self.items.push(data.item),
            CartEvent::ItemUpdated(data) => {
                if let Some(item) = self.item_mut(&data.product_id) {
                    item.quantity = data.quantity;
                    item.customizations = data.customizations;
                    item.special_instructions = data.special_instructions;
                }
            }
            CartEvent::ItemQuantityChanged(data) => {
                if let Some(item) = self.item_mut(&data.product_id) {
                    item.quantity = data.new_quantity;
                }
            }
            CartEvent::ItemRemoved(data) => {
                self.items.retain(|item| item.product_id != data.product_id);
            }
            CartEvent::ExpiredItemsDiscarded(_) => self.items.clear(),
            CartEvent::DeliveryPreferenceSet(data) => self.delivery = data.delivery,
            CartEvent::PaymentPreferenceSet(data) => self.payment = data.payment,
            CartEvent::DiscountSet(data) => self.discount = data.amount,
            CartEvent::CartCleared(_) => {
                self.items.clear();
                self.discount = Money::ZERO;
                self.payment.loyalty_points_used = 0;
            }
        }
    }
}

// Query methods
impl Cart {
    /// Stream id of the cart owned by `user_id`.
    pub fn id_for(user_id: UserId) -> AggregateId {
        AggregateId::for_user(Self::aggregate_type(), user_id)
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn get_item(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_units(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn delivery(&self) -> &DeliveryPreference {
        &self.delivery
    }

    pub fn payment(&self) -> PaymentPreference {
        self.payment
    }

    pub fn discount(&self) -> Money {
        self.discount
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn last_touched(&self) -> Option<DateTime<Utc>> {
        self.last_touched
    }

    /// True once `ttl` has passed since the cart was last touched.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.last_touched.is_some_and(|touched| now > touched + ttl)
    }

    /// Lines that are still valid at `now`; an expired cart has none.
    pub fn live_items(&self, now: DateTime<Utc>, ttl: Duration) -> &[CartItem] {
        if self.is_expired(now, ttl) {
            &[]
        } else {
            &self.items
        }
    }

    /// Recomputes the derived amounts from the current lines.
    pub fn calculate_totals(&self, settings: &Settings) -> CartTotals {
        CartTotals::compute(
            &self.items,
            self.delivery.delivery_type,
            self.discount,
            self.payment.loyalty_points_used,
            settings,
        )
    }
}

// Command methods (return events)
impl Cart {
    /// Adds units of a product, merging with an existing line.
    ///
    /// A repeated product has its quantity incremented and its instructions
    /// and customizations replaced. An expired cart is emptied first.
    pub fn add_item(
        &self,
        cmd: &AddCartItem,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEvent>, CartError> {
        let quantity = u32::try_from(cmd.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(CartError::InvalidQuantity {
                quantity: cmd.quantity,
            })?;
        if cmd.unit_price.is_negative() {
            return Err(CartError::NegativeAmount { field: "unit_price" });
        }
        if cmd.customizations.iter().any(|c| c.cost.is_negative()) {
            return Err(CartError::NegativeAmount {
                field: "customization cost",
            });
        }

        let mut events = self.open_if_new(cmd.user_id, now);
        let live = if self.is_expired(now, settings.cart_ttl) && !self.items.is_empty() {
            events.push(CartEvent::ExpiredItemsDiscarded(ExpiredItemsDiscardedData {
                item_count: self.items.len(),
                discarded_at: now,
            }));
            &[][..]
        } else {
            &self.items[..]
        };

        let existing = live.iter().find(|item| item.product_id == cmd.product_id);
        let current_quantity = existing.map_or(0, |item| item.quantity);
        let new_quantity = current_quantity.saturating_add(quantity);
        check_limits(live, &cmd.product_id, current_quantity, new_quantity, settings)?;

        events.push(match existing {
            Some(_) => CartEvent::ItemUpdated(ItemUpdatedData {
                product_id: cmd.product_id.clone(),
                quantity: new_quantity,
                customizations: cmd.customizations.clone(),
                special_instructions: cmd.special_instructions.clone(),
                updated_at: now,
            }),
            None => CartEvent::ItemAdded(ItemAddedData {
                item: CartItem {
                    product_id: cmd.product_id.clone(),
                    product_name: cmd.product_name.clone(),
                    quantity,
                    unit_price: cmd.unit_price,
                    customizations: cmd.customizations.clone(),
                    special_instructions: cmd.special_instructions.clone(),
                },
                added_at: now,
            }),
        });
        Ok(events)
    }

    pub fn remove_item(
        &self,
        product_id: &ProductId,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEvent>, CartError> {
        self.live_line(product_id, settings, now)?;
        Ok(vec![CartEvent::ItemRemoved(ItemRemovedData {
            product_id: product_id.clone(),
            removed_at: now,
        })])
    }

    /// Sets a line's quantity; zero or less removes the line.
    pub fn update_item_quantity(
        &self,
        product_id: &ProductId,
        quantity: i32,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEvent>, CartError> {
        let existing = self.live_line(product_id, settings, now)?;
        let new_quantity = match u32::try_from(quantity) {
            Ok(q) if q > 0 => q,
            _ => return self.remove_item(product_id, settings, now),
        };
        if new_quantity == existing.quantity {
            return Ok(vec![]);
        }
        check_limits(&self.items, product_id, existing.quantity, new_quantity, settings)?;

        Ok(vec![CartEvent::ItemQuantityChanged(ItemQuantityChangedData {
            product_id: product_id.clone(),
            old_quantity: existing.quantity,
            new_quantity,
            changed_at: now,
        })])
    }

    pub fn set_delivery(
        &self,
        user_id: UserId,
        delivery: DeliveryPreference,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEvent>, CartError> {
        if delivery.delivery_type == DeliveryType::Delivery && delivery.address.is_none() {
            return Err(CartError::AddressRequired);
        }
        if let Some(point) = delivery.address.as_ref().and_then(|a| a.coordinates) {
            GeoPoint::new(point.lat, point.lng)?;
        }
        let mut events = self.open_if_new(user_id, now);
        events.push(CartEvent::DeliveryPreferenceSet(DeliveryPreferenceSetData {
            delivery,
            set_at: now,
        }));
        Ok(events)
    }

    pub fn set_payment(
        &self,
        cmd: &SetPaymentPreference,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEvent>, CartError> {
        let mut events = self.open_if_new(cmd.user_id, now);
        events.push(CartEvent::PaymentPreferenceSet(PaymentPreferenceSetData {
            payment: PaymentPreference {
                method: cmd.method,
                loyalty_points_used: cmd.loyalty_points_used,
            },
            set_at: now,
        }));
        Ok(events)
    }

    pub fn set_discount(
        &self,
        user_id: UserId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEvent>, CartError> {
        if amount.is_negative() {
            return Err(CartError::NegativeAmount { field: "discount" });
        }
        let mut events = self.open_if_new(user_id, now);
        events.push(CartEvent::DiscountSet(DiscountSetData {
            amount,
            set_at: now,
        }));
        Ok(events)
    }

    /// Empties the cart. Clearing a cart that was never created is a no-op.
    pub fn clear(&self, reason: &str, now: DateTime<Utc>) -> Result<Vec<CartEvent>, CartError> {
        if self.id.is_none() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::CartCleared(CartClearedData {
            reason: reason.to_string(),
            cleared_at: now,
        })])
    }

    fn open_if_new(&self, user_id: UserId, now: DateTime<Utc>) -> Vec<CartEvent> {
        if self.id.is_some() {
            return Vec::new();
        }
        vec![CartEvent::CartCreated(CartCreatedData {
            cart_id: Self::id_for(user_id),
            user_id,
            created_at: now,
        })]
    }

    fn live_line(
        &self,
        product_id: &ProductId,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Result<&CartItem, CartError> {
        self.live_items(now, settings.cart_ttl)
            .iter()
            .find(|item| &item.product_id == product_id)
            .ok_or_else(|| CartError::ItemNotFound {
                product_id: product_id.clone(),
            })
    }
}

// Apply event helpers
impl Cart {
    fn item_mut(&mut self, product_id: &ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| &item.product_id == product_id)
    }
}

/// Checks the per-line and per-cart unit ceilings for a line moving from
/// `current` to `new` units.
fn check_limits(
    items: &[CartItem],
    product_id: &ProductId,
    current: u32,
    new: u32,
    settings: &Settings,
) -> Result<(), CartError> {
    if new > settings.max_item_quantity {
        return Err(CartError::ItemQuantityLimit {
            product_id: product_id.clone(),
            quantity: new,
            max: settings.max_item_quantity,
        });
    }
    let units: u32 = items.iter().map(|item| item.quantity).sum::<u32>() - current + new;
    if units > settings.max_cart_units {
        return Err(CartError::CartUnitLimit {
            units,
            max: settings.max_cart_units,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::Customization;
    use crate::location::{Address, LocationError};

    fn settings() -> Settings {
        Settings::default()
    }

    fn apply(cart: &mut Cart, events: Vec<CartEvent>) {
        cart.apply_events(events);
    }

    fn croissant(user_id: UserId, quantity: i32) -> AddCartItem {
        AddCartItem::new(user_id, "SKU-CROISSANT", "Croissant", quantity, Money::from_cents(350))
    }

    #[test]
    fn first_addition_creates_the_cart() {
        let user_id = UserId::new();
        let now = Utc::now();
        let cart = Cart::default();

        let events = cart.add_item(&croissant(user_id, 2), &settings(), now).unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], CartEvent::CartCreated(_)));
        let mut cart = cart;
        apply(&mut cart, events);
        assert_eq!(cart.id(), Some(Cart::id_for(user_id)));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.last_touched(), Some(now));
    }

    #[test]
    fn repeated_product_increments_and_overwrites() {
        let user_id = UserId::new();
        let now = Utc::now();
        let mut cart = Cart::default();
        let first = croissant(user_id, 2).with_instructions("warm please");
        let events = cart.add_item(&first, &settings(), now).unwrap();
        apply(&mut cart, events);

        let second = croissant(user_id, 1)
            .with_customization(Customization::new("Filling", "Almond", Money::from_cents(60)));
        let events = cart.add_item(&second, &settings(), now).unwrap();
        apply(&mut cart, events);

        let item = cart.get_item(&ProductId::new("SKU-CROISSANT")).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(item.quantity, 3);
        assert_eq!(item.special_instructions, None);
        assert_eq!(item.customizations.len(), 1);
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let cart = Cart::default();
        for quantity in [0, -3] {
            let err = cart
                .add_item(&croissant(UserId::new(), quantity), &settings(), Utc::now())
                .unwrap_err();
            assert_eq!(err, CartError::InvalidQuantity { quantity });
        }
    }

    #[test]
    fn enforces_item_and_cart_ceilings() {
        let user_id = UserId::new();
        let now = Utc::now();
        let mut cart = Cart::default();
        let events = cart.add_item(&croissant(user_id, 50), &settings(), now).unwrap();
        apply(&mut cart, events);

        let err = cart.add_item(&croissant(user_id, 1), &settings(), now).unwrap_err();
        assert!(matches!(err, CartError::ItemQuantityLimit { quantity: 51, max: 50, .. }));

        let events = cart
            .add_item(
                &AddCartItem::new(user_id, "SKU-BAGEL", "Bagel", 50, Money::from_cents(200)),
                &settings(),
                now,
            )
            .unwrap();
        apply(&mut cart, events);

        let err = cart
            .add_item(
                &AddCartItem::new(user_id, "SKU-ROLL", "Roll", 1, Money::from_cents(90)),
                &settings(),
                now,
            )
            .unwrap_err();
        assert_eq!(err, CartError::CartUnitLimit { units: 101, max: 100 });
    }

    #[test]
    fn expired_lines_are_discarded_on_next_addition() {
        let user_id = UserId::new();
        let start = Utc::now();
        let mut cart = Cart::default();
        let events = cart.add_item(&croissant(user_id, 2), &settings(), start).unwrap();
        apply(&mut cart, events);

        let later = start + Duration::hours(25);
        assert!(cart.is_expired(later, settings().cart_ttl));
        assert!(cart.live_items(later, settings().cart_ttl).is_empty());

        let events = cart.add_item(&croissant(user_id, 1), &settings(), later).unwrap();
        assert!(matches!(events[0], CartEvent::ExpiredItemsDiscarded(_)));
        apply(&mut cart, events);
        assert_eq!(cart.total_units(), 1);
        assert!(!cart.is_expired(later, settings().cart_ttl));
    }

    #[test]
    fn update_to_zero_removes_and_missing_line_is_not_found() {
        let user_id = UserId::new();
        let now = Utc::now();
        let mut cart = Cart::default();
        let events = cart.add_item(&croissant(user_id, 2), &settings(), now).unwrap();
        apply(&mut cart, events);
        let id = ProductId::new("SKU-CROISSANT");

        let events = cart.update_item_quantity(&id, 0, &settings(), now).unwrap();
        assert!(matches!(events[0], CartEvent::ItemRemoved(_)));
        apply(&mut cart, events);

        let err = cart.update_item_quantity(&id, 1, &settings(), now).unwrap_err();
        assert_eq!(err, CartError::ItemNotFound { product_id: id.clone() });
        assert!(cart.remove_item(&id, &settings(), now).is_err());
    }

    #[test]
    fn totals_follow_every_mutation() {
        let user_id = UserId::new();
        let now = Utc::now();
        let settings = settings();
        let mut cart = Cart::default();
        let events = cart.add_item(&croissant(user_id, 2), &settings, now).unwrap();
        apply(&mut cart, events);
        let before = cart.calculate_totals(&settings);

        let events = cart
            .set_delivery(
                user_id,
                DeliveryPreference::delivery_to(Address::new("Rua Augusta 1", "Lisboa", "1100-048")),
                now,
            )
            .unwrap();
        apply(&mut cart, events);
        let events = cart.set_discount(user_id, Money::from_cents(100), now).unwrap();
        apply(&mut cart, events);

        let after = cart.calculate_totals(&settings);
        assert_eq!(after.subtotal, before.subtotal);
        assert_eq!(after.delivery_fee, settings.delivery_fee);
        assert_eq!(
            after.total,
            after.subtotal + after.delivery_fee + after.tax - after.discount - after.loyalty_discount
        );
    }

    #[test]
    fn delivery_requires_address() {
        let preference = DeliveryPreference {
            delivery_type: DeliveryType::Delivery,
            ..DeliveryPreference::default()
        };
        let err = Cart::default()
            .set_delivery(UserId::new(), preference, Utc::now())
            .unwrap_err();
        assert_eq!(err, CartError::AddressRequired);
    }

    #[test]
    fn delivery_address_coordinates_must_be_on_earth() {
        let mut address = Address::new("Rua Augusta 1", "Lisboa", "1100-048");
        address.coordinates = Some(GeoPoint {
            lat: 500.0,
            lng: 9000.0,
        });
        let err = Cart::default()
            .set_delivery(UserId::new(), DeliveryPreference::delivery_to(address), Utc::now())
            .unwrap_err();
        assert_eq!(err, CartError::InvalidAddress(LocationError::Latitude(500.0)));
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn clear_empties_lines_and_redemption() {
        let user_id = UserId::new();
        let now = Utc::now();
        let mut cart = Cart::default();
        assert!(cart.clear("checkout", now).unwrap().is_empty());

        let events = cart.add_item(&croissant(user_id, 2), &settings(), now).unwrap();
        apply(&mut cart, events);
        let events = cart
            .set_payment(
                &SetPaymentPreference {
                    user_id,
                    method: crate::cart::PaymentMethod::Card,
                    loyalty_points_used: 40,
                },
                now,
            )
            .unwrap();
        apply(&mut cart, events);

        let events = cart.clear("checkout", now).unwrap();
        apply(&mut cart, events);
        assert!(cart.is_empty());
        assert_eq!(cart.payment().loyalty_points_used, 0);
        assert_eq!(cart.payment().method, crate::cart::PaymentMethod::Card);
    }
}

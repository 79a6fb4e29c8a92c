//! Cart commands.
//!
//! Carts are addressed by their owner; the stream id is derived from the
//! user id, so the first addition creates the cart.

use common::{AggregateId, UserId};
use event_store::Version;

use crate::catalog::ProductId;
use crate::command::Command;
use crate::money::Money;

use super::{Cart, Customization, DeliveryPreference, PaymentMethod};

/// Command to add a product to a cart.
#[derive(Debug, Clone)]
pub struct AddCartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub product_name: String,
    /// Units to add; must be positive.
    pub quantity: i32,
    pub unit_price: Money,
    pub customizations: Vec<Customization>,
    pub special_instructions: Option<String>,
}

impl AddCartItem {
    pub fn new(
        user_id: UserId,
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: i32,
        unit_price: Money,
    ) -> Self {
        Self {
            user_id,
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
            customizations: Vec::new(),
            special_instructions: None,
        }
    }

    pub fn with_customization(mut self, customization: Customization) -> Self {
        self.customizations.push(customization);
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.special_instructions = Some(instructions.into());
        self
    }
}

impl Command for AddCartItem {
    type Aggregate = Cart;

    fn aggregate_id(&self) -> AggregateId {
        Cart::id_for(self.user_id)
    }
}

/// Command to remove a product line.
#[derive(Debug, Clone)]
pub struct RemoveCartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
}

impl RemoveCartItem {
    pub fn new(user_id: UserId, product_id: impl Into<ProductId>) -> Self {
        Self {
            user_id,
            product_id: product_id.into(),
        }
    }
}

impl Command for RemoveCartItem {
    type Aggregate = Cart;

    fn aggregate_id(&self) -> AggregateId {
        Cart::id_for(self.user_id)
    }
}

/// Command to set the quantity of a line; zero or less removes it.
#[derive(Debug, Clone)]
pub struct UpdateCartItemQuantity {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
}

impl UpdateCartItemQuantity {
    pub fn new(user_id: UserId, product_id: impl Into<ProductId>, quantity: i32) -> Self {
        Self {
            user_id,
            product_id: product_id.into(),
            quantity,
        }
    }
}

impl Command for UpdateCartItemQuantity {
    type Aggregate = Cart;

    fn aggregate_id(&self) -> AggregateId {
        Cart::id_for(self.user_id)
    }
}

#[derive(Debug, Clone)]
pub struct SetDeliveryPreference {
    pub user_id: UserId,
    pub delivery: DeliveryPreference,
}

impl Command for SetDeliveryPreference {
    type Aggregate = Cart;

    fn aggregate_id(&self) -> AggregateId {
        Cart::id_for(self.user_id)
    }
}

#[derive(Debug, Clone)]
pub struct SetPaymentPreference {
    pub user_id: UserId,
    pub method: PaymentMethod,
    pub loyalty_points_used: u64,
}

impl Command for SetPaymentPreference {
    type Aggregate = Cart;

    fn aggregate_id(&self) -> AggregateId {
        Cart::id_for(self.user_id)
    }
}

#[derive(Debug, Clone)]
pub struct SetCartDiscount {
    pub user_id: UserId,
    pub amount: Money,
}

impl Command for SetCartDiscount {
    type Aggregate = Cart;

    fn aggregate_id(&self) -> AggregateId {
        Cart::id_for(self.user_id)
    }
}

#[derive(Debug, Clone)]
pub struct ClearCart {
    pub user_id: UserId,
    pub reason: String,
    /// When set, the cart must still be at this version.
    pub expected_version: Option<Version>,
}

impl ClearCart {
    pub fn new(user_id: UserId, reason: impl Into<String>) -> Self {
        Self {
            user_id,
            reason: reason.into(),
            expected_version: None,
        }
    }

    /// Clears only the cart as it was read at `version`.
    pub fn at_version(mut self, version: Version) -> Self {
        self.expected_version = Some(version);
        self
    }
}

impl Command for ClearCart {
    type Aggregate = Cart;

    fn aggregate_id(&self) -> AggregateId {
        Cart::id_for(self.user_id)
    }
}

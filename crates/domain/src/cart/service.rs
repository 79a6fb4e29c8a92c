//! Cart service providing the customer-facing cart operations.

use std::sync::Arc;

use common::{Actor, Clock, UserId};
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::settings::Settings;

use super::{
    AddCartItem, Cart, CartTotals, ClearCart, RemoveCartItem, SetCartDiscount,
    SetDeliveryPreference, SetPaymentPreference, UpdateCartItemQuantity,
};

/// Service for managing carts.
pub struct CartService<S: EventStore> {
    handler: CommandHandler<S, Cart>,
    settings: Arc<Settings>,
    clock: Arc<dyn Clock>,
}

impl<S: EventStore> CartService<S> {
    pub fn new(store: S, settings: Arc<Settings>, clock: Arc<dyn Clock>) -> Self {
        Self {
            handler: CommandHandler::new(store),
            settings,
            clock,
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Cart> {
        &self.handler
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Loads a user's cart; a user without one gets an empty cart.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart, DomainError> {
        self.handler.load(Cart::id_for(user_id)).await
    }

    pub fn totals(&self, cart: &Cart) -> CartTotals {
        cart.calculate_totals(&self.settings)
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_item(&self, cmd: AddCartItem) -> Result<CommandResult<Cart>, DomainError> {
        let now = self.clock.now();
        let settings = &self.settings;
        self.handler
            .execute_as(cmd.aggregate_id(), Actor::customer(cmd.user_id), |cart| {
                cart.add_item(&cmd, settings, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        cmd: RemoveCartItem,
    ) -> Result<CommandResult<Cart>, DomainError> {
        let now = self.clock.now();
        let settings = &self.settings;
        self.handler
            .execute_as(cmd.aggregate_id(), Actor::customer(cmd.user_id), |cart| {
                cart.remove_item(&cmd.product_id, settings, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        cmd: UpdateCartItemQuantity,
    ) -> Result<CommandResult<Cart>, DomainError> {
        let now = self.clock.now();
        let settings = &self.settings;
        self.handler
            .execute_as(cmd.aggregate_id(), Actor::customer(cmd.user_id), |cart| {
                cart.update_item_quantity(&cmd.product_id, cmd.quantity, settings, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_delivery(
        &self,
        cmd: SetDeliveryPreference,
    ) -> Result<CommandResult<Cart>, DomainError> {
        let now = self.clock.now();
        let aggregate_id = cmd.aggregate_id();
        let SetDeliveryPreference { user_id, delivery } = cmd;
        self.handler
            .execute_as(aggregate_id, Actor::customer(user_id), |cart| {
                cart.set_delivery(user_id, delivery, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_payment(
        &self,
        cmd: SetPaymentPreference,
    ) -> Result<CommandResult<Cart>, DomainError> {
        let now = self.clock.now();
        self.handler
            .execute_as(cmd.aggregate_id(), Actor::customer(cmd.user_id), |cart| {
                cart.set_payment(&cmd, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_discount(
        &self,
        cmd: SetCartDiscount,
    ) -> Result<CommandResult<Cart>, DomainError> {
        let now = self.clock.now();
        self.handler
            .execute_as(cmd.aggregate_id(), Actor::customer(cmd.user_id), |cart| {
                cart.set_discount(cmd.user_id, cmd.amount, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, cmd: ClearCart) -> Result<CommandResult<Cart>, DomainError> {
        let now = self.clock.now();
        let actor = Actor::customer(cmd.user_id);
        let clear = |cart: &Cart| cart.clear(&cmd.reason, now);
        match cmd.expected_version {
            Some(version) => {
                self.handler
                    .execute_at(cmd.aggregate_id(), version, actor, clear)
                    .await
            }
            None => self.handler.execute_as(cmd.aggregate_id(), actor, clear).await,
        }
    }
}

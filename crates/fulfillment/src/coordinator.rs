//! Checkout coordinator and cross-aggregate status coupling.

use std::sync::Arc;
use std::time::Instant;

use common::{Actor, Clock, UserId};
use domain::cart::{ClearCart, DeliveryType};
use domain::delivery::{
    AssignDriver, CancelDelivery, CompleteDelivery, CreateDelivery, FailDelivery, MarkPickedUp,
    UpdateLocation,
};
use domain::loyalty::{AddPoints, AdjustPoints, UsePoints};
use domain::order::{LinkDelivery, UpdateOrderStatus};
use domain::{
    Aggregate, CartService, CommandResult, Delivery, DeliveryEvent, DeliveryService,
    DeliveryStatus, Directory, DomainError, LoyaltyError, LoyaltyService, Order, OrderError,
    OrderService, OrderStatus, ProductCatalog, Settings,
};
use event_store::EventStore;

use crate::checkout::{STEP_CLEAR_CART, STEP_PLACE_ORDER, STEP_REDEEM_POINTS};
use crate::error::{FulfillmentError, Result};

/// Runs the workflows that touch several aggregates.
///
/// All four services share one event store; each aggregate keeps its own
/// stream, so a workflow is a sequence of independent appends rather than a
/// single transaction.
pub struct Fulfillment<S>
where
    S: EventStore + Clone,
{
    carts: CartService<S>,
    loyalty: LoyaltyService<S>,
    orders: OrderService<S>,
    deliveries: DeliveryService<S>,
}

impl<S> Fulfillment<S>
where
    S: EventStore + Clone,
{
    pub fn new(
        store: S,
        catalog: Arc<dyn ProductCatalog>,
        directory: Arc<dyn Directory>,
        settings: Arc<Settings>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            carts: CartService::new(store.clone(), settings.clone(), clock.clone()),
            loyalty: LoyaltyService::new(store.clone(), settings.clone(), clock.clone()),
            orders: OrderService::new(store.clone(), catalog, settings.clone(), clock.clone()),
            deliveries: DeliveryService::new(store, directory, settings, clock),
        }
    }

    pub fn carts(&self) -> &CartService<S> {
        &self.carts
    }

    pub fn loyalty(&self) -> &LoyaltyService<S> {
        &self.loyalty
    }

    pub fn orders(&self) -> &OrderService<S> {
        &self.orders
    }

    pub fn deliveries(&self) -> &DeliveryService<S> {
        &self.deliveries
    }

    /// Turns the user's cart into a pending order.
    ///
    /// Steps: place the order (with the customer's tier benefits), debit the
    /// redeemed points, clear the cart. A failure after the order exists
    /// returns the points and cancels the order before the error surfaces.
    #[tracing::instrument(skip(self), fields(%user_id))]
    pub async fn checkout(&self, user_id: UserId, actor: Actor) -> Result<Order> {
        metrics::counter!("checkouts_total").increment(1);
        let started = Instant::now();

        let outcome = self.run_checkout(user_id, actor).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &outcome {
            Ok(order) => {
                metrics::counter!("checkouts_completed_total").increment(1);
                tracing::info!(
                    order_number = %order.order_number(),
                    final_amount = %order.final_amount(),
                    "checkout completed"
                );
            }
            Err(e) => {
                metrics::counter!("checkouts_failed_total", "kind" => e.kind().as_str())
                    .increment(1);
                tracing::warn!(error = %e, "checkout failed");
            }
        }
        outcome
    }

    async fn run_checkout(&self, user_id: UserId, actor: Actor) -> Result<Order> {
        let cart = self.carts.get_cart(user_id).await?;
        let account = self.loyalty.get_account(user_id).await?;
        let points = cart.payment().loyalty_points_used;
        if points > account.current_points() {
            return Err(LoyaltyError::InsufficientPoints {
                requested: points,
                available: account.current_points(),
            }
            .into());
        }

        tracing::info!(step = STEP_PLACE_ORDER, "checkout step started");
        let order = self
            .orders
            .create_from_cart(&cart, account.benefits(), actor)
            .await?
            .aggregate;
        let order_id = order.id().ok_or(OrderError::EmptyCart)?;
        let mut completed = vec![STEP_PLACE_ORDER];

        if points > 0 {
            tracing::info!(step = STEP_REDEEM_POINTS, points, "checkout step started");
            let cmd = UsePoints::new(
                user_id,
                points,
                format!("Redeemed on order {}", order.order_number()),
            )
            .for_order(order_id);
            if let Err(source) = self.loyalty.use_points(cmd).await {
                self.compensate(&completed, &order, &source).await?;
                return Err(FulfillmentError::StepFailed {
                    step: STEP_REDEEM_POINTS,
                    source,
                });
            }
            completed.push(STEP_REDEEM_POINTS);
        }

        tracing::info!(step = STEP_CLEAR_CART, "checkout step started");
        // A concurrent checkout of the same cart moves its version; the loser
        // is compensated here.
        let clear = ClearCart::new(user_id, format!("Checked out as {}", order.order_number()))
            .at_version(cart.version());
        if let Err(source) = self.carts.clear(clear).await {
            self.compensate(&completed, &order, &source).await?;
            return Err(FulfillmentError::StepFailed {
                step: STEP_CLEAR_CART,
                source,
            });
        }

        Ok(order)
    }

    /// Undoes completed checkout steps in reverse order.
    #[tracing::instrument(skip(self, completed, order), fields(order_number = %order.order_number()))]
    async fn compensate(
        &self,
        completed: &[&'static str],
        order: &Order,
        cause: &DomainError,
    ) -> Result<()> {
        metrics::counter!("checkout_compensations_total").increment(1);

        for &step in completed.iter().rev() {
            let outcome = match step {
                STEP_REDEEM_POINTS => self.return_points(order).await,
                STEP_PLACE_ORDER => match order.id() {
                    Some(order_id) => {
                        let cmd =
                            UpdateOrderStatus::new(order_id, OrderStatus::Cancelled, Actor::system())
                                .with_note(format!("Checkout failed: {cause}"));
                        self.orders.update_status(cmd).await.map(|_| ())
                    }
                    None => Ok(()),
                },
                _ => Ok(()),
            };

            match outcome {
                Ok(()) => tracing::info!(step, "compensation step completed"),
                Err(e) => {
                    tracing::warn!(step, error = %e, "compensation step failed");
                    return Err(FulfillmentError::CompensationFailed {
                        step,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Moves an order and applies the side effects on the other aggregates.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(&self, cmd: UpdateOrderStatus) -> Result<Order> {
        let from = self.orders.get_order(cmd.order_id).await?.status();
        let to = cmd.status;
        let order = self.orders.update_status(cmd).await?.aggregate;
        self.after_order_transition(order, from, to).await
    }

    async fn after_order_transition(
        &self,
        order: Order,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order> {
        match to {
            OrderStatus::Confirmed
                if order.delivery_type() == DeliveryType::Delivery
                    && order.delivery_id().is_none() =>
            {
                self.open_delivery(&order).await
            }
            OrderStatus::Cancelled | OrderStatus::Refunded
                if !matches!(from, OrderStatus::Cancelled | OrderStatus::Refunded) =>
            {
                self.return_points(&order).await?;
                if from == OrderStatus::Delivered {
                    self.reclaim_earned_points(&order).await?;
                }
                self.cancel_linked_delivery(&order, to).await?;
                Ok(order)
            }
            OrderStatus::Delivered => {
                self.credit_points(&order).await?;
                Ok(order)
            }
            _ => Ok(order),
        }
    }

    async fn open_delivery(&self, order: &Order) -> Result<Order> {
        let order_id = order.id().ok_or(OrderError::NotADeliveryOrder)?;
        let user_id = order.user_id().ok_or(OrderError::NotADeliveryOrder)?;
        let destination = order
            .delivery()
            .address
            .clone()
            .ok_or(OrderError::AddressRequired)?;

        let cmd = CreateDelivery::new(order_id, user_id, destination);
        let delivery_id = cmd.delivery_id;
        self.deliveries.create(cmd).await?;
        let result = self
            .orders
            .link_delivery(LinkDelivery::new(order_id, delivery_id))
            .await?;

        tracing::info!(%order_id, %delivery_id, "delivery opened for confirmed order");
        Ok(result.aggregate)
    }

    async fn return_points(&self, order: &Order) -> std::result::Result<(), DomainError> {
        let used = order.loyalty_points().used;
        let Some(user_id) = order.user_id() else {
            return Ok(());
        };
        if used == 0 {
            return Ok(());
        }

        let amount = i64::try_from(used).map_err(|_| LoyaltyError::InvalidAmount {
            amount: i64::MAX,
        })?;
        let cmd = AdjustPoints::new(
            user_id,
            amount,
            format!("Points returned for order {}", order.order_number()),
            Actor::system(),
        );
        self.loyalty.adjust_points(cmd).await?;
        tracing::info!(%user_id, points = used, "redeemed points returned");
        Ok(())
    }

    async fn credit_points(&self, order: &Order) -> Result<()> {
        let earned = order.loyalty_points().earned;
        let (Some(order_id), Some(user_id)) = (order.id(), order.user_id()) else {
            return Ok(());
        };
        if earned == 0 {
            return Ok(());
        }

        let cmd = AddPoints::new(user_id, earned, format!("Order {}", order.order_number()))
            .for_order(order_id, order.final_amount());
        self.loyalty.add_points(cmd).await?;
        Ok(())
    }

    /// Takes back the points a refunded order earned on delivery, capped at
    /// what the customer still holds.
    async fn reclaim_earned_points(&self, order: &Order) -> Result<()> {
        let earned = order.loyalty_points().earned;
        let Some(user_id) = order.user_id() else {
            return Ok(());
        };
        let held = self.loyalty.get_account(user_id).await?.current_points();
        let reclaimed = earned.min(held);
        if reclaimed < earned {
            tracing::warn!(
                %user_id,
                earned,
                held,
                "earned points already spent; reclaiming what is left"
            );
        }
        if reclaimed == 0 {
            return Ok(());
        }

        let amount = i64::try_from(reclaimed).map_err(|_| LoyaltyError::InvalidAmount {
            amount: i64::MAX,
        })?;
        let cmd = AdjustPoints::new(
            user_id,
            -amount,
            format!("Points reclaimed for refunded order {}", order.order_number()),
            Actor::system(),
        );
        self.loyalty.adjust_points(cmd).await?;
        tracing::info!(%user_id, points = reclaimed, "earned points reclaimed");
        Ok(())
    }

    async fn cancel_linked_delivery(&self, order: &Order, to: OrderStatus) -> Result<()> {
        let Some(delivery_id) = order.delivery_id() else {
            return Ok(());
        };
        let delivery = self.deliveries.get_delivery(delivery_id).await?;
        if delivery.status().is_terminal() {
            return Ok(());
        }

        let cmd = CancelDelivery::new(delivery_id, format!("Order {to}"), Actor::system());
        self.deliveries.cancel(cmd).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn assign_driver(&self, cmd: AssignDriver) -> Result<Delivery> {
        Ok(self.deliveries.assign_driver(cmd).await?.aggregate)
    }

    /// Records a driver position. The first fix on an assigned delivery puts
    /// it in transit, which needs the order to be released by the kitchen.
    #[tracing::instrument(skip(self))]
    pub async fn update_location(&self, cmd: UpdateLocation) -> Result<Delivery> {
        let delivery = self.deliveries.get_delivery(cmd.delivery_id).await?;
        if delivery.status() == DeliveryStatus::Assigned {
            self.ensure_order_released(&delivery, OrderStatus::OutForDelivery, &cmd.actor)
                .await?;
        }
        let result = self.deliveries.update_location(cmd).await?;
        self.sync_order_if_moved(result).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_picked_up(&self, cmd: MarkPickedUp) -> Result<Delivery> {
        let delivery = self.deliveries.get_delivery(cmd.delivery_id).await?;
        self.ensure_order_released(&delivery, OrderStatus::OutForDelivery, &cmd.actor)
            .await?;
        let result = self.deliveries.mark_picked_up(cmd).await?;
        self.sync_order_if_moved(result).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn complete_delivery(&self, cmd: CompleteDelivery) -> Result<Delivery> {
        let delivery = self.deliveries.get_delivery(cmd.delivery_id).await?;
        self.ensure_order_released(&delivery, OrderStatus::Delivered, &cmd.actor)
            .await?;
        let result = self.deliveries.complete(cmd).await?;
        self.sync_order_if_moved(result).await
    }

    /// A delivery may only leave the shop once its order is ready or already
    /// out for delivery.
    async fn ensure_order_released(
        &self,
        delivery: &Delivery,
        to: OrderStatus,
        actor: &Actor,
    ) -> Result<()> {
        let Some(order_id) = delivery.order_id() else {
            return Ok(());
        };
        let from = self.orders.get_order(order_id).await?.status();
        if matches!(from, OrderStatus::Ready | OrderStatus::OutForDelivery) {
            return Ok(());
        }
        tracing::warn!(%order_id, %from, %to, "delivery moved ahead of its order");
        Err(OrderError::IllegalTransition {
            from,
            to,
            role: actor.role,
        }
        .into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn fail_delivery(&self, cmd: FailDelivery) -> Result<Delivery> {
        let result = self.deliveries.fail(cmd).await?;
        self.sync_order_if_moved(result).await
    }

    /// Cancels a delivery without touching its order.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_delivery(&self, cmd: CancelDelivery) -> Result<Delivery> {
        Ok(self.deliveries.cancel(cmd).await?.aggregate)
    }

    async fn sync_order_if_moved(&self, result: CommandResult<Delivery>) -> Result<Delivery> {
        let moved = result.events.iter().any(|event| {
            matches!(
                event,
                DeliveryEvent::StatusChanged(_)
                    | DeliveryEvent::DeliveryCompleted(_)
                    | DeliveryEvent::DeliveryFailed(_)
            )
        });
        if moved {
            self.sync_order(&result.aggregate).await?;
        }
        Ok(result.aggregate)
    }

    /// Brings the delivery's order in line with the delivery's status.
    async fn sync_order(&self, delivery: &Delivery) -> Result<()> {
        let Some(order_id) = delivery.order_id() else {
            return Ok(());
        };
        let order = self.orders.get_order(order_id).await?;

        let path: &[OrderStatus] = match delivery.status() {
            DeliveryStatus::PickedUp | DeliveryStatus::InTransit => &[OrderStatus::OutForDelivery],
            DeliveryStatus::Delivered => &[OrderStatus::OutForDelivery, OrderStatus::Delivered],
            DeliveryStatus::Failed => &[OrderStatus::Failed],
            _ => &[],
        };

        let mut current = order.status();
        for &to in path {
            if current == to {
                continue;
            }
            if !current.can_transition_to(to, order.delivery_type()) {
                tracing::warn!(
                    %order_id,
                    from = %current,
                    %to,
                    delivery_status = %delivery.status(),
                    "order left behind its delivery"
                );
                break;
            }
            let cmd = UpdateOrderStatus::new(order_id, to, Actor::system())
                .with_note(delivery_note(delivery, to));
            self.update_order_status(cmd).await?;
            current = to;
        }
        Ok(())
    }
}

fn delivery_note(delivery: &Delivery, to: OrderStatus) -> String {
    match (to, delivery.failure_reason()) {
        (OrderStatus::Failed, Some(reason)) => format!("Delivery failed: {reason}"),
        _ => to.default_note().to_string(),
    }
}

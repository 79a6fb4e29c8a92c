//! Order service: checkout snapshots and status changes.

use std::sync::Arc;

use common::{Actor, AggregateId, Clock};
use event_store::EventStore;

use crate::cart::{Cart, DeliveryType};
use crate::catalog::ProductCatalog;
use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::loyalty::Benefits;
use crate::settings::Settings;

use super::{
    ApplyAdjustment, LinkDelivery, Order, OrderError, OrderLine, OrderNumber, OrderPricing,
    PlaceOrder, TransitionPolicy, UpdateOrderStatus, UpdatePaymentStatus,
};

/// Service for managing orders.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
    catalog: Arc<dyn ProductCatalog>,
    settings: Arc<Settings>,
    policy: TransitionPolicy,
    clock: Arc<dyn Clock>,
}

impl<S: EventStore> OrderService<S> {
    pub fn new(
        store: S,
        catalog: Arc<dyn ProductCatalog>,
        settings: Arc<Settings>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            handler: CommandHandler::new(store),
            catalog,
            policy: TransitionPolicy::from_settings(&settings),
            settings,
            clock,
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    pub fn policy(&self) -> &TransitionPolicy {
        &self.policy
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Order, DomainError> {
        self.handler
            .load_existing(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))
    }

    /// Snapshots `cart` into a new pending order.
    ///
    /// Every line must be on sale now with enough stock; lines are priced at
    /// the catalog's current price and the tier `benefits` are applied. The
    /// cart itself is left untouched.
    #[tracing::instrument(skip(self, cart), fields(user_id = ?cart.user_id()))]
    pub async fn create_from_cart(
        &self,
        cart: &Cart,
        benefits: Benefits,
        actor: Actor,
    ) -> Result<CommandResult<Order>, DomainError> {
        let now = self.clock.now();
        let user_id = cart.user_id().ok_or(OrderError::EmptyCart)?;
        let items = cart.live_items(now, self.settings.cart_ttl);
        if items.is_empty() {
            return Err(OrderError::EmptyCart.into());
        }
        let delivery = cart.delivery().clone();
        if delivery.delivery_type == DeliveryType::Delivery && delivery.address.is_none() {
            return Err(OrderError::AddressRequired.into());
        }

        let mut lines = Vec::with_capacity(items.len());
        let mut unavailable = Vec::new();
        for item in items {
            let product_id = &item.product_id;
            let on_sale = self.catalog.is_available_now(product_id, now).await;
            let in_stock = self
                .catalog
                .stock_quantity(product_id)
                .await
                .is_some_and(|stock| stock.covers(item.quantity));
            let price = self.catalog.current_price(product_id).await;
            let name = self
                .catalog
                .product_name(product_id)
                .await
                .unwrap_or_else(|| item.product_name.clone());

            match price {
                Some(price) if on_sale && in_stock => {
                    lines.push(OrderLine::from_cart_item(item, name, price));
                }
                _ => unavailable.push(name),
            }
        }
        if !unavailable.is_empty() {
            tracing::warn!(products = ?unavailable, "checkout blocked by unavailable items");
            return Err(OrderError::UnavailableItems {
                products: unavailable,
            }
            .into());
        }

        let payment = cart.payment();
        let pricing = OrderPricing::compute(
            &lines,
            delivery.delivery_type,
            cart.discount(),
            payment.loyalty_points_used,
            benefits,
            &self.settings,
        );

        let date = now.date_naive();
        let sequence = self
            .handler
            .store()
            .next_sequence(&OrderNumber::sequence_key(date))
            .await?;
        let cmd = PlaceOrder {
            order_id: AggregateId::new(),
            order_number: OrderNumber::new(&self.settings.order_number_prefix, date, sequence),
            user_id,
            lines,
            delivery,
            payment_method: payment.method,
            loyalty_points_used: payment.loyalty_points_used,
            pricing,
        };

        let result = self
            .handler
            .execute_as(cmd.aggregate_id(), actor, |order| order.place(&cmd, actor, now))
            .await?;

        tracing::info!(
            order_id = %cmd.order_id,
            order_number = %cmd.order_number,
            final_amount = %pricing.final_amount,
            "order placed"
        );
        metrics::counter!("orders_created_total").increment(1);
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        cmd: UpdateOrderStatus,
    ) -> Result<CommandResult<Order>, DomainError> {
        let order = self.get_order(cmd.order_id).await?;
        let from = order.status();
        let now = self.clock.now();
        let policy = &self.policy;

        let result = self
            .handler
            .execute_as(cmd.aggregate_id(), cmd.actor, |order| {
                order.update_status(cmd.status, cmd.note.as_deref(), cmd.actor, policy, now)
            })
            .await?;

        tracing::info!(
            order_id = %cmd.order_id,
            %from,
            to = %cmd.status,
            actor = %cmd.actor,
            "order status changed"
        );
        metrics::counter!(
            "order_status_transitions_total",
            "from" => from.as_str(),
            "to" => cmd.status.as_str()
        )
        .increment(1);
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        cmd: UpdatePaymentStatus,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.get_order(cmd.order_id).await?;
        let now = self.clock.now();
        self.handler
            .execute(cmd.aggregate_id(), |order| order.update_payment_status(cmd.status, now))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn apply_adjustment(
        &self,
        cmd: ApplyAdjustment,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.get_order(cmd.order_id).await?;
        let now = self.clock.now();
        self.handler
            .execute_as(cmd.aggregate_id(), cmd.actor, |order| {
                order.apply_adjustment(cmd.discount, &cmd.reason, cmd.actor, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn link_delivery(
        &self,
        cmd: LinkDelivery,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.get_order(cmd.order_id).await?;
        let now = self.clock.now();
        self.handler
            .execute_as(cmd.aggregate_id(), Actor::system(), |order| {
                order.link_delivery(cmd.delivery_id, now)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::cart::AddCartItem;
    use crate::catalog::{InMemoryCatalog, Product, ProductId, Stock};
    use crate::error::ErrorKind;
    use crate::money::Money;
    use crate::order::OrderStatus;
    use chrono::{Duration, TimeZone, Utc};
    use common::{FixedClock, UserId};
    use event_store::InMemoryEventStore;

    struct Fixture {
        orders: OrderService<InMemoryEventStore>,
        catalog: InMemoryCatalog,
        clock: Arc<FixedClock>,
        settings: Arc<Settings>,
    }

    async fn fixture() -> Fixture {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 14, 9, 15, 0).unwrap(),
        ));
        let catalog = InMemoryCatalog::new();
        catalog
            .insert(Product::new("pao-de-deus", "Pão de Deus", Money::from_cents(350)))
            .await;
        catalog
            .insert(
                Product::new("bolo-rei", "Bolo-Rei", Money::from_cents(1800))
                    .with_stock(Stock::Limited(1)),
            )
            .await;
        let settings = Arc::new(Settings::default());
        let orders = OrderService::new(
            InMemoryEventStore::new(),
            Arc::new(catalog.clone()),
            settings.clone(),
            clock.clone(),
        );
        Fixture {
            orders,
            catalog,
            clock,
            settings,
        }
    }

    fn cart_with(fx: &Fixture, user: UserId, items: &[(&str, i32, i64)]) -> Cart {
        let mut cart = Cart::default();
        for (product, quantity, cents) in items {
            let cmd = AddCartItem::new(
                user,
                ProductId::new(*product),
                *product,
                *quantity,
                Money::from_cents(*cents),
            );
            let events = cart.add_item(&cmd, &fx.settings, fx.clock.now()).unwrap();
            cart.apply_events(events);
        }
        cart
    }

    #[tokio::test]
    async fn checkout_uses_catalog_prices_and_numbers_orders() {
        let fx = fixture().await;
        let user = UserId::new();
        let cart = cart_with(&fx, user, &[("pao-de-deus", 2, 300)]);

        let first = fx
            .orders
            .create_from_cart(&cart, Benefits::default(), Actor::customer(user))
            .await
            .unwrap();
        let second = fx
            .orders
            .create_from_cart(&cart, Benefits::default(), Actor::customer(user))
            .await
            .unwrap();

        let order = &first.aggregate;
        assert_eq!(order.lines()[0].unit_price, Money::from_cents(350));
        assert_eq!(order.lines()[0].product_name, "Pão de Deus");
        assert_eq!(order.order_number().as_str(), "SP260314001");
        assert_eq!(second.aggregate.order_number().as_str(), "SP260314002");
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn unavailable_items_are_named() {
        let fx = fixture().await;
        let user = UserId::new();
        let cart = cart_with(
            &fx,
            user,
            &[("bolo-rei", 2, 1800), ("pao-de-deus", 1, 350), ("gone", 1, 100)],
        );

        let err = fx
            .orders
            .create_from_cart(&cart, Benefits::default(), Actor::customer(user))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnavailableItems);
        match err {
            DomainError::Order(OrderError::UnavailableItems { products }) => {
                assert_eq!(products, vec!["Bolo-Rei".to_string(), "gone".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }

        fx.catalog
            .set_stock(&ProductId::new("bolo-rei"), Stock::Limited(5))
            .await;
        let cart = cart_with(&fx, user, &[("bolo-rei", 2, 1800)]);
        assert!(
            fx.orders
                .create_from_cart(&cart, Benefits::default(), Actor::customer(user))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn expired_cart_checks_out_as_empty() {
        let fx = fixture().await;
        let user = UserId::new();
        let cart = cart_with(&fx, user, &[("pao-de-deus", 1, 350)]);
        fx.clock.advance(Duration::hours(25));

        let err = fx
            .orders
            .create_from_cart(&cart, Benefits::default(), Actor::customer(user))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Order(OrderError::EmptyCart)));
    }

    #[tokio::test]
    async fn status_updates_go_through_the_policy() {
        let fx = fixture().await;
        let user = UserId::new();
        let cart = cart_with(&fx, user, &[("pao-de-deus", 1, 350)]);
        let order = fx
            .orders
            .create_from_cart(&cart, Benefits::default(), Actor::customer(user))
            .await
            .unwrap()
            .aggregate;
        let order_id = order.id().unwrap();

        let err = fx
            .orders
            .update_status(UpdateOrderStatus::new(
                order_id,
                OrderStatus::Confirmed,
                Actor::customer(user),
            ))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);

        let result = fx
            .orders
            .update_status(
                UpdateOrderStatus::new(order_id, OrderStatus::Confirmed, Actor::staff(UserId::new()))
                    .with_note("Accepted by the counter"),
            )
            .await
            .unwrap();
        assert_eq!(result.aggregate.status(), OrderStatus::Confirmed);
        assert_eq!(
            result.aggregate.status_history().last().unwrap().note,
            "Accepted by the counter"
        );
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let fx = fixture().await;
        let err = fx.orders.get_order(AggregateId::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

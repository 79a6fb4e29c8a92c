//! Delivery service.

use std::sync::Arc;

use common::{Actor, AggregateId, Clock, Role};
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::directory::Directory;
use crate::error::DomainError;
use crate::settings::Settings;

use super::{
    AssignDriver, CancelDelivery, CompleteDelivery, CreateDelivery, Delivery, DeliveryError,
    FailDelivery, MarkPickedUp, UpdateLocation,
};

/// Service for tracking deliveries.
pub struct DeliveryService<S: EventStore> {
    handler: CommandHandler<S, Delivery>,
    directory: Arc<dyn Directory>,
    settings: Arc<Settings>,
    clock: Arc<dyn Clock>,
}

impl<S: EventStore> DeliveryService<S> {
    pub fn new(
        store: S,
        directory: Arc<dyn Directory>,
        settings: Arc<Settings>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            handler: CommandHandler::new(store),
            directory,
            settings,
            clock,
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Delivery> {
        &self.handler
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_delivery(
        &self,
        delivery_id: AggregateId,
    ) -> Result<Delivery, DomainError> {
        self.handler
            .load_existing(delivery_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Delivery", delivery_id))
    }

    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn create(
        &self,
        cmd: CreateDelivery,
    ) -> Result<CommandResult<Delivery>, DomainError> {
        let now = self.clock.now();
        let settings = &self.settings;
        let result = self
            .handler
            .execute_as(cmd.aggregate_id(), Actor::system(), |delivery| {
                delivery.create(&cmd, settings, now)
            })
            .await?;

        tracing::info!(
            delivery_id = %cmd.delivery_id,
            distance_km = ?result.aggregate.distance_km(),
            "delivery created"
        );
        metrics::counter!("deliveries_created_total").increment(1);
        Ok(result)
    }

    /// Assigns a driver after checking the directory knows them as one.
    #[tracing::instrument(skip(self))]
    pub async fn assign_driver(
        &self,
        cmd: AssignDriver,
    ) -> Result<CommandResult<Delivery>, DomainError> {
        self.get_delivery(cmd.delivery_id).await?;
        if self.directory.role_of(cmd.driver_id).await != Some(Role::Driver) {
            return Err(DeliveryError::NotADriver {
                user_id: cmd.driver_id,
            }
            .into());
        }

        let now = self.clock.now();
        let result = self
            .handler
            .execute_as(cmd.aggregate_id(), cmd.actor, |delivery| {
                delivery.assign_driver(cmd.driver_id, cmd.actor, now)
            })
            .await?;

        tracing::info!(delivery_id = %cmd.delivery_id, driver_id = %cmd.driver_id, "driver assigned");
        self.handler.snapshot_if_due(cmd.delivery_id, &result).await?;
        Ok(result)
    }

    /// Records a courier position. Positions are frequent, so a lost append
    /// race is retried rather than surfaced.
    #[tracing::instrument(skip(self))]
    pub async fn update_location(
        &self,
        cmd: UpdateLocation,
    ) -> Result<CommandResult<Delivery>, DomainError> {
        self.get_delivery(cmd.delivery_id).await?;
        let now = self.clock.now();
        let result = self
            .handler
            .execute_with_retry(cmd.aggregate_id(), Some(cmd.actor), |delivery| {
                delivery.update_location(cmd.lat, cmd.lng, cmd.accuracy, cmd.actor, now)
            })
            .await?;

        metrics::counter!("delivery_location_updates_total").increment(1);
        self.handler.snapshot_if_due(cmd.delivery_id, &result).await?;
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_picked_up(
        &self,
        cmd: MarkPickedUp,
    ) -> Result<CommandResult<Delivery>, DomainError> {
        self.get_delivery(cmd.delivery_id).await?;
        let now = self.clock.now();
        let result = self
            .handler
            .execute_as(cmd.aggregate_id(), cmd.actor, |delivery| {
                delivery.mark_picked_up(cmd.actor, now)
            })
            .await?;
        self.handler.snapshot_if_due(cmd.delivery_id, &result).await?;
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn complete(
        &self,
        cmd: CompleteDelivery,
    ) -> Result<CommandResult<Delivery>, DomainError> {
        self.get_delivery(cmd.delivery_id).await?;
        let now = self.clock.now();
        let result = self
            .handler
            .execute_as(cmd.aggregate_id(), cmd.actor, |delivery| {
                delivery.complete(cmd.notes.as_deref(), cmd.actor, now)
            })
            .await?;

        let delay = result.aggregate.calculate_delay();
        tracing::info!(
            delivery_id = %cmd.delivery_id,
            delay_secs = delay.num_seconds(),
            "delivery completed"
        );
        metrics::counter!("deliveries_completed_total").increment(1);
        self.handler.snapshot_if_due(cmd.delivery_id, &result).await?;
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn fail(&self, cmd: FailDelivery) -> Result<CommandResult<Delivery>, DomainError> {
        self.get_delivery(cmd.delivery_id).await?;
        let now = self.clock.now();
        let result = self
            .handler
            .execute_as(cmd.aggregate_id(), cmd.actor, |delivery| {
                delivery.fail(&cmd.reason, cmd.actor, now)
            })
            .await?;

        tracing::warn!(delivery_id = %cmd.delivery_id, reason = %cmd.reason, "delivery failed");
        metrics::counter!("deliveries_failed_total").increment(1);
        self.handler.snapshot_if_due(cmd.delivery_id, &result).await?;
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        cmd: CancelDelivery,
    ) -> Result<CommandResult<Delivery>, DomainError> {
        self.get_delivery(cmd.delivery_id).await?;
        let now = self.clock.now();
        let result = self
            .handler
            .execute_as(cmd.aggregate_id(), cmd.actor, |delivery| {
                delivery.cancel(&cmd.reason, cmd.actor, now)
            })
            .await?;
        tracing::info!(delivery_id = %cmd.delivery_id, reason = %cmd.reason, "delivery cancelled");
        self.handler.snapshot_if_due(cmd.delivery_id, &result).await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryStatus;
    use crate::directory::InMemoryDirectory;
    use crate::error::ErrorKind;
    use crate::location::{Address, GeoPoint};
    use chrono::{Duration, TimeZone, Utc};
    use common::{FixedClock, UserId};
    use event_store::InMemoryEventStore;

    struct Fixture {
        deliveries: DeliveryService<InMemoryEventStore>,
        directory: InMemoryDirectory,
        clock: Arc<FixedClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap(),
        ));
        let directory = InMemoryDirectory::new();
        let deliveries = DeliveryService::new(
            InMemoryEventStore::new(),
            Arc::new(directory.clone()),
            Arc::new(Settings::default()),
            clock.clone(),
        );
        Fixture {
            deliveries,
            directory,
            clock,
        }
    }

    async fn open(fx: &Fixture) -> AggregateId {
        let destination = Address::new("Avenida da Liberdade 200", "Lisboa", "1250-147")
            .with_coordinates(GeoPoint::new(38.7205, -9.1459).unwrap());
        let cmd = CreateDelivery::new(AggregateId::new(), UserId::new(), destination);
        let id = cmd.delivery_id;
        fx.deliveries.create(cmd).await.unwrap();
        id
    }

    #[tokio::test]
    async fn full_trip() {
        let fx = fixture();
        let id = open(&fx).await;
        let driver = UserId::new();
        fx.directory.register(driver, Role::Driver).await;
        let staff = Actor::staff(UserId::new());

        fx.deliveries
            .assign_driver(AssignDriver::new(id, driver, staff))
            .await
            .unwrap();
        fx.deliveries
            .mark_picked_up(MarkPickedUp::new(id, Actor::driver(driver)))
            .await
            .unwrap();
        fx.clock.advance(Duration::minutes(3));
        fx.deliveries
            .update_location(
                UpdateLocation::new(id, 38.721, -9.143, Actor::driver(driver)).with_accuracy(5.0),
            )
            .await
            .unwrap();
        let result = fx
            .deliveries
            .complete(CompleteDelivery::new(id, Actor::driver(driver)))
            .await
            .unwrap();

        let delivery = result.aggregate;
        assert_eq!(delivery.status(), DeliveryStatus::Delivered);
        assert_eq!(delivery.driver_id(), Some(driver));
        assert_eq!(delivery.location_history().len(), 1);
        assert_eq!(delivery.actual_duration(), Some(Duration::minutes(3)));
    }

    #[tokio::test]
    async fn only_directory_drivers_can_be_assigned() {
        let fx = fixture();
        let id = open(&fx).await;
        let baker = UserId::new();
        fx.directory.register(baker, Role::Staff).await;
        let staff = Actor::staff(UserId::new());

        for user in [baker, UserId::new()] {
            let err = fx
                .deliveries
                .assign_driver(AssignDriver::new(id, user, staff))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                DomainError::Delivery(DeliveryError::NotADriver { .. })
            ));
        }
    }

    #[tokio::test]
    async fn missing_delivery_is_not_found() {
        let fx = fixture();
        let err = fx
            .deliveries
            .update_location(UpdateLocation::new(
                AggregateId::new(),
                38.7,
                -9.1,
                Actor::system(),
            ))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn invalid_coordinates_are_rejected() {
        let fx = fixture();
        let id = open(&fx).await;
        let driver = UserId::new();
        fx.directory.register(driver, Role::Driver).await;
        fx.deliveries
            .assign_driver(AssignDriver::new(id, driver, Actor::system()))
            .await
            .unwrap();

        let err = fx
            .deliveries
            .update_location(UpdateLocation::new(id, 38.7, 200.0, Actor::driver(driver)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let delivery = fx.deliveries.get_delivery(id).await.unwrap();
        assert!(delivery.last_location().is_none());
    }
}

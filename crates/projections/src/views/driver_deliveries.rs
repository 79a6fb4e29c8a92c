//! Driver deliveries read model: what each courier is currently carrying.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::{Address, DeliveryEvent, DeliveryStatus};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// A delivery on a courier's board.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverDelivery {
    pub delivery_id: AggregateId,
    pub order_id: AggregateId,
    pub customer_id: UserId,
    pub destination: Address,
    pub status: DeliveryStatus,
    pub driver_id: Option<UserId>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct DriverDeliveriesState {
    /// Deliveries not yet in a terminal status.
    open: HashMap<AggregateId, DriverDelivery>,
    completed: HashMap<UserId, u64>,
    position: ProjectionPosition,
}

impl DriverDeliveriesState {
    fn close(&mut self, delivery_id: AggregateId, status: DeliveryStatus) {
        if let Some(delivery) = self.open.remove(&delivery_id)
            && status == DeliveryStatus::Delivered
            && let Some(driver) = delivery.driver_id
        {
            *self.completed.entry(driver).or_default() += 1;
        }
    }
}

/// Read model of open deliveries grouped by driver.
#[derive(Clone, Default)]
pub struct DriverDeliveriesView {
    state: Arc<RwLock<DriverDeliveriesState>>,
}

impl DriverDeliveriesView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries assigned to `driver` that are not finished, earliest ETA first.
    pub async fn active_for(&self, driver: UserId) -> Vec<DriverDelivery> {
        let state = self.state.read().await;
        let mut deliveries: Vec<_> = state
            .open
            .values()
            .filter(|d| d.driver_id == Some(driver))
            .cloned()
            .collect();
        sort_by_eta(&mut deliveries);
        deliveries
    }

    /// Pending deliveries with no driver yet, oldest first.
    pub async fn unassigned(&self) -> Vec<DriverDelivery> {
        let state = self.state.read().await;
        let mut deliveries: Vec<_> = state
            .open
            .values()
            .filter(|d| d.driver_id.is_none())
            .cloned()
            .collect();
        deliveries.sort_by_key(|d| d.created_at);
        deliveries
    }

    pub async fn completed_count(&self, driver: UserId) -> u64 {
        self.state
            .read()
            .await
            .completed
            .get(&driver)
            .copied()
            .unwrap_or(0)
    }
}

fn sort_by_eta(deliveries: &mut [DriverDelivery]) {
    // Deliveries without an estimate go last.
    deliveries.sort_by_key(|d| (d.estimated_delivery.is_none(), d.estimated_delivery, d.created_at));
}

#[async_trait]
impl Projection for DriverDeliveriesView {
    fn name(&self) -> &'static str {
        "DriverDeliveriesView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        state.position = state.position.advance();
        if event.aggregate_type != "Delivery" {
            return Ok(());
        }

        let delivery_event: DeliveryEvent = serde_json::from_value(event.payload.clone())?;
        let delivery_id = event.aggregate_id;

        match delivery_event {
            DeliveryEvent::DeliveryCreated(data) => {
                state.open.insert(
                    delivery_id,
                    DriverDelivery {
                        delivery_id,
                        order_id: data.order_id,
                        customer_id: data.customer_id,
                        destination: data.destination,
                        status: DeliveryStatus::Pending,
                        driver_id: None,
                        estimated_delivery: data.estimated_delivery,
                        created_at: data.created_at,
                    },
                );
            }
            DeliveryEvent::DriverAssigned(data) => {
                if let Some(delivery) = state.open.get_mut(&delivery_id) {
                    delivery.driver_id = Some(data.driver_id);
                    if delivery.status == DeliveryStatus::Pending {
                        delivery.status = DeliveryStatus::Assigned;
                    }
                }
            }
            DeliveryEvent::StatusChanged(data) => {
                if data.to.is_terminal() {
                    state.close(delivery_id, data.to);
                } else if let Some(delivery) = state.open.get_mut(&delivery_id) {
                    delivery.status = data.to;
                }
            }
            DeliveryEvent::DeliveryCompleted(_) => state.close(delivery_id, DeliveryStatus::Delivered),
            DeliveryEvent::DeliveryFailed(_) => state.close(delivery_id, DeliveryStatus::Failed),
            DeliveryEvent::DeliveryCancelled(_) => state.close(delivery_id, DeliveryStatus::Cancelled),
            DeliveryEvent::LocationUpdated(_) => {}
        }

        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = DriverDeliveriesState::default();
        Ok(())
    }
}

impl ReadModel for DriverDeliveriesView {
    fn name(&self) -> &'static str {
        "DriverDeliveriesView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.open.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use common::Actor;
    use domain::DomainEvent;
    use domain::delivery::{
        DeliveryCancelledData, DeliveryCompletedData, DeliveryCreatedData, DriverAssignedData,
    };

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn envelope(delivery_id: AggregateId, version: i64, event: &DeliveryEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(delivery_id)
            .aggregate_type("Delivery")
            .event_type(event.event_type())
            .version(event_store::Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap()
    }

    async fn open(view: &DriverDeliveriesView, eta_minutes: Option<i64>) -> AggregateId {
        let delivery_id = AggregateId::new();
        let event = DeliveryEvent::DeliveryCreated(DeliveryCreatedData {
            delivery_id,
            order_id: AggregateId::new(),
            customer_id: UserId::new(),
            destination: Address::new("Rua do Ouro 12", "Lisboa", "1100-060"),
            distance_km: None,
            estimated_duration_secs: None,
            estimated_delivery: eta_minutes.map(at),
            created_at: at(0),
        });
        view.handle(&envelope(delivery_id, 1, &event)).await.unwrap();
        delivery_id
    }

    async fn assign(view: &DriverDeliveriesView, delivery_id: AggregateId, driver: UserId) {
        let event = DeliveryEvent::DriverAssigned(DriverAssignedData {
            driver_id: driver,
            previous_driver: None,
            actor: Actor::staff(UserId::new()),
            assigned_at: at(1),
        });
        view.handle(&envelope(delivery_id, 2, &event)).await.unwrap();
    }

    #[tokio::test]
    async fn new_deliveries_wait_unassigned() {
        let view = DriverDeliveriesView::new();
        let id = open(&view, Some(20)).await;

        let waiting = view.unassigned().await;
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].delivery_id, id);
        assert_eq!(waiting[0].status, DeliveryStatus::Pending);
    }

    #[tokio::test]
    async fn assignment_moves_to_the_driver_board() {
        let view = DriverDeliveriesView::new();
        let driver = UserId::new();
        let late = open(&view, Some(40)).await;
        let soon = open(&view, Some(15)).await;
        let unknown = open(&view, None).await;
        for id in [late, soon, unknown] {
            assign(&view, id, driver).await;
        }

        let board: Vec<_> = view
            .active_for(driver)
            .await
            .into_iter()
            .map(|d| d.delivery_id)
            .collect();
        assert_eq!(board, [soon, late, unknown]);
        assert!(view.unassigned().await.is_empty());
        assert!(view.active_for(UserId::new()).await.is_empty());
    }

    #[tokio::test]
    async fn completion_clears_the_board_and_counts() {
        let view = DriverDeliveriesView::new();
        let driver = UserId::new();
        let id = open(&view, Some(20)).await;
        assign(&view, id, driver).await;

        let event = DeliveryEvent::DeliveryCompleted(DeliveryCompletedData {
            notes: None,
            actor: Actor::driver(driver),
            completed_at: at(25),
        });
        view.handle(&envelope(id, 3, &event)).await.unwrap();

        assert!(view.active_for(driver).await.is_empty());
        assert_eq!(view.completed_count(driver).await, 1);
    }

    #[tokio::test]
    async fn cancelled_deliveries_are_not_counted() {
        let view = DriverDeliveriesView::new();
        let driver = UserId::new();
        let id = open(&view, Some(20)).await;
        assign(&view, id, driver).await;

        let event = DeliveryEvent::DeliveryCancelled(DeliveryCancelledData {
            reason: "Order cancelled".into(),
            actor: Actor::system(),
            cancelled_at: at(5),
        });
        view.handle(&envelope(id, 3, &event)).await.unwrap();

        assert!(view.active_for(driver).await.is_empty());
        assert_eq!(view.completed_count(driver).await, 0);
        assert_eq!(ReadModel::count(&view), 0);
    }
}

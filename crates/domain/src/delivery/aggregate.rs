//! Delivery aggregate.

use chrono::{DateTime, Duration, Utc};
use common::{Actor, AggregateId, Role, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::location::{Address, GeoPoint, LocationFix, LocationHistory};
use crate::settings::Settings;

use super::events::{
    DeliveryCancelledData, DeliveryCompletedData, DeliveryCreatedData, DeliveryFailedData,
    DeliveryStatusChangedData, DriverAssignedData, LocationUpdatedData,
};
use super::{CreateDelivery, DeliveryError, DeliveryEvent, DeliveryStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryStatusEntry {
    pub status: DeliveryStatus,
    pub timestamp: DateTime<Utc>,
    pub note: String,
    pub actor: Option<Actor>,
}

/// The trip of one delivery-type order from the bakery to the customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delivery {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    order_id: Option<AggregateId>,

    customer_id: Option<UserId>,

    driver_id: Option<UserId>,

    destination: Address,

    status: DeliveryStatus,

    status_history: Vec<DeliveryStatusEntry>,

    last_location: Option<LocationFix>,

    /// Bounded; see [`LocationHistory`].
    location_history: LocationHistory,

    distance_km: Option<f64>,

    estimated_duration_secs: Option<i64>,

    estimated_delivery: Option<DateTime<Utc>>,

    actual_delivery: Option<DateTime<Utc>>,

    actual_duration_secs: Option<i64>,

    completed_at: Option<DateTime<Utc>>,

    notes: Option<String>,

    failure_reason: Option<String>,

    created_at: Option<DateTime<Utc>>,
}

impl Aggregate for Delivery {
    type Event = DeliveryEvent;
    type Error = DeliveryError;

    fn aggregate_type() -> &'static str {
        "Delivery"
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
            DeliveryEvent::DeliveryCreated(data) => {
                self.id = Some(data.delivery_id);
                self.order_id = Some(data.order_id);
                self.customer_id = Some(data.customer_id);
                self.destination = data.destination;
                self.distance_km = data.distance_km;
                self.estimated_duration_secs = data.estimated_duration_secs;
                self.estimated_delivery = data.estimated_delivery;
                self.created_at = Some(data.created_at);
                self.enter(DeliveryStatus::Pending, data.created_at, "Delivery created", None);
            }
            DeliveryEvent::DriverAssigned(data) => {
                self.driver_id = Some(data.driver_id);
                let note = match data.previous_driver {
                    Some(_) => "Driver reassigned",
                    None => "Driver assigned",
                };
                self.enter(DeliveryStatus::Assigned, data.assigned_at, note, Some(data.actor));
            }
            DeliveryEvent::LocationUpdated(data) => {
                self.last_location = Some(data.fix);
                self.location_history.push(data.fix);
            }
            DeliveryEvent::StatusChanged(data) => {
                self.enter(data.to, data.changed_at, &data.note, Some(data.actor));
            }
            DeliveryEvent::DeliveryCompleted(data) => {
                let at = data.completed_at;
                self.completed_at = Some(at);
                self.actual_delivery = Some(at);
                self.actual_duration_secs = self.created_at.map(|created| (at - created).num_seconds());
                self.notes = data.notes;
                self.enter(DeliveryStatus::Delivered, at, "Delivered", Some(data.actor));
            }
            DeliveryEvent::DeliveryFailed(data) => {
                self.enter(DeliveryStatus::Failed, data.failed_at, &data.reason, Some(data.actor));
                self.failure_reason = Some(data.reason);
            }
            DeliveryEvent::DeliveryCancelled(data) => {
                self.enter(
                    DeliveryStatus::Cancelled,
                    data.cancelled_at,
                    &data.reason,
                    Some(data.actor),
                );
            }
        }
    }
}

impl SnapshotCapable for Delivery {
    fn snapshot_interval() -> usize {
        50
    }
}

impl Delivery {
    fn enter(
        &mut self,
        status: DeliveryStatus,
        at: DateTime<Utc>,
        note: &str,
        actor: Option<Actor>,
    ) {
        self.status = status;
        self.status_history.push(DeliveryStatusEntry {
            status,
            timestamp: at,
            note: note.to_string(),
            actor,
        });
    }
}

// Query methods
impl Delivery {
    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn customer_id(&self) -> Option<UserId> {
        self.customer_id
    }

    pub fn driver_id(&self) -> Option<UserId> {
        self.driver_id
    }

    pub fn destination(&self) -> &Address {
        &self.destination
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    pub fn status_history(&self) -> &[DeliveryStatusEntry] {
        &self.status_history
    }

    pub fn last_location(&self) -> Option<&LocationFix> {
        self.last_location.as_ref()
    }

    pub fn location_history(&self) -> &LocationHistory {
        &self.location_history
    }

    /// Kilometers from the bakery to the destination.
    pub fn distance_km(&self) -> Option<f64> {
        self.distance_km
    }

    /// Kilometers from the courier's last position to the destination.
    pub fn remaining_distance_km(&self) -> Option<f64> {
        let destination = self.destination.coordinates?;
        self.last_location
            .map(|fix| fix.point.distance_km(&destination))
    }

    pub fn estimated_duration(&self) -> Option<Duration> {
        self.estimated_duration_secs.map(Duration::seconds)
    }

    pub fn estimated_delivery(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery
    }

    pub fn actual_delivery(&self) -> Option<DateTime<Utc>> {
        self.actual_delivery
    }

    pub fn actual_duration(&self) -> Option<Duration> {
        self.actual_duration_secs.map(Duration::seconds)
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// How late the delivery arrived; zero when early, on time or unknown.
    pub fn calculate_delay(&self) -> Duration {
        match (self.actual_delivery, self.estimated_delivery) {
            (Some(actual), Some(estimated)) if actual > estimated => actual - estimated,
            _ => Duration::zero(),
        }
    }
}

/// Distance and travel time from `origin` to `destination` at `speed_kmh`.
fn estimate_trip(
    origin: &GeoPoint,
    destination: &GeoPoint,
    speed_kmh: f64,
) -> (f64, Option<i64>) {
    let distance = origin.distance_km(destination);
    let secs = (speed_kmh > 0.0).then(|| (distance / speed_kmh * 3600.0).round() as i64);
    (distance, secs)
}

// Command methods (return events)
impl Delivery {
    /// Opens the delivery and estimates its arrival from the bakery origin.
    pub fn create(
        &self,
        cmd: &CreateDelivery,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryEvent>, DeliveryError> {
        if self.id.is_some() {
            return Err(DeliveryError::AlreadyCreated);
        }

        let (distance_km, estimated_duration_secs) = match cmd.destination.coordinates {
            Some(destination) => {
                let (distance, secs) =
                    estimate_trip(&settings.bakery_origin, &destination, settings.average_speed_kmh);
                (Some(distance), secs)
            }
            None => (None, None),
        };

        Ok(vec![DeliveryEvent::DeliveryCreated(DeliveryCreatedData {
            delivery_id: cmd.delivery_id,
            order_id: cmd.order_id,
            customer_id: cmd.customer_id,
            destination: cmd.destination.clone(),
            distance_km,
            estimated_duration_secs,
            estimated_delivery: estimated_duration_secs.map(|secs| now + Duration::seconds(secs)),
            created_at: now,
        })])
    }

    /// Hands the delivery to `driver_id`. The caller has already confirmed
    /// that the user is a driver.
    pub fn assign_driver(
        &self,
        driver_id: UserId,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryEvent>, DeliveryError> {
        if !(actor.role.is_staff() || actor.role == Role::System) {
            return Err(DeliveryError::NotPermitted {
                role: actor.role,
                action: "assign drivers",
            });
        }
        self.ensure_transition(DeliveryStatus::Assigned)?;
        if self.driver_id == Some(driver_id) {
            return Ok(vec![]);
        }

        Ok(vec![DeliveryEvent::DriverAssigned(DriverAssignedData {
            driver_id,
            previous_driver: self.driver_id,
            actor,
            assigned_at: now,
        })])
    }

    /// Records a courier position. The first report of an assigned
    /// delivery puts it in transit.
    pub fn update_location(
        &self,
        lat: f64,
        lng: f64,
        accuracy: Option<f64>,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryEvent>, DeliveryError> {
        let fix = LocationFix::new(lat, lng, accuracy, now)?;
        self.ensure_courier(actor)?;
        if !self.status.is_active() {
            return Err(DeliveryError::IllegalTransition {
                from: self.status,
                to: DeliveryStatus::InTransit,
            });
        }

        let mut events = vec![DeliveryEvent::LocationUpdated(LocationUpdatedData { fix })];
        if self.status == DeliveryStatus::Assigned {
            events.push(DeliveryEvent::StatusChanged(DeliveryStatusChangedData {
                from: self.status,
                to: DeliveryStatus::InTransit,
                note: "Courier is on the way".to_string(),
                actor,
                changed_at: now,
            }));
        }
        Ok(events)
    }

    pub fn mark_picked_up(
        &self,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryEvent>, DeliveryError> {
        self.ensure_courier(actor)?;
        self.ensure_transition(DeliveryStatus::PickedUp)?;

        Ok(vec![DeliveryEvent::StatusChanged(DeliveryStatusChangedData {
            from: self.status,
            to: DeliveryStatus::PickedUp,
            note: "Order picked up".to_string(),
            actor,
            changed_at: now,
        })])
    }

    pub fn complete(
        &self,
        notes: Option<&str>,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryEvent>, DeliveryError> {
        self.ensure_courier(actor)?;
        self.ensure_transition(DeliveryStatus::Delivered)?;

        Ok(vec![DeliveryEvent::DeliveryCompleted(DeliveryCompletedData {
            notes: notes.map(str::to_string),
            actor,
            completed_at: now,
        })])
    }

    pub fn fail(
        &self,
        reason: &str,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryEvent>, DeliveryError> {
        self.ensure_courier(actor)?;
        self.ensure_transition(DeliveryStatus::Failed)?;
        let reason = required(reason)?;

        Ok(vec![DeliveryEvent::DeliveryFailed(DeliveryFailedData {
            reason,
            actor,
            failed_at: now,
        })])
    }

    pub fn cancel(
        &self,
        reason: &str,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryEvent>, DeliveryError> {
        if actor.role == Role::Customer || actor.role == Role::Driver {
            return Err(DeliveryError::NotPermitted {
                role: actor.role,
                action: "cancel deliveries",
            });
        }
        self.ensure_transition(DeliveryStatus::Cancelled)?;
        let reason = required(reason)?;

        Ok(vec![DeliveryEvent::DeliveryCancelled(DeliveryCancelledData {
            reason,
            actor,
            cancelled_at: now,
        })])
    }

    fn ensure_transition(&self, to: DeliveryStatus) -> Result<(), DeliveryError> {
        if self.id.is_some() && self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(DeliveryError::IllegalTransition {
                from: self.status,
                to,
            })
        }
    }

    /// Drivers may only act on their own deliveries; staff and the backend
    /// may act on any. Customers never drive a delivery forward.
    fn ensure_courier(&self, actor: Actor) -> Result<(), DeliveryError> {
        match actor.role {
            Role::Driver if actor.user_id.is_some() && actor.user_id == self.driver_id => Ok(()),
            Role::Driver => Err(DeliveryError::NotAssignedDriver),
            Role::Staff | Role::Admin | Role::System => Ok(()),
            Role::Customer => Err(DeliveryError::NotPermitted {
                role: actor.role,
                action: "update deliveries",
            }),
        }
    }
}

fn required(reason: &str) -> Result<String, DeliveryError> {
    let reason = reason.trim();
    if reason.is_empty() {
        Err(DeliveryError::ReasonRequired)
    } else {
        Ok(reason.to_string())
    }
}

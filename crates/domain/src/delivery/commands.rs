//! Delivery commands.

use common::{Actor, AggregateId, UserId};

use crate::command::Command;
use crate::location::Address;

use super::Delivery;

/// Opens a delivery for a confirmed delivery-type order.
#[derive(Debug, Clone)]
pub struct CreateDelivery {
    pub delivery_id: AggregateId,
    pub order_id: AggregateId,
    pub customer_id: UserId,
    pub destination: Address,
}

impl CreateDelivery {
    pub fn new(order_id: AggregateId, customer_id: UserId, destination: Address) -> Self {
        Self {
            delivery_id: AggregateId::new(),
            order_id,
            customer_id,
            destination,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssignDriver {
    pub delivery_id: AggregateId,
    pub driver_id: UserId,
    pub actor: Actor,
}

impl AssignDriver {
    pub fn new(delivery_id: AggregateId, driver_id: UserId, actor: Actor) -> Self {
        Self {
            delivery_id,
            driver_id,
            actor,
        }
    }
}

/// A courier position report.
#[derive(Debug, Clone)]
pub struct UpdateLocation {
    pub delivery_id: AggregateId,
    pub lat: f64,
    pub lng: f64,
    /// Accuracy radius in meters, when the device reports one.
    pub accuracy: Option<f64>,
    pub actor: Actor,
}

impl UpdateLocation {
    pub fn new(delivery_id: AggregateId, lat: f64, lng: f64, actor: Actor) -> Self {
        Self {
            delivery_id,
            lat,
            lng,
            accuracy: None,
            actor,
        }
    }

    pub fn with_accuracy(mut self, meters: f64) -> Self {
        self.accuracy = Some(meters);
        self
    }
}

#[derive(Debug, Clone)]
pub struct MarkPickedUp {
    pub delivery_id: AggregateId,
    pub actor: Actor,
}

impl MarkPickedUp {
    pub fn new(delivery_id: AggregateId, actor: Actor) -> Self {
        Self { delivery_id, actor }
    }
}

#[derive(Debug, Clone)]
pub struct CompleteDelivery {
    pub delivery_id: AggregateId,
    pub notes: Option<String>,
    pub actor: Actor,
}

impl CompleteDelivery {
    pub fn new(delivery_id: AggregateId, actor: Actor) -> Self {
        Self {
            delivery_id,
            notes: None,
            actor,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct FailDelivery {
    pub delivery_id: AggregateId,
    pub reason: String,
    pub actor: Actor,
}

impl FailDelivery {
    pub fn new(delivery_id: AggregateId, reason: impl Into<String>, actor: Actor) -> Self {
        Self {
            delivery_id,
            reason: reason.into(),
            actor,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CancelDelivery {
    pub delivery_id: AggregateId,
    pub reason: String,
    pub actor: Actor,
}

impl CancelDelivery {
    pub fn new(delivery_id: AggregateId, reason: impl Into<String>, actor: Actor) -> Self {
        Self {
            delivery_id,
            reason: reason.into(),
            actor,
        }
    }
}

macro_rules! delivery_command {
    ($($command:ty),* $(,)?) => {
        $(
            impl Command for $command {
                type Aggregate = Delivery;

                fn aggregate_id(&self) -> AggregateId {
                    self.delivery_id
                }
            }
        )*
    };
}

delivery_command!(
    CreateDelivery,
    AssignDriver,
    UpdateLocation,
    MarkPickedUp,
    CompleteDelivery,
    FailDelivery,
    CancelDelivery,
);

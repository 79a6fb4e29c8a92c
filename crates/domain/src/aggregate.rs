//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// A fact recorded on an aggregate stream.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Event type name stored next to the payload.
    fn event_type(&self) -> &'static str;
}

/// An event-sourced entity.
///
/// Commands are `&self` methods returning the events they would record;
/// state only changes through [`Aggregate::apply`], which must be
/// deterministic and infallible because events are already facts.
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    type Error: std::error::Error + Send + Sync;

    /// Stream type name, e.g. `"Order"`.
    fn aggregate_type() -> &'static str;

    /// Returns None until the first event has been applied.
    fn id(&self) -> Option<AggregateId>;

    /// Version 0 for a new aggregate; increments with each event.
    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

/// Aggregates whose state is periodically saved as a snapshot.
///
/// Long streams (a loyalty ledger, a tracked delivery with hundreds of
/// location fixes) reload from the latest snapshot plus its tail.
pub trait SnapshotCapable: Aggregate + Serialize + DeserializeOwned {
    /// Number of events between snapshots.
    fn snapshot_interval() -> usize {
        100
    }

    fn should_snapshot(&self) -> bool {
        self.version().as_i64() > 0
            && (self.version().as_i64() as usize).is_multiple_of(Self::snapshot_interval())
    }
}

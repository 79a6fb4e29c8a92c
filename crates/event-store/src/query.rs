use chrono::{DateTime, Utc};

use crate::{AggregateId, EventEnvelope};

/// Filter over stored events.
///
/// Every criterion that is set must match; unset criteria match anything.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub aggregate_id: Option<AggregateId>,
    pub aggregate_type: Option<String>,
    /// Any of these event types.
    pub event_types: Option<Vec<String>>,
    /// Inclusive lower bound on the event timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the event timestamp.
    pub to_timestamp: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for every event of one aggregate type.
    pub fn for_aggregate_type(aggregate_type: impl Into<String>) -> Self {
        Self {
            aggregate_type: Some(aggregate_type.into()),
            ..Default::default()
        }
    }

    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types
            .get_or_insert_with(Vec::new)
            .push(event_type.into());
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(from);
        self.to_timestamp = Some(to);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if `event` satisfies every criterion except `limit`.
    pub fn matches(&self, event: &EventEnvelope) -> bool {
        if self.aggregate_id.is_some_and(|id| id != event.aggregate_id) {
            return false;
        }
        if self
            .aggregate_type
            .as_deref()
            .is_some_and(|t| t != event.aggregate_type)
        {
            return false;
        }
        if let Some(types) = &self.event_types
            && !types.iter().any(|t| *t == event.event_type)
        {
            return false;
        }
        if self.from_timestamp.is_some_and(|from| event.timestamp < from) {
            return false;
        }
        if self.to_timestamp.is_some_and(|to| event.timestamp > to) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Version;
    use chrono::Duration;

    fn envelope(aggregate_type: &str, event_type: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type(aggregate_type)
            .event_type(event_type)
            .version(Version::first())
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn empty_query_matches_everything() {
        assert!(EventQuery::new().matches(&envelope("Order", "OrderPlaced")));
    }

    #[test]
    fn event_types_accumulate() {
        let query = EventQuery::for_aggregate_type("Order")
            .event_type("OrderPlaced")
            .event_type("OrderStatusChanged");

        assert!(query.matches(&envelope("Order", "OrderPlaced")));
        assert!(query.matches(&envelope("Order", "OrderStatusChanged")));
        assert!(!query.matches(&envelope("Order", "PaymentStatusChanged")));
        assert!(!query.matches(&envelope("Delivery", "OrderPlaced")));
    }

    #[test]
    fn time_window_is_inclusive() {
        let event = envelope("Delivery", "LocationUpdated");
        let query = EventQuery::new().between(event.timestamp, event.timestamp);
        assert!(query.matches(&event));

        let later = EventQuery::new().between(
            event.timestamp + Duration::seconds(1),
            event.timestamp + Duration::seconds(2),
        );
        assert!(!later.matches(&event));
    }
}

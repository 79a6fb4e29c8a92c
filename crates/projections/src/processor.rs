//! Feeds stored events to registered projections.

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;

use crate::Result;
use crate::projection::Projection;

/// Delivers events from an event store to a set of projections.
///
/// - catch-up replays the global stream, skipping what each projection has seen
/// - `process_event` pushes a freshly appended event to every projection
/// - rebuild resets everything and replays from the start
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        tracing::debug!(projection = projection.name(), "registered projection");
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Streams the whole store and returns how many events it holds.
    ///
    /// A projection only receives events past its own position, so calling
    /// this repeatedly is cheap for up-to-date projections.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut stream = self.store.stream_all_events().await?;
        let mut seen: u64 = 0;

        while let Some(event) = stream.next().await {
            let event = event?;
            seen += 1;

            for projection in &self.projections {
                if projection.position().await.events_processed < seen {
                    projection.handle(&event).await?;
                    metrics::counter!(
                        "projection_events_processed_total",
                        "projection" => projection.name()
                    )
                    .increment(1);
                }
            }
        }

        tracing::info!(events = seen, projections = self.projections.len(), "catch-up complete");
        Ok(seen)
    }

    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        for projection in &self.projections {
            projection.handle(event).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        metrics::counter!("projection_rebuilds_total").increment(1);
        self.run_catch_up().await
    }
}

//! Read model trait for query-side views.

/// A view that can be queried without touching the event store.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of top-level entries; zero while a writer holds the lock.
    fn count(&self) -> usize;
}

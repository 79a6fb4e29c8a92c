//! Shared application state.

use std::sync::Arc;

use common::Clock;
use domain::{InMemoryCatalog, InMemoryDirectory, Settings};
use event_store::EventStore;
use fulfillment::Fulfillment;
use projections::{CustomerOrdersView, DriverDeliveriesView, ProjectionProcessor};
use tokio::sync::Mutex;

/// Everything a handler can reach.
///
/// The catalog and directory are the in-memory collaborators; staff keep
/// them current through the admin routes.
pub struct AppState<S: EventStore + Clone> {
    pub fulfillment: Fulfillment<S>,
    pub store: S,
    pub catalog: InMemoryCatalog,
    pub directory: InMemoryDirectory,
    pub customer_orders: CustomerOrdersView,
    pub driver_deliveries: DriverDeliveriesView,
    processor: ProjectionProcessor<S>,
    catch_up: Mutex<()>,
}

impl<S: EventStore + Clone + 'static> AppState<S> {
    pub fn new(store: S, settings: Settings, clock: Arc<dyn Clock>) -> Self {
        let catalog = InMemoryCatalog::new();
        let directory = InMemoryDirectory::new();
        let fulfillment = Fulfillment::new(
            store.clone(),
            Arc::new(catalog.clone()),
            Arc::new(directory.clone()),
            Arc::new(settings),
            clock,
        );

        let customer_orders = CustomerOrdersView::new();
        let driver_deliveries = DriverDeliveriesView::new();
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(customer_orders.clone()));
        processor.register(Box::new(driver_deliveries.clone()));

        Self {
            fulfillment,
            store,
            catalog,
            directory,
            customer_orders,
            driver_deliveries,
            processor,
            catch_up: Mutex::new(()),
        }
    }

    /// Brings the read models up to date with the store.
    ///
    /// Catch-ups are serialized so no event is folded twice.
    pub async fn refresh_views(&self) -> projections::Result<u64> {
        let _guard = self.catch_up.lock().await;
        self.processor.run_catch_up().await
    }
}

//! Query side of the bakery backend.
//!
//! Projections fold the global event stream into read models:
//! - [`CustomerOrdersView`]: each customer's orders with status and totals
//! - [`DriverDeliveriesView`]: open deliveries per courier, plus the unassigned queue
//!
//! [`ProjectionProcessor`] runs catch-up and rebuilds over any [`event_store::EventStore`].

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{
    CustomerOrder, CustomerOrdersSummary, CustomerOrdersView, DriverDeliveriesView, DriverDelivery,
};

//! Read model views for the query side.

pub mod customer_orders;
pub mod driver_deliveries;

pub use customer_orders::{CustomerOrder, CustomerOrdersSummary, CustomerOrdersView};
pub use driver_deliveries::{DriverDelivery, DriverDeliveriesView};

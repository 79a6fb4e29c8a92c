//! Workflows that span more than one aggregate.
//!
//! Checkout turns a cart into an order, debits the redeemed points and
//! clears the cart; if a later step fails, the completed ones are
//! compensated in reverse order. Order and delivery transitions are coupled
//! here as well:
//! 1. Confirming a delivery order opens its delivery
//! 2. The courier leaving moves the order out for delivery
//! 3. Completing or failing the delivery closes the order
//! 4. Delivering an order credits its points; cancelling or refunding it
//!    returns the redeemed ones

pub mod checkout;
pub mod coordinator;
pub mod error;

pub use coordinator::Fulfillment;
pub use error::{FulfillmentError, Result};

//! Domain layer for the bakery backend.
//!
//! Four event-sourced aggregates share the same plumbing:
//! - [`Cart`]: a customer's basket with its own expiry and pricing preview
//! - [`LoyaltyAccount`]: a points ledger with tiers, rewards and expiry
//! - [`Order`]: checkout snapshot and status lifecycle with role checks
//! - [`Delivery`]: courier assignment and location tracking
//!
//! Commands are `&self` methods returning events; [`CommandHandler`] loads,
//! runs and appends them with optimistic concurrency.

pub mod aggregate;
pub mod cart;
pub mod catalog;
pub mod command;
pub mod delivery;
pub mod directory;
pub mod error;
pub mod location;
pub mod loyalty;
pub mod money;
pub mod order;
pub mod settings;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use cart::{Cart, CartError, CartEvent, CartService};
pub use catalog::{InMemoryCatalog, Product, ProductCatalog, ProductId, Stock};
pub use command::{Command, CommandHandler, CommandResult};
pub use delivery::{Delivery, DeliveryError, DeliveryEvent, DeliveryService, DeliveryStatus};
pub use directory::{Directory, InMemoryDirectory};
pub use error::{DomainError, ErrorKind};
pub use location::{Address, GeoPoint, LocationFix};
pub use loyalty::{LoyaltyAccount, LoyaltyError, LoyaltyEvent, LoyaltyService, Tier};
pub use money::{Money, Rate};
pub use order::{Order, OrderError, OrderEvent, OrderService, OrderStatus, TransitionPolicy};
pub use settings::Settings;

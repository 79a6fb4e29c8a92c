//! Shared types for the bakery backend.
//!
//! Identifiers, the acting user's identity and the clock abstraction used by
//! every other crate in the workspace.

pub mod clock;
pub mod identity;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use identity::{Actor, Role};
pub use types::{AggregateId, UserId};

//! Checkout step names, recorded in logs and compensation errors.

/// Snapshot the cart into a pending order.
pub const STEP_PLACE_ORDER: &str = "place_order";

/// Debit the loyalty points the customer chose to redeem.
pub const STEP_REDEEM_POINTS: &str = "redeem_points";

/// Empty the cart.
pub const STEP_CLEAR_CART: &str = "clear_cart";

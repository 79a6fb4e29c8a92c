//! Business constants shared by the aggregates.

use chrono::Duration;
use common::Role;
use rust_decimal::Decimal;

use crate::location::GeoPoint;
use crate::money::{Money, Rate};

/// Configured pricing, limits and delivery parameters.
///
/// `Default` holds the shop's standard values; the API overrides
/// individual fields from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// VAT applied to the subtotal.
    pub tax_rate: Rate,
    /// Currency value of one loyalty point.
    pub point_value: Money,
    /// Points earned per currency unit spent.
    pub points_per_currency_unit: Decimal,
    /// Fee charged on delivery-type orders.
    pub delivery_fee: Money,
    /// Maximum quantity of a single cart line.
    pub max_item_quantity: u32,
    /// Maximum number of units across a cart.
    pub max_cart_units: u32,
    /// Cart lines expire this long after the cart was last touched.
    pub cart_ttl: Duration,
    /// Lifetime of earned points; `None` means they never expire.
    pub points_ttl: Option<Duration>,
    pub order_number_prefix: String,
    /// Where deliveries start from.
    pub bakery_origin: GeoPoint,
    pub average_speed_kmh: f64,
    /// Roles allowed to force cancellations and refunds.
    pub override_roles: Vec<Role>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tax_rate: Rate::percent(23),
            point_value: Money::from_cents(1),
            points_per_currency_unit: Decimal::ONE,
            delivery_fee: Money::from_cents(250),
            max_item_quantity: 50,
            max_cart_units: 100,
            cart_ttl: Duration::hours(24),
            points_ttl: Some(Duration::days(365)),
            order_number_prefix: "SP".to_string(),
            bakery_origin: GeoPoint {
                lat: 38.7223,
                lng: -9.1393,
            },
            average_speed_kmh: 30.0,
            override_roles: vec![Role::Staff, Role::Admin],
        }
    }
}

impl Settings {
    /// Currency value of `points` loyalty points, unrounded.
    pub fn points_value(&self, points: u64) -> Money {
        Money::new(self.point_value.amount() * Decimal::from(points))
    }

    pub fn can_override(&self, role: Role) -> bool {
        self.override_roles.contains(&role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shop_rules() {
        let settings = Settings::default();
        assert_eq!(settings.tax_rate, Rate::percent(23));
        assert_eq!(settings.points_value(100), Money::from_units(1));
        assert_eq!(settings.cart_ttl, Duration::hours(24));
        assert!(settings.can_override(Role::Admin));
        assert!(!settings.can_override(Role::Customer));
    }
}

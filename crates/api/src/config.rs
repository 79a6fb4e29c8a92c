//! Application configuration loaded from environment variables.

use chrono::Duration;
use domain::{GeoPoint, Money, Rate, Settings};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration with defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `DATABASE_URL`: PostgreSQL store when set, in-memory otherwise
/// - `BAKERY_*`: overrides for individual [`Settings`] fields
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub settings: Settings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        let mut settings = defaults.settings;

        if let Some(percent) = parse::<u32>(&get, "BAKERY_TAX_RATE_PERCENT")? {
            settings.tax_rate = Rate::percent(percent);
        }
        if let Some(cents) = parse::<i64>(&get, "BAKERY_DELIVERY_FEE_CENTS")? {
            settings.delivery_fee = Money::from_cents(cents);
        }
        if let Some(cents) = parse::<i64>(&get, "BAKERY_POINT_VALUE_CENTS")? {
            settings.point_value = Money::from_cents(cents);
        }
        if let Some(quantity) = parse(&get, "BAKERY_MAX_ITEM_QUANTITY")? {
            settings.max_item_quantity = quantity;
        }
        if let Some(units) = parse(&get, "BAKERY_MAX_CART_UNITS")? {
            settings.max_cart_units = units;
        }
        if let Some(hours) = parse::<i64>(&get, "BAKERY_CART_TTL_HOURS")? {
            settings.cart_ttl = Duration::hours(hours);
        }
        // Zero days keeps earned points forever.
        if let Some(days) = parse::<i64>(&get, "BAKERY_POINTS_TTL_DAYS")? {
            settings.points_ttl = (days > 0).then(|| Duration::days(days));
        }
        if let Some(prefix) = get("BAKERY_ORDER_PREFIX") {
            settings.order_number_prefix = prefix;
        }
        if let Some(speed) = parse::<f64>(&get, "BAKERY_AVERAGE_SPEED_KMH")? {
            if speed.is_nan() || speed <= 0.0 {
                return Err(ConfigError::Invalid {
                    name: "BAKERY_AVERAGE_SPEED_KMH",
                    value: speed.to_string(),
                });
            }
            settings.average_speed_kmh = speed;
        }
        let lat = parse::<f64>(&get, "BAKERY_ORIGIN_LAT")?;
        let lng = parse::<f64>(&get, "BAKERY_ORIGIN_LNG")?;
        if lat.is_some() || lng.is_some() {
            let lat = lat.unwrap_or(settings.bakery_origin.lat);
            let lng = lng.unwrap_or(settings.bakery_origin.lng);
            settings.bakery_origin = GeoPoint::new(lat, lng).map_err(|_| ConfigError::Invalid {
                name: "BAKERY_ORIGIN_LAT/LNG",
                value: format!("{lat},{lng}"),
            })?;
        }

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse(&get, "PORT")?.unwrap_or(defaults.port),
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: get("DATABASE_URL"),
            settings,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    get(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value })
        })
        .transpose()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            settings: Settings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.settings.tax_rate, Rate::percent(23));
        assert_eq!(config.settings.order_number_prefix, "SP");
    }

    #[test]
    fn server_variables_are_read() {
        let config = config(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://bakery@localhost/bakery"),
        ])
        .unwrap();
        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://bakery@localhost/bakery")
        );
    }

    #[test]
    fn bakery_overrides_replace_settings() {
        let config = config(&[
            ("BAKERY_TAX_RATE_PERCENT", "6"),
            ("BAKERY_DELIVERY_FEE_CENTS", "300"),
            ("BAKERY_POINTS_TTL_DAYS", "0"),
            ("BAKERY_ORDER_PREFIX", "PO"),
            ("BAKERY_ORIGIN_LAT", "41.1496"),
            ("BAKERY_ORIGIN_LNG", "-8.6109"),
        ])
        .unwrap();
        let settings = config.settings;
        assert_eq!(settings.tax_rate, Rate::percent(6));
        assert_eq!(settings.delivery_fee, Money::from_cents(300));
        assert!(settings.points_ttl.is_none());
        assert_eq!(settings.order_number_prefix, "PO");
        assert_eq!(settings.bakery_origin.lat, 41.1496);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "PORT",
                value: "eighty".into()
            }
        );
        assert!(config(&[("BAKERY_ORIGIN_LAT", "123")]).is_err());
        assert!(config(&[("BAKERY_AVERAGE_SPEED_KMH", "0")]).is_err());
    }
}

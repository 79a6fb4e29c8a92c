//! Coordinates, addresses and great-circle distance.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Number of location fixes kept per delivery.
pub const LOCATION_HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("Latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    #[error("Longitude {0} is outside [-180, 180]")]
    Longitude(f64),

    #[error("Accuracy {0} must be a non-negative number of meters")]
    Accuracy(f64),
}

/// A WGS84 coordinate pair.
///
/// Deserialization goes through [`GeoPoint::new`], so out-of-range input is
/// rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Deserialize)]
struct RawGeoPoint {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = LocationError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(raw.lat, raw.lng)
    }
}

impl GeoPoint {
    /// Creates a point, rejecting out-of-range or non-finite coordinates.
    pub fn new(lat: f64, lng: f64) -> Result<Self, LocationError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(LocationError::Latitude(lat));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(LocationError::Longitude(lng));
        }
        Ok(Self { lat, lng })
    }

    /// Haversine distance in kilometers.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// A postal address, optionally geocoded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
}

impl Address {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            postal_code: postal_code.into(),
            coordinates: None,
        }
    }

    pub fn with_coordinates(mut self, point: GeoPoint) -> Self {
        self.coordinates = Some(point);
        self
    }
}

/// One reported courier position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub point: GeoPoint,
    /// Reported accuracy radius in meters.
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(
        lat: f64,
        lng: f64,
        accuracy: Option<f64>,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, LocationError> {
        if let Some(accuracy) = accuracy
            && (!accuracy.is_finite() || accuracy < 0.0)
        {
            return Err(LocationError::Accuracy(accuracy));
        }
        Ok(Self {
            point: GeoPoint::new(lat, lng)?,
            accuracy,
            recorded_at,
        })
    }
}

/// Fixed-capacity location history; the oldest fix is dropped first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationHistory {
    fixes: VecDeque<LocationFix>,
}

impl LocationHistory {
    pub fn push(&mut self, fix: LocationFix) {
        if self.fixes.len() == LOCATION_HISTORY_CAPACITY {
            self.fixes.pop_front();
        }
        self.fixes.push_back(fix);
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    pub fn latest(&self) -> Option<&LocationFix> {
        self.fixes.back()
    }

    pub fn oldest(&self) -> Option<&LocationFix> {
        self.fixes.front()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LocationFix> {
        self.fixes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lisbon() -> GeoPoint {
        GeoPoint::new(38.7223, -9.1393).unwrap()
    }

    fn porto() -> GeoPoint {
        GeoPoint::new(41.1579, -8.6291).unwrap()
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(lisbon().distance_km(&lisbon()), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let there = lisbon().distance_km(&porto());
        let back = porto().distance_km(&lisbon());
        assert!((there - back).abs() < 1e-9);
        assert!((there - 274.0).abs() < 2.0, "got {there}");
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert_eq!(GeoPoint::new(91.0, 0.0), Err(LocationError::Latitude(91.0)));
        assert_eq!(GeoPoint::new(0.0, -180.5), Err(LocationError::Longitude(-180.5)));
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(LocationFix::new(0.0, 0.0, Some(-1.0), Utc::now()).is_err());
    }

    #[test]
    fn deserializing_checks_the_range() {
        let point: GeoPoint = serde_json::from_str(r#"{"lat":38.7223,"lng":-9.1393}"#).unwrap();
        assert_eq!(point, lisbon());

        let err = serde_json::from_str::<GeoPoint>(r#"{"lat":500,"lng":0}"#).unwrap_err();
        assert!(err.to_string().contains("Latitude 500"));
        let address = serde_json::from_str::<Address>(
            r#"{"street":"Rua Augusta 1","city":"Lisboa","postal_code":"1100-048","coordinates":{"lat":0,"lng":9000}}"#,
        );
        assert!(address.is_err());
    }

    #[test]
    fn history_keeps_last_hundred() {
        let start = Utc::now();
        let mut history = LocationHistory::default();
        for i in 0..105 {
            let fix = LocationFix::new(
                38.0 + f64::from(i) * 0.001,
                -9.0,
                None,
                start + chrono::Duration::seconds(i64::from(i)),
            )
            .unwrap();
            history.push(fix);
        }

        assert_eq!(history.len(), LOCATION_HISTORY_CAPACITY);
        assert_eq!(history.oldest().unwrap().recorded_at, start + chrono::Duration::seconds(5));
        assert_eq!(history.latest().unwrap().recorded_at, start + chrono::Duration::seconds(104));
    }
}

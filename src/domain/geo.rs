//! Geospatial primitives.
//!
//! Distances are great-circle distances on a sphere of radius
//! [`EARTH_RADIUS_KM`], computed with the haversine formula. Radius queries
//! are inclusive at the boundary, pinned by [`DISTANCE_EPSILON_KM`] so that
//! an entity at exactly the query radius is always inside regardless of
//! floating-point jitter.

use serde::{Deserialize, Serialize};

/// Mean Earth radius, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Slack applied to radius comparisons: one millimetre, in kilometres.
pub const DISTANCE_EPSILON_KM: f64 = 1e-6;

/// A validated longitude/latitude pair, in degrees.
///
/// Construction is the only fallible operation; a stored `Coordinates` is
/// always in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates", into = "RawCoordinates")]
pub struct Coordinates {
    longitude: f64,
    latitude: f64,
}

/// Unvalidated serialized form of [`Coordinates`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawCoordinates {
    longitude: f64,
    latitude: f64,
}

impl Coordinates {
    /// Creates coordinates from a longitude and latitude in degrees.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatesError`] if the longitude is outside
    /// [-180, 180] or the latitude is outside [-90, 90].
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, CoordinatesError> {
        // NaN fails both range checks, so it is rejected here too.
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinatesError::Longitude(longitude));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinatesError::Latitude(latitude));
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Great-circle distance to `other`, in kilometres.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }

    /// Whether `other` lies within `radius_km` of this point.
    ///
    /// Inclusive at the boundary: a point at exactly `radius_km` is inside.
    #[must_use]
    pub fn is_within_km(&self, other: &Self, radius_km: f64) -> bool {
        self.distance_km(other) <= radius_km + DISTANCE_EPSILON_KM
    }
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = CoordinatesError;

    fn try_from(raw: RawCoordinates) -> Result<Self, Self::Error> {
        Self::new(raw.longitude, raw.latitude)
    }
}

impl From<Coordinates> for RawCoordinates {
    fn from(coordinates: Coordinates) -> Self {
        Self {
            longitude: coordinates.longitude,
            latitude: coordinates.latitude,
        }
    }
}

/// Error returned when a longitude or latitude is out of range.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CoordinatesError {
    /// The longitude is outside [-180, 180] degrees.
    #[error("longitude {0} is outside the valid range [-180, 180]")]
    Longitude(f64),
    /// The latitude is outside [-90, 90] degrees.
    #[error("latitude {0} is outside the valid range [-90, 90]")]
    Latitude(f64),
}

impl CoordinatesError {
    /// Classifies the error for transport mapping.
    #[must_use]
    pub const fn kind(&self) -> crate::domain::ErrorKind {
        crate::domain::ErrorKind::Validation
    }
}

//! Domain types shared across the tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unix seconds of the "never updated" sentinel (2000-01-01T00:00:00Z).
pub const NEVER_UPDATED_TS: i64 = 946_684_800;

/// Timestamp stamped on locations that have never received a reading.
pub fn never_updated() -> DateTime<Utc> {
    DateTime::from_timestamp(NEVER_UPDATED_TS, 0).unwrap_or_default()
}

/// Store-assigned identity of a tracked location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationId(pub i64);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationValidationError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
    #[error("location name must not be empty")]
    EmptyName,
    #[error("reading {0} is not a finite number")]
    NonFiniteReading(f64),
    #[error("location {0} has a reading but was never updated")]
    ReadingWithoutTimestamp(LocationId),
}

// ── Coordinates ──────────────────────────────────────────────────────

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LocationValidationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(LocationValidationError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationValidationError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

// ── Locations ────────────────────────────────────────────────────────

/// Template used to rebuild tracked locations on reset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefaultLocation {
    pub name: String,
    pub coordinates: Coordinates,
}

impl DefaultLocation {
    pub fn new(
        name: impl Into<String>,
        coordinates: Coordinates,
    ) -> Result<Self, LocationValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LocationValidationError::EmptyName);
        }
        Ok(Self { name, coordinates })
    }
}

/// A location whose temperature the tracker maintains.
///
/// `reading` and `last_updated` only change together through
/// [`TrackedLocation::record_reading`]; coordinates are fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedLocation {
    id: LocationId,
    name: String,
    coordinates: Coordinates,
    reading: Option<f64>,
    last_updated: DateTime<Utc>,
}

impl TrackedLocation {
    /// A location that has never been fetched.
    pub fn new(id: LocationId, name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            id,
            name: name.into(),
            coordinates,
            reading: None,
            last_updated: never_updated(),
        }
    }

    /// Rebuild a location from persisted columns. Run `validate` on the result
    /// before trusting it.
    pub fn from_parts(
        id: LocationId,
        name: impl Into<String>,
        coordinates: Coordinates,
        reading: Option<f64>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            coordinates,
            reading,
            last_updated,
        }
    }

    pub fn id(&self) -> LocationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    /// Last fetched temperature in °C. `None` means never fetched; zero and
    /// negative values are ordinary readings.
    pub fn reading(&self) -> Option<f64> {
        self.reading
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn is_never_fetched(&self) -> bool {
        self.reading.is_none()
    }

    /// Store a fresh reading. The timestamp never moves backwards.
    pub fn record_reading(&mut self, celsius: f64, at: DateTime<Utc>) {
        self.reading = Some(celsius);
        self.last_updated = self.last_updated.max(at);
    }

    /// True if the reading/timestamp pair differs from `other`'s.
    pub fn reading_differs(&self, other: &TrackedLocation) -> bool {
        self.reading != other.reading || self.last_updated != other.last_updated
    }

    pub fn validate(&self) -> Result<(), LocationValidationError> {
        if self.name.trim().is_empty() {
            return Err(LocationValidationError::EmptyName);
        }
        if let Some(value) = self.reading {
            if !value.is_finite() {
                return Err(LocationValidationError::NonFiniteReading(value));
            }
            if self.last_updated <= never_updated() {
                return Err(LocationValidationError::ReadingWithoutTimestamp(self.id));
            }
        }
        Ok(())
    }
}

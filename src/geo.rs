// src/geo.rs
//! Requester/demand locations, great-circle distance, and the three-valued
//! proximity outcome used by the hyper-local similarity filter.

use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Latitude/longitude in degrees. Serialized as `[lat, lon]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl From<[f64; 2]> for Coordinates {
    fn from(v: [f64; 2]) -> Self {
        Self { lat: v[0], lon: v[1] }
    }
}

impl From<Coordinates> for [f64; 2] {
    fn from(c: Coordinates) -> Self {
        [c.lat, c.lon]
    }
}

/// Structured address as stored on demands and users.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl Location {
    pub fn at(lat: f64, lon: f64) -> Self {
        Self {
            coordinates: Some(Coordinates::new(lat, lon)),
            ..Self::default()
        }
    }
}

/// Haversine distance in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lon.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lon.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GeoOutcome {
    Within { distance_km: f64 },
    Beyond { distance_km: f64 },
    /// One side has no usable coordinates.
    Indeterminate,
}

/// What to do with a candidate whose proximity cannot be computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndeterminatePolicy {
    Include,
    #[default]
    Exclude,
}

impl IndeterminatePolicy {
    pub fn admits(self, outcome: GeoOutcome) -> bool {
        match outcome {
            GeoOutcome::Within { .. } => true,
            GeoOutcome::Beyond { .. } => false,
            GeoOutcome::Indeterminate => self == IndeterminatePolicy::Include,
        }
    }
}

/// Classify the distance between two optional locations against `radius_km`.
pub fn proximity(a: Option<&Location>, b: Option<&Location>, radius_km: f64) -> GeoOutcome {
    let coords = |l: Option<&Location>| l.and_then(|l| l.coordinates).filter(|c| c.is_valid());
    match (coords(a), coords(b)) {
        (Some(x), Some(y)) => {
            let distance_km = haversine_km(x, y);
            if distance_km <= radius_km {
                GeoOutcome::Within { distance_km }
            } else {
                GeoOutcome::Beyond { distance_km }
            }
        }
        _ => GeoOutcome::Indeterminate,
    }
}

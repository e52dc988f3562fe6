//! Shared geospatial value objects.
//!
//! Everything here is a request-scoped immutable value: created by one
//! pipeline stage, passed by value to the next, never persisted.

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

// ── Coordinates ──────────────────────────────────────────────────

/// A WGS-84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Reject out-of-range coordinates before any provider call is made.
    pub fn validate(&self) -> ApiResult<()> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(ApiError::validation(format!(
                "latitude {} outside [-90, 90]",
                self.lat
            )));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(ApiError::validation(format!(
                "longitude {} outside [-180, 180]",
                self.lng
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

// ── Resolved place ───────────────────────────────────────────────

/// A concrete, coordinate-bearing location derived from an ambiguous
/// text reference (or from a coordinate pair via reverse geocoding).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPlace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    pub formatted_address: String,
    pub location: LatLng,
}

/// A nearby-search hit. Carries the extra presentation fields the
/// places backend exposes for list results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyPlace {
    pub name: String,
    pub address: String,
    pub location: LatLng,
    pub place_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_now: Option<bool>,
    #[serde(default)]
    pub types: Vec<String>,
}

/// Full place details looked up by place ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceDetails {
    pub name: String,
    pub address: String,
    pub location: LatLng,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_now: Option<bool>,
}

/// One autocomplete suggestion, order preserved from the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutocompletePrediction {
    pub description: String,
    pub place_id: String,
    pub main_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_text: Option<String>,
}

// ── Travel mode ──────────────────────────────────────────────────

/// Travel mode for route computation. Walking is the default: the
/// primary client is a pedestrian assistive-navigation app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Driving,
    #[default]
    Walking,
    Bicycling,
    Transit,
}

impl TravelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Driving => "driving",
            Self::Walking => "walking",
            Self::Bicycling => "bicycling",
            Self::Transit => "transit",
        }
    }

    /// Parse from a request parameter (case-insensitive).
    pub fn from_param(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "driving" => Some(Self::Driving),
            "walking" => Some(Self::Walking),
            "bicycling" => Some(Self::Bicycling),
            "transit" => Some(Self::Transit),
            _ => None,
        }
    }
}

// ── Maneuver ─────────────────────────────────────────────────────

/// Directional maneuver for a route step. Unknown or omitted provider
/// values collapse to `Straight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Maneuver {
    #[default]
    Straight,
    TurnLeft,
    TurnRight,
    TurnSlightLeft,
    TurnSlightRight,
    TurnSharpLeft,
    TurnSharpRight,
    UturnLeft,
    UturnRight,
    RampLeft,
    RampRight,
    Merge,
    ForkLeft,
    ForkRight,
    Ferry,
    FerryTrain,
    RoundaboutLeft,
    RoundaboutRight,
}

impl Maneuver {
    /// Map a raw provider maneuver string, defaulting to `Straight`.
    pub fn from_provider(value: Option<&str>) -> Self {
        match value {
            Some("turn-left") => Self::TurnLeft,
            Some("turn-right") => Self::TurnRight,
            Some("turn-slight-left") => Self::TurnSlightLeft,
            Some("turn-slight-right") => Self::TurnSlightRight,
            Some("turn-sharp-left") => Self::TurnSharpLeft,
            Some("turn-sharp-right") => Self::TurnSharpRight,
            Some("uturn-left") => Self::UturnLeft,
            Some("uturn-right") => Self::UturnRight,
            Some("ramp-left") => Self::RampLeft,
            Some("ramp-right") => Self::RampRight,
            Some("merge") => Self::Merge,
            Some("fork-left") => Self::ForkLeft,
            Some("fork-right") => Self::ForkRight,
            Some("ferry") => Self::Ferry,
            Some("ferry-train") => Self::FerryTrain,
            Some("roundabout-left") => Self::RoundaboutLeft,
            Some("roundabout-right") => Self::RoundaboutRight,
            _ => Self::Straight,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latlng_in_range_is_valid() {
        assert!(LatLng::new(37.5665, 126.978).validate().is_ok());
        assert!(LatLng::new(-90.0, 180.0).validate().is_ok());
        assert!(LatLng::new(90.0, -180.0).validate().is_ok());
    }

    #[test]
    fn latlng_out_of_range_is_rejected() {
        assert!(LatLng::new(90.1, 0.0).validate().is_err());
        assert!(LatLng::new(-91.0, 0.0).validate().is_err());
        assert!(LatLng::new(0.0, 180.5).validate().is_err());
        assert!(LatLng::new(0.0, -181.0).validate().is_err());
        assert!(LatLng::new(f64::NAN, 0.0).validate().is_err());
    }

    #[test]
    fn travel_mode_defaults_to_walking() {
        assert_eq!(TravelMode::default(), TravelMode::Walking);
        assert_eq!(TravelMode::from_param("TRANSIT"), Some(TravelMode::Transit));
        assert_eq!(TravelMode::from_param("hoverboard"), None);
    }

    #[test]
    fn maneuver_unknown_defaults_to_straight() {
        assert_eq!(Maneuver::from_provider(None), Maneuver::Straight);
        assert_eq!(Maneuver::from_provider(Some("moonwalk")), Maneuver::Straight);
        assert_eq!(
            Maneuver::from_provider(Some("turn-slight-right")),
            Maneuver::TurnSlightRight
        );
    }

    #[test]
    fn maneuver_serializes_kebab_case() {
        let json = serde_json::to_string(&Maneuver::TurnSlightLeft).unwrap();
        assert_eq!(json, "\"turn-slight-left\"");
    }
}

//! Google Maps Web Service client.
//!
//! One consolidated client for the three geospatial capabilities:
//! geocoding (forward + reverse), places (nearby, autocomplete, details)
//! and directions. The response-level `status` field is mapped to the
//! error taxonomy in one place so call sites cannot diverge.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{
    with_retry, DirectionsProvider, Geocoder, PlacesProvider, RawLeg, RawRoute, RawStep,
    AUTOCOMPLETE_BIAS_RADIUS_M,
};
use crate::config::MapsConfig;
use crate::error::{ApiError, ApiResult};
use crate::types::{AutocompletePrediction, LatLng, NearbyPlace, PlaceDetails, ResolvedPlace, TravelMode};

/// Canonical place-details field mask. Documented once; every details
/// lookup uses exactly this contract.
const DETAILS_FIELDS: &str =
    "name,formatted_address,geometry,rating,opening_hours,formatted_phone_number";

// ── Wire shapes ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    place_id: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<ApiRoute>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRoute {
    overview_polyline: ApiPolyline,
    #[serde(default)]
    legs: Vec<ApiLeg>,
}

#[derive(Debug, Deserialize)]
struct ApiPolyline {
    points: String,
}

#[derive(Debug, Deserialize)]
struct ApiLeg {
    distance: TextValue,
    duration: TextValue,
    #[serde(default)]
    start_address: String,
    #[serde(default)]
    end_address: String,
    #[serde(default)]
    steps: Vec<ApiStep>,
}

/// Google's `{text, value}` pair: `value` is the integer base unit
/// (meters / seconds), `text` a localized rendering.
#[derive(Debug, Deserialize)]
struct TextValue {
    text: String,
    value: i64,
}

#[derive(Debug, Deserialize)]
struct ApiStep {
    #[serde(default)]
    html_instructions: String,
    distance: TextValue,
    duration: TextValue,
    start_location: LatLng,
    end_location: LatLng,
    maneuver: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<NearbyResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NearbyResult {
    name: String,
    #[serde(default)]
    vicinity: String,
    place_id: String,
    geometry: Geometry,
    rating: Option<f64>,
    opening_hours: Option<OpeningHours>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OpeningHours {
    open_now: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct AutocompleteResponse {
    status: String,
    #[serde(default)]
    predictions: Vec<Prediction>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    description: String,
    place_id: String,
    structured_formatting: StructuredFormatting,
}

#[derive(Debug, Deserialize)]
struct StructuredFormatting {
    main_text: String,
    secondary_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    result: Option<DetailsResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResult {
    #[serde(default)]
    name: String,
    #[serde(default)]
    formatted_address: String,
    geometry: Geometry,
    rating: Option<f64>,
    opening_hours: Option<OpeningHours>,
    formatted_phone_number: Option<String>,
}

// ── Status mapping ───────────────────────────────────────────────

/// Map the response-level status to the error taxonomy.
///
/// `OK` and `ZERO_RESULTS` are both successful transports — an empty
/// result set is a valid outcome, distinct from a provider failure.
fn check_status(status: &str, error_message: Option<&str>) -> ApiResult<()> {
    match status {
        "OK" | "ZERO_RESULTS" | "NOT_FOUND" => Ok(()),
        "REQUEST_DENIED" => Err(ApiError::configuration(format!(
            "maps backend denied the request: {}",
            error_message.unwrap_or("check API key and enabled APIs")
        ))),
        other => Err(ApiError::provider(format!(
            "maps backend returned status {other}: {}",
            error_message.unwrap_or("no detail")
        ))),
    }
}

// ── Client ───────────────────────────────────────────────────────

/// Consolidated Google Maps client.
pub struct MapsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl MapsClient {
    pub fn new(config: &MapsConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().unwrap_or_default(),
            max_retries: config.max_retries,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> ApiResult<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::provider(format!(
                "maps backend returned HTTP {status}"
            )));
        }
        Ok(response.json().await?)
    }

    fn geocode_results(results: Vec<GeocodeResult>) -> Vec<ResolvedPlace> {
        results
            .into_iter()
            .map(|r| ResolvedPlace {
                place_id: Some(r.place_id),
                formatted_address: r.formatted_address,
                location: r.geometry.location,
            })
            .collect()
    }
}

#[async_trait]
impl Geocoder for MapsClient {
    async fn geocode(&self, address: &str) -> ApiResult<Vec<ResolvedPlace>> {
        let body: GeocodeResponse = with_retry(self.max_retries, || async move {
            self.get_json("/geocode/json", &[("address", address.to_string())])
                .await
        })
        .await?;
        check_status(&body.status, body.error_message.as_deref())?;
        Ok(Self::geocode_results(body.results))
    }

    async fn reverse_geocode(&self, point: LatLng) -> ApiResult<Vec<ResolvedPlace>> {
        let body: GeocodeResponse = with_retry(self.max_retries, || async move {
            self.get_json("/geocode/json", &[("latlng", point.to_string())])
                .await
        })
        .await?;
        check_status(&body.status, body.error_message.as_deref())?;
        Ok(Self::geocode_results(body.results))
    }
}

#[async_trait]
impl PlacesProvider for MapsClient {
    async fn nearby(
        &self,
        center: LatLng,
        category: &str,
        radius_m: u32,
    ) -> ApiResult<Vec<NearbyPlace>> {
        let body: NearbyResponse = with_retry(self.max_retries, || async move {
            self.get_json(
                "/place/nearbysearch/json",
                &[
                    ("location", center.to_string()),
                    ("radius", radius_m.to_string()),
                    ("type", category.to_string()),
                ],
            )
            .await
        })
        .await?;
        check_status(&body.status, body.error_message.as_deref())?;
        Ok(body
            .results
            .into_iter()
            .map(|r| NearbyPlace {
                name: r.name,
                address: r.vicinity,
                location: r.geometry.location,
                place_id: r.place_id,
                rating: r.rating,
                open_now: r.opening_hours.and_then(|h| h.open_now),
                types: r.types,
            })
            .collect())
    }

    async fn autocomplete(
        &self,
        query: &str,
        bias: Option<LatLng>,
    ) -> ApiResult<Vec<AutocompletePrediction>> {
        let mut params = vec![("input", query.to_string())];
        if let Some(bias) = bias {
            params.push(("location", bias.to_string()));
            params.push(("radius", AUTOCOMPLETE_BIAS_RADIUS_M.to_string()));
        }
        let body: AutocompleteResponse = with_retry(self.max_retries, || {
            self.get_json("/place/autocomplete/json", &params)
        })
        .await?;
        check_status(&body.status, body.error_message.as_deref())?;
        Ok(body
            .predictions
            .into_iter()
            .map(|p| AutocompletePrediction {
                description: p.description,
                place_id: p.place_id,
                main_text: p.structured_formatting.main_text,
                secondary_text: p.structured_formatting.secondary_text,
            })
            .collect())
    }

    async fn details(&self, place_id: &str) -> ApiResult<Option<PlaceDetails>> {
        let body: DetailsResponse = with_retry(self.max_retries, || async move {
            self.get_json(
                "/place/details/json",
                &[
                    ("place_id", place_id.to_string()),
                    ("fields", DETAILS_FIELDS.to_string()),
                ],
            )
            .await
        })
        .await?;
        check_status(&body.status, body.error_message.as_deref())?;
        Ok(body.result.map(|place| PlaceDetails {
            name: place.name,
            address: place.formatted_address,
            location: place.geometry.location,
            rating: place.rating,
            phone_number: place.formatted_phone_number,
            open_now: place.opening_hours.and_then(|h| h.open_now),
        }))
    }
}

#[async_trait]
impl DirectionsProvider for MapsClient {
    async fn directions(
        &self,
        origin: LatLng,
        destination: LatLng,
        mode: TravelMode,
    ) -> ApiResult<Vec<RawRoute>> {
        let body: DirectionsResponse = with_retry(self.max_retries, || async move {
            self.get_json(
                "/directions/json",
                &[
                    ("origin", origin.to_string()),
                    ("destination", destination.to_string()),
                    ("mode", mode.as_str().to_string()),
                    // Ask for alternatives; callers still take the
                    // provider's primary route as canonical.
                    ("alternatives", "true".to_string()),
                ],
            )
            .await
        })
        .await?;
        check_status(&body.status, body.error_message.as_deref())?;

        Ok(body
            .routes
            .into_iter()
            .map(|route| RawRoute {
                polyline: route.overview_polyline.points,
                legs: route
                    .legs
                    .into_iter()
                    .map(|leg| RawLeg {
                        distance_meters: leg.distance.value.max(0) as u32,
                        duration_seconds: leg.duration.value.max(0) as u32,
                        start_address: leg.start_address,
                        end_address: leg.end_address,
                        steps: leg
                            .steps
                            .into_iter()
                            .map(|step| RawStep {
                                instruction: step.html_instructions,
                                distance_text: step.distance.text,
                                duration_text: step.duration.text,
                                start_location: step.start_location,
                                end_location: step.end_location,
                                maneuver: step.maneuver,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect())
    }
}

// ── Tests ────────────────────────────────────────────────────────

//! Capability traits for the five external collaborators.
//!
//! Every upstream the pipeline depends on — text generation, vision
//! generation, geocoding, places, directions — is abstracted as a trait
//! object injected at construction. This keeps the stages substitutable
//! with fakes in tests and avoids process-wide singletons.

pub mod gemini;
pub mod maps;

pub use gemini::GeminiClient;
pub use maps::MapsClient;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::types::{AutocompletePrediction, LatLng, NearbyPlace, PlaceDetails, ResolvedPlace, TravelMode};

/// Bias radius applied to autocomplete when a bias location is given.
pub const AUTOCOMPLETE_BIAS_RADIUS_M: u32 = 50_000;

/// Base delay for the exponential retry backoff.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

// ── Generation capabilities ──────────────────────────────────────

/// Prompt → JSON-constrained text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_json(&self, prompt: &str) -> ApiResult<String>;
}

/// Image + prompt → JSON-constrained text.
#[async_trait]
pub trait VisionGenerator: Send + Sync {
    async fn analyze_image(&self, prompt: &str, image: &[u8], mime_type: &str)
        -> ApiResult<String>;
}

// ── Geospatial capabilities ──────────────────────────────────────

/// Address ↔ coordinates. Returns provider-ranked candidate lists; the
/// selection policy (first match, empty → `NotFound`) lives in the
/// `PlaceResolver`, not here.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> ApiResult<Vec<ResolvedPlace>>;
    async fn reverse_geocode(&self, point: LatLng) -> ApiResult<Vec<ResolvedPlace>>;
}

/// Nearby search, autocomplete, and place details.
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    async fn nearby(
        &self,
        center: LatLng,
        category: &str,
        radius_m: u32,
    ) -> ApiResult<Vec<NearbyPlace>>;

    async fn autocomplete(
        &self,
        query: &str,
        bias: Option<LatLng>,
    ) -> ApiResult<Vec<AutocompletePrediction>>;

    /// `Ok(None)` means the place ID is stale or unknown.
    async fn details(&self, place_id: &str) -> ApiResult<Option<PlaceDetails>>;
}

/// Origin + destination + mode → provider-ranked routes. Alternatives
/// are requested when supported; callers take the first route as
/// canonical.
#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    async fn directions(
        &self,
        origin: LatLng,
        destination: LatLng,
        mode: TravelMode,
    ) -> ApiResult<Vec<RawRoute>>;
}

// ── Raw directions shapes ────────────────────────────────────────
//
// Unit normalization happens at the provider boundary: distances are
// already integer meters and durations integer seconds by the time a
// RawRoute leaves a DirectionsProvider. Instruction text is still raw
// provider markup; the InstructionSynthesizer cleans it.

#[derive(Debug, Clone)]
pub struct RawRoute {
    pub polyline: String,
    pub legs: Vec<RawLeg>,
}

#[derive(Debug, Clone)]
pub struct RawLeg {
    pub distance_meters: u32,
    pub duration_seconds: u32,
    pub start_address: String,
    pub end_address: String,
    pub steps: Vec<RawStep>,
}

#[derive(Debug, Clone)]
pub struct RawStep {
    /// Raw instruction text, may contain markup.
    pub instruction: String,
    pub distance_text: String,
    pub duration_text: String,
    pub start_location: LatLng,
    pub end_location: LatLng,
    pub maneuver: Option<String>,
}

/// Strip a Markdown code fence if a model wrapped its JSON in one.
/// JSON-constrained generation makes this rare but not impossible.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    else {
        return trimmed;
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

// ── Retry ────────────────────────────────────────────────────────

/// Run `op` with bounded retries and exponential backoff.
///
/// Only `Provider`-kind failures are retried; validation and not-found
/// results are deterministic for a given input and returned immediately.
pub async fn with_retry<T, F, Fut>(max_retries: u32, mut op: F) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Err(err) if err.kind.is_retryable() && attempt < max_retries => {
                let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "transient provider failure, retrying: {err}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

// ── Capability bundle ────────────────────────────────────────────

/// The full set of external capabilities, wired once at startup and
/// handed to each pipeline stage by `Arc`.
#[derive(Clone)]
pub struct Capabilities {
    pub text: Arc<dyn TextGenerator>,
    pub vision: Arc<dyn VisionGenerator>,
    pub geocoder: Arc<dyn Geocoder>,
    pub places: Arc<dyn PlacesProvider>,
    pub directions: Arc<dyn DirectionsProvider>,
}

/// Factory: build the live Gemini + Maps clients from config.
pub fn create_capabilities(config: &Config) -> ApiResult<Capabilities> {
    config.validate_keys()?;
    let gemini = Arc::new(GeminiClient::new(&config.gemini));
    let maps = Arc::new(MapsClient::new(&config.maps));
    Ok(Capabilities {
        text: gemini.clone(),
        vision: gemini,
        geocoder: maps.clone(),
        places: maps.clone(),
        directions: maps,
    })
}

// ── Tests ────────────────────────────────────────────────────────

//! Axum-based HTTP gateway.
//!
//! Transport plumbing for the pipeline: routing, CORS, request body
//! limits, request timeouts, and per-client rate limiting. Every handler
//! exits through the response envelope, so callers never see a raw
//! upstream error.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::config::Config;
use crate::error::{ApiError, ApiResult, ErrorKind};
use crate::intent::IntentClassifier;
use crate::obstacle::ObstacleAnalyzer;
use crate::place::PlaceResolver;
use crate::providers::{self, Capabilities};
use crate::response::Envelope;
use crate::route::{Destination, RouteComputer};
use crate::types::{LatLng, TravelMode};

/// Image MIME types accepted by the camera endpoint.
const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// How often the rate limiter sweeps stale client entries from its map.
const RATE_LIMITER_SWEEP_INTERVAL_SECS: u64 = 300;

// ── Rate limiting ────────────────────────────────────────────────

/// Sliding-window per-client rate limiter.
#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    limit_per_window: u32,
    window: Duration,
    requests: Mutex<(HashMap<String, Vec<Instant>>, Instant)>,
}

impl SlidingWindowRateLimiter {
    pub fn new(limit_per_window: u32, window: Duration) -> Self {
        Self {
            limit_per_window,
            window,
            requests: Mutex::new((HashMap::new(), Instant::now())),
        }
    }

    /// Whether `key` may make another request. A limit of 0 disables
    /// rate limiting entirely.
    pub fn allow(&self, key: &str) -> bool {
        if self.limit_per_window == 0 {
            return true;
        }

        let now = Instant::now();
        let cutoff = now.checked_sub(self.window).unwrap_or(now);

        let mut guard = self.requests.lock();
        let (requests, last_sweep) = &mut *guard;

        // Periodic sweep: drop clients with no recent requests
        if last_sweep.elapsed() >= Duration::from_secs(RATE_LIMITER_SWEEP_INTERVAL_SECS) {
            requests.retain(|_, timestamps| {
                timestamps.retain(|t| *t > cutoff);
                !timestamps.is_empty()
            });
            *last_sweep = now;
        }

        let entry = requests.entry(key.to_owned()).or_default();
        entry.retain(|instant| *instant > cutoff);

        if entry.len() >= self.limit_per_window as usize {
            return false;
        }

        entry.push(now);
        true
    }
}

fn client_key_from_headers(headers: &HeaderMap) -> String {
    for header_name in ["x-forwarded-for", "x-real-ip"] {
        if let Some(value) = headers.get(header_name).and_then(|v| v.to_str().ok()) {
            let first = value.split(',').next().unwrap_or("").trim();
            if !first.is_empty() {
                return first.to_owned();
            }
        }
    }
    "unknown".into()
}

// ── Shared state ─────────────────────────────────────────────────

/// Shared state for all axum handlers. Pipeline stages receive their
/// external capabilities at construction; handlers only dispatch.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<IntentClassifier>,
    pub resolver: PlaceResolver,
    pub routes: Arc<RouteComputer>,
    pub obstacles: Arc<ObstacleAnalyzer>,
    pub rate_limiter: Arc<SlidingWindowRateLimiter>,
    /// Suppresses diagnostic `details` in error envelopes.
    pub production: bool,
}

impl AppState {
    /// Wire the pipeline stages from a capability bundle.
    pub fn new(capabilities: Capabilities, config: &Config) -> Self {
        let resolver = PlaceResolver::new(capabilities.geocoder, capabilities.places);
        Self {
            classifier: Arc::new(IntentClassifier::new(capabilities.text)),
            routes: Arc::new(RouteComputer::new(capabilities.directions, resolver.clone())),
            resolver,
            obstacles: Arc::new(ObstacleAnalyzer::new(capabilities.vision)),
            rate_limiter: Arc::new(SlidingWindowRateLimiter::new(
                config.server.rate_limit_per_window,
                Duration::from_secs(config.server.rate_limit_window_secs),
            )),
            production: config.is_production(),
        }
    }
}

// ── Envelope helpers ─────────────────────────────────────────────

fn ok_json(data: impl serde::Serialize) -> Response {
    (StatusCode::OK, Json(Envelope::ok(data))).into_response()
}

fn fail(state: &AppState, err: ApiError) -> Response {
    let status =
        StatusCode::from_u16(err.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(code = err.code(), "request failed: {err}");
    } else {
        tracing::debug!(code = err.code(), "request rejected: {err}");
    }
    (status, Json(Envelope::err(&err, !state.production))).into_response()
}

/// Retag a pipeline failure with endpoint-level codes. Validation keeps
/// (or swaps) its 4xx code, configuration errors keep their own code,
/// and everything else gets the endpoint's failure code.
fn tag(err: ApiError, validation_code: &'static str, failure_code: &'static str) -> ApiError {
    match err.kind {
        ErrorKind::Validation => err.with_code(validation_code),
        ErrorKind::Configuration => err,
        _ => err.with_code(failure_code),
    }
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ── Request shapes ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParseIntentRequest {
    transcribed_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRequest {
    origin: Option<LatLng>,
    destination: Option<Destination>,
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoordsQuery {
    lat: Option<String>,
    lng: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NearbyQuery {
    lat: Option<String>,
    lng: Option<String>,
    #[serde(rename = "type")]
    category: Option<String>,
    radius: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AutocompleteQuery {
    query: Option<String>,
    lat: Option<String>,
    lng: Option<String>,
}

fn parse_coord(name: &str, value: Option<&str>) -> ApiResult<f64> {
    let raw =
        value.ok_or_else(|| ApiError::validation(format!("{name} query parameter is required")))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ApiError::validation(format!("{name} must be a valid number")))
}

// ── Handlers ─────────────────────────────────────────────────────

async fn handle_health() -> Response {
    Json(json!({
        "status": "ok",
        "message": "wayfinder backend is running",
        "timestamp": timestamp(),
    }))
    .into_response()
}

async fn handle_parse_intent(
    State(state): State<AppState>,
    body: Result<Json<ParseIntentRequest>, JsonRejection>,
) -> Response {
    let result = async {
        let Json(body) = body.map_err(|e| ApiError::validation(e.body_text()))?;
        let text = body
            .transcribed_text
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ApiError::validation("transcribedText is required and must be a string")
            })?;

        let intent = state.classifier.classify(&text).await?;
        let mut data = serde_json::to_value(&intent).unwrap_or(Value::Null);
        if let Some(obj) = data.as_object_mut() {
            obj.insert("originalText".into(), Value::String(text));
            obj.insert("timestamp".into(), Value::String(timestamp()));
        }
        Ok(data)
    }
    .await;

    match result {
        Ok(data) => ok_json(data),
        Err(err) => fail(&state, tag(err, "VALIDATION_ERROR", "INTENT_PARSE_ERROR")),
    }
}

async fn handle_analyze_obstacles(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    let result = async {
        let mut image: Option<(Vec<u8>, String)> = None;
        let mut context = Value::Object(Default::default());

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation(format!("malformed multipart body: {e}")))?
        {
            match field.name().unwrap_or_default() {
                "image" => {
                    let mime = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    if !ALLOWED_IMAGE_TYPES.contains(&mime.as_str()) {
                        return Err(ApiError::validation(format!(
                            "unsupported image type {mime}; expected one of {ALLOWED_IMAGE_TYPES:?}"
                        )));
                    }
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::validation(format!("failed to read image: {e}")))?;
                    image = Some((bytes.to_vec(), mime));
                }
                "context" => {
                    let raw = field.text().await.unwrap_or_default();
                    if !raw.trim().is_empty() {
                        context = serde_json::from_str(&raw).map_err(|_| {
                            ApiError::validation("context must be a valid JSON object")
                        })?;
                    }
                }
                _ => {}
            }
        }

        let (frame, mime) = image.ok_or_else(|| ApiError::validation("image file is required"))?;

        let started = Instant::now();
        let report = state.obstacles.analyze(&frame, &mime).await?;
        let analysis_time = started.elapsed().as_secs_f64();

        let mut data = serde_json::to_value(&report).unwrap_or(Value::Null);
        if let Some(obj) = data.as_object_mut() {
            obj.insert("context".into(), context);
            obj.insert("timestamp".into(), Value::String(timestamp()));
            obj.insert(
                "analysisTime".into(),
                json!((analysis_time * 100.0).round() / 100.0),
            );
        }
        Ok(data)
    }
    .await;

    match result {
        Ok(data) => ok_json(data),
        Err(err) => fail(&state, tag(err, "VALIDATION_ERROR", "IMAGE_ANALYSIS_ERROR")),
    }
}

async fn handle_directions(
    State(state): State<AppState>,
    body: Result<Json<DirectionsRequest>, JsonRejection>,
) -> Response {
    let result = async {
        let Json(body) = body.map_err(|e| ApiError::validation(e.body_text()))?;
        let origin = body
            .origin
            .ok_or_else(|| ApiError::validation("origin must include lat and lng coordinates"))?;
        let destination = body.destination.ok_or_else(|| {
            ApiError::validation(
                "destination must be an address string or include lat and lng coordinates",
            )
        })?;
        let mode = match body.mode.as_deref() {
            None => TravelMode::default(),
            Some(raw) => TravelMode::from_param(raw).ok_or_else(|| {
                ApiError::validation(format!(
                    "unknown travel mode \"{raw}\"; expected driving, walking, bicycling or transit"
                ))
            })?,
        };

        let computed = state.routes.compute_route(origin, destination, mode).await?;
        Ok(json!({
            "route": computed.route,
            "origin": origin,
            "destination": computed.destination,
        }))
    }
    .await;

    match result {
        Ok(data) => ok_json(data),
        Err(err) => fail(&state, tag(err, "INVALID_INPUT", "DIRECTIONS_ERROR")),
    }
}

async fn handle_reverse_geocode(
    State(state): State<AppState>,
    Query(query): Query<CoordsQuery>,
) -> Response {
    let result: ApiResult<serde_json::Value> = async {
        let lat = parse_coord("lat", query.lat.as_deref())?;
        let lng = parse_coord("lng", query.lng.as_deref())?;
        let point = LatLng::new(lat, lng);

        let place = state.resolver.reverse_geocode(point).await?;
        Ok(json!({
            "address": place.formatted_address,
            "coordinates": point,
            "placeId": place.place_id,
        }))
    }
    .await;

    match result {
        Ok(data) => ok_json(data),
        Err(err) => {
            let err = match err.kind {
                ErrorKind::NotFound => err.with_code("LOCATION_NOT_FOUND"),
                _ => err,
            };
            fail(&state, err)
        }
    }
}

async fn handle_nearby(State(state): State<AppState>, Query(query): Query<NearbyQuery>) -> Response {
    let result = async {
        let lat = parse_coord("lat", query.lat.as_deref())?;
        let lng = parse_coord("lng", query.lng.as_deref())?;
        let category = query
            .category
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ApiError::validation("type query parameter is required"))?;
        let radius = match query.radius.as_deref() {
            None => None,
            Some(raw) => Some(
                raw.trim()
                    .parse::<u32>()
                    .map_err(|_| ApiError::validation("radius must be a positive integer"))?,
            ),
        };

        let center = LatLng::new(lat, lng);
        let places = state.resolver.nearby(center, &category, radius).await?;
        let count = places.len();
        Ok(json!({
            "places": places,
            "searchCenter": center,
            "type": category,
            "radius": radius.unwrap_or(crate::place::DEFAULT_NEARBY_RADIUS_M),
            "count": count,
        }))
    }
    .await;

    match result {
        Ok(data) => ok_json(data),
        Err(err) => fail(&state, tag(err, "INVALID_INPUT", "NEARBY_SEARCH_ERROR")),
    }
}

async fn handle_autocomplete(
    State(state): State<AppState>,
    Query(query): Query<AutocompleteQuery>,
) -> Response {
    let result = async {
        let text = query
            .query
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ApiError::validation("query parameter is required"))?;

        // Bias location is optional and only applied when both halves
        // parse cleanly.
        let bias = match (query.lat.as_deref(), query.lng.as_deref()) {
            (Some(lat), Some(lng)) => match (lat.trim().parse(), lng.trim().parse()) {
                (Ok(lat), Ok(lng)) => Some(LatLng::new(lat, lng)),
                _ => None,
            },
            _ => None,
        };

        let predictions = state.resolver.autocomplete(&text, bias).await?;
        Ok(json!({
            "predictions": predictions,
            "query": text,
        }))
    }
    .await;

    match result {
        Ok(data) => ok_json(data),
        Err(err) => fail(&state, tag(err, "INVALID_INPUT", "AUTOCOMPLETE_ERROR")),
    }
}

async fn handle_place_details(
    State(state): State<AppState>,
    Path(place_id): Path<String>,
) -> Response {
    match state.resolver.details(&place_id).await {
        Ok(place) => ok_json(place),
        Err(err) => {
            let err = match err.kind {
                ErrorKind::Validation | ErrorKind::Configuration => err,
                _ => err.with_code("PLACE_DETAILS_ERROR"),
            };
            fail(&state, err)
        }
    }
}

async fn handle_not_found(request: Request) -> Response {
    let err = ApiError::not_found(format!(
        "route {} {} not found",
        request.method(),
        request.uri().path()
    ))
    .with_code("ROUTE_NOT_FOUND");
    (StatusCode::NOT_FOUND, Json(Envelope::err(&err, false))).into_response()
}

async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = client_key_from_headers(request.headers());
    if !state.rate_limiter.allow(&key) {
        tracing::warn!(client = key, "rate limit exceeded");
        let err =
            ApiError::validation("too many requests, slow down").with_code("RATE_LIMIT_EXCEEDED");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(Envelope::err(&err, false)),
        )
            .into_response();
    }
    next.run(request).await
}

// ── Router / server ──────────────────────────────────────────────

/// Build the full API router. Exposed for tests.
pub fn build_router(state: AppState, config: &Config) -> Router {
    let cors = cors_layer(&config.server.allowed_origins);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/speech/parse-intent", post(handle_parse_intent))
        .route("/api/camera/analyze-obstacles", post(handle_analyze_obstacles))
        .route("/api/navigation/directions", post(handle_directions))
        .route("/api/location/reverse-geocode", get(handle_reverse_geocode))
        .route("/api/location/nearby", get(handle_nearby))
        .route("/api/location/autocomplete", get(handle_autocomplete))
        .route("/api/location/place/{placeId}", get(handle_place_details))
        .fallback(handle_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(cors)
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if allowed_origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

/// Run the HTTP gateway until shutdown.
pub async fn run_gateway(config: Config) -> anyhow::Result<()> {
    // Fail fast: a missing capability credential makes every request
    // path unusable, so refuse to bind at all.
    let capabilities = providers::create_capabilities(&config)?;
    let state = AppState::new(capabilities, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual = listener.local_addr()?;

    let app = build_router(state, &config);

    tracing::info!(
        environment = %config.environment,
        "wayfinder gateway listening on http://{actual}"
    );
    println!("🧭 Wayfinder gateway listening on http://{actual}");
    println!("  POST /api/speech/parse-intent       - classify a voice command");
    println!("  POST /api/camera/analyze-obstacles  - analyze a camera frame");
    println!("  POST /api/navigation/directions     - compute a route");
    println!("  GET  /api/location/reverse-geocode  - coordinates to address");
    println!("  GET  /api/location/nearby           - nearby place search");
    println!("  GET  /api/location/autocomplete     - place autocomplete");
    println!("  GET  /api/location/place/{{placeId}}  - place details");
    println!("  GET  /health                        - health check");
    println!("  Press Ctrl+C to stop.\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_allows_up_to_limit() {
        let limiter = SlidingWindowRateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.allow("1.2.3.4"));
        assert!(limiter.allow("1.2.3.4"));
        assert!(limiter.allow("1.2.3.4"));
        assert!(!limiter.allow("1.2.3.4"));
        // other clients are unaffected
        assert!(limiter.allow("5.6.7.8"));
    }

    #[test]
    fn rate_limiter_zero_limit_disables() {
        let limiter = SlidingWindowRateLimiter::new(0, Duration::from_secs(60));
        for _ in 0..100 {
            assert!(limiter.allow("1.2.3.4"));
        }
    }

    #[test]
    fn client_key_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(client_key_from_headers(&headers), "203.0.113.9");
        assert_eq!(client_key_from_headers(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn coord_parsing_distinguishes_missing_from_malformed() {
        let missing = parse_coord("lat", None).unwrap_err();
        assert!(missing.message.contains("required"));
        let malformed = parse_coord("lat", Some("north-ish")).unwrap_err();
        assert!(malformed.message.contains("valid number"));
        assert_eq!(parse_coord("lat", Some(" 37.5 ")).unwrap(), 37.5);
    }

    #[test]
    fn tag_retags_by_kind() {
        let v = tag(
            ApiError::validation("bad"),
            "INVALID_INPUT",
            "DIRECTIONS_ERROR",
        );
        assert_eq!(v.code(), "INVALID_INPUT");

        let p = tag(
            ApiError::provider("down"),
            "INVALID_INPUT",
            "DIRECTIONS_ERROR",
        );
        assert_eq!(p.code(), "DIRECTIONS_ERROR");

        let c = tag(
            ApiError::configuration("no key"),
            "INVALID_INPUT",
            "DIRECTIONS_ERROR",
        );
        assert_eq!(c.code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn destination_accepts_both_shapes() {
        let addr: Destination = serde_json::from_str(r#""city hall""#).unwrap();
        assert!(matches!(addr, Destination::Address(_)));
        let point: Destination = serde_json::from_str(r#"{"lat": 37.5, "lng": 127.0}"#).unwrap();
        assert!(matches!(point, Destination::Point(_)));
    }
}

//! Route computation.
//!
//! Resolves the destination (geocoding free-text references internally,
//! so one call produces one route), asks the directions capability for
//! alternatives, and normalizes the provider's primary route into the
//! canonical [`Route`] with synthesized steps.

pub mod synth;

pub use synth::{strip_markup, synthesize, RouteStep};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::place::PlaceResolver;
use crate::providers::DirectionsProvider;
use crate::types::{LatLng, TravelMode};

// ── Route model ──────────────────────────────────────────────────

/// A contiguous portion of a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLeg {
    pub distance_meters: u32,
    pub duration_seconds: u32,
    pub start_address: String,
    pub end_address: String,
    pub steps: Vec<RouteStep>,
}

/// A computed route. `legs` is non-empty on success; distances are
/// integer meters and durations integer seconds, always.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub distance_meters: u32,
    pub duration_seconds: u32,
    pub polyline: String,
    pub legs: Vec<RouteLeg>,
}

/// A destination reference: either free text to be geocoded or an
/// explicit coordinate pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Destination {
    Address(String),
    Point(LatLng),
}

/// A route plus the coordinates the destination resolved to.
#[derive(Debug, Clone)]
pub struct ComputedRoute {
    pub route: Route,
    pub destination: LatLng,
}

// ── Computer ─────────────────────────────────────────────────────

/// Computes routes via the directions capability.
pub struct RouteComputer {
    directions: Arc<dyn DirectionsProvider>,
    resolver: PlaceResolver,
}

impl RouteComputer {
    pub fn new(directions: Arc<dyn DirectionsProvider>, resolver: PlaceResolver) -> Self {
        Self {
            directions,
            resolver,
        }
    }

    /// Compute one route from `origin` to `destination`.
    ///
    /// Free-text destinations are geocoded internally; an unresolvable
    /// destination is `NotFound`, not a provider fault. The provider's
    /// first route is canonical; alternates are advisory and dropped.
    pub async fn compute_route(
        &self,
        origin: LatLng,
        destination: Destination,
        mode: TravelMode,
    ) -> ApiResult<ComputedRoute> {
        origin.validate()?;

        let destination = match destination {
            Destination::Address(address) => self.resolver.geocode(&address).await?.location,
            Destination::Point(point) => {
                point.validate()?;
                point
            }
        };

        let mut routes = self.directions.directions(origin, destination, mode).await?;
        if routes.is_empty() {
            return Err(ApiError::not_found(format!(
                "no {} route found to {destination}",
                mode.as_str()
            )));
        }
        let primary = routes.swap_remove(0);

        let legs: Vec<RouteLeg> = primary
            .legs
            .into_iter()
            .map(|leg| RouteLeg {
                distance_meters: leg.distance_meters,
                duration_seconds: leg.duration_seconds,
                start_address: leg.start_address,
                end_address: leg.end_address,
                steps: synthesize(leg.steps),
            })
            .collect();

        if legs.is_empty() {
            return Err(ApiError::parse("directions backend returned a route with no legs"));
        }

        let route = Route {
            distance_meters: legs.iter().map(|l| l.distance_meters).sum(),
            duration_seconds: legs.iter().map(|l| l.duration_seconds).sum(),
            polyline: primary.polyline,
            legs,
        };

        tracing::debug!(
            distance_m = route.distance_meters,
            duration_s = route.duration_seconds,
            steps = route.legs.iter().map(|l| l.steps.len()).sum::<usize>(),
            "route computed"
        );

        Ok(ComputedRoute { route, destination })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Geocoder, PlacesProvider, RawLeg, RawRoute, RawStep};
    use crate::types::{AutocompletePrediction, NearbyPlace, PlaceDetails, ResolvedPlace};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeDirections {
        routes: Vec<RawRoute>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl DirectionsProvider for FakeDirections {
        async fn directions(
            &self,
            _origin: LatLng,
            _destination: LatLng,
            _mode: TravelMode,
        ) -> ApiResult<Vec<RawRoute>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.routes.clone())
        }
    }

    struct FakeGeocoder {
        candidates: Vec<ResolvedPlace>,
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(&self, _address: &str) -> ApiResult<Vec<ResolvedPlace>> {
            Ok(self.candidates.clone())
        }

        async fn reverse_geocode(&self, _point: LatLng) -> ApiResult<Vec<ResolvedPlace>> {
            Ok(self.candidates.clone())
        }
    }

    struct NoPlaces;

    #[async_trait]
    impl PlacesProvider for NoPlaces {
        async fn nearby(
            &self,
            _center: LatLng,
            _category: &str,
            _radius_m: u32,
        ) -> ApiResult<Vec<NearbyPlace>> {
            Ok(Vec::new())
        }

        async fn autocomplete(
            &self,
            _query: &str,
            _bias: Option<LatLng>,
        ) -> ApiResult<Vec<AutocompletePrediction>> {
            Ok(Vec::new())
        }

        async fn details(&self, _place_id: &str) -> ApiResult<Option<PlaceDetails>> {
            Ok(None)
        }
    }

    fn sample_route() -> RawRoute {
        RawRoute {
            polyline: "abc123".into(),
            legs: vec![RawLeg {
                distance_meters: 850,
                duration_seconds: 640,
                start_address: "Origin St 1".into(),
                end_address: "Dest Ave 2".into(),
                steps: vec![RawStep {
                    instruction: "Head <b>north</b>".into(),
                    distance_text: "0.9 km".into(),
                    duration_text: "11 mins".into(),
                    start_location: LatLng::new(37.0, 127.0),
                    end_location: LatLng::new(37.01, 127.0),
                    maneuver: None,
                }],
            }],
        }
    }

    fn computer(
        routes: Vec<RawRoute>,
        candidates: Vec<ResolvedPlace>,
    ) -> (RouteComputer, Arc<FakeDirections>) {
        let directions = Arc::new(FakeDirections {
            routes,
            calls: AtomicU32::new(0),
        });
        let resolver = PlaceResolver::new(Arc::new(FakeGeocoder { candidates }), Arc::new(NoPlaces));
        (RouteComputer::new(directions.clone(), resolver), directions)
    }

    #[tokio::test]
    async fn computes_route_to_coordinate_destination() {
        let (computer, _) = computer(vec![sample_route()], vec![]);
        let computed = computer
            .compute_route(
                LatLng::new(37.0, 127.0),
                Destination::Point(LatLng::new(37.01, 127.0)),
                TravelMode::Walking,
            )
            .await
            .unwrap();
        assert_eq!(computed.route.distance_meters, 850);
        assert_eq!(computed.route.duration_seconds, 640);
        assert_eq!(computed.route.legs.len(), 1);
        assert_eq!(computed.route.legs[0].steps[0].instruction, "Head north");
    }

    #[tokio::test]
    async fn free_text_destination_is_geocoded_transparently() {
        let dest = LatLng::new(37.5, 127.1);
        let (computer, _) = computer(
            vec![sample_route()],
            vec![ResolvedPlace {
                place_id: None,
                formatted_address: "Pharmacy, Dest Ave 2".into(),
                location: dest,
            }],
        );
        let computed = computer
            .compute_route(
                LatLng::new(37.0, 127.0),
                Destination::Address("the pharmacy".into()),
                TravelMode::Walking,
            )
            .await
            .unwrap();
        assert_eq!(computed.destination, dest);
    }

    #[tokio::test]
    async fn unresolvable_destination_is_not_found_not_provider_error() {
        let (computer, directions) = computer(vec![sample_route()], vec![]);
        let err = computer
            .compute_route(
                LatLng::new(37.0, 127.0),
                Destination::Address("xyzzy nowhere".into()),
                TravelMode::Walking,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotFound);
        // geocoding failed first; directions never asked
        assert_eq!(directions.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_routes_is_not_found() {
        let (computer, _) = computer(vec![], vec![]);
        let err = computer
            .compute_route(
                LatLng::new(37.0, 127.0),
                Destination::Point(LatLng::new(37.01, 127.0)),
                TravelMode::Transit,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn first_route_wins_when_alternatives_exist() {
        let mut alt = sample_route();
        alt.polyline = "alt456".into();
        let (computer, _) = computer(vec![sample_route(), alt], vec![]);
        let computed = computer
            .compute_route(
                LatLng::new(37.0, 127.0),
                Destination::Point(LatLng::new(37.01, 127.0)),
                TravelMode::Walking,
            )
            .await
            .unwrap();
        assert_eq!(computed.route.polyline, "abc123");
    }

    #[tokio::test]
    async fn invalid_origin_is_rejected_before_any_call() {
        let (computer, directions) = computer(vec![sample_route()], vec![]);
        let err = computer
            .compute_route(
                LatLng::new(91.0, 0.0),
                Destination::Point(LatLng::new(37.01, 127.0)),
                TravelMode::Walking,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(directions.calls.load(Ordering::SeqCst), 0);
    }
}

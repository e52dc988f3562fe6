//! Place resolution: ambiguous references → concrete coordinates.
//!
//! Five independent, idempotent operations over the geocoding and places
//! capabilities. Disambiguation policy lives here: when a provider
//! returns multiple candidates, the first provider-ranked result wins
//! (providers pre-rank by relevance; no re-ranking). Empty result sets
//! map to `NotFound` for point lookups and to an empty list for
//! searches — "nothing there" is not "could not ask".

use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::providers::{Geocoder, PlacesProvider};
use crate::types::{AutocompletePrediction, LatLng, NearbyPlace, PlaceDetails, ResolvedPlace};

/// Default nearby-search radius when the caller does not specify one.
pub const DEFAULT_NEARBY_RADIUS_M: u32 = 1500;

/// Resolves free-text place references and coordinate pairs.
#[derive(Clone)]
pub struct PlaceResolver {
    geocoder: Arc<dyn Geocoder>,
    places: Arc<dyn PlacesProvider>,
}

impl PlaceResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, places: Arc<dyn PlacesProvider>) -> Self {
        Self { geocoder, places }
    }

    /// Forward-geocode an address. `NotFound` on zero candidates; silent
    /// first-match on many.
    pub async fn geocode(&self, address: &str) -> ApiResult<ResolvedPlace> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ApiError::validation("address must be a non-empty string"));
        }
        let candidates = self.geocoder.geocode(address).await?;
        candidates
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::not_found(format!("no location found for \"{address}\"")))
    }

    /// Reverse-geocode a coordinate pair. Coordinates are validated
    /// before the provider is asked.
    pub async fn reverse_geocode(&self, point: LatLng) -> ApiResult<ResolvedPlace> {
        point.validate()?;
        let candidates = self.geocoder.reverse_geocode(point).await?;
        candidates
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::not_found(format!("no address covers the point {point}")))
    }

    /// Search for places of a category around a center. An empty result
    /// list is a valid, successful outcome.
    pub async fn nearby(
        &self,
        center: LatLng,
        category: &str,
        radius_m: Option<u32>,
    ) -> ApiResult<Vec<NearbyPlace>> {
        center.validate()?;
        let category = category.trim();
        if category.is_empty() {
            return Err(ApiError::validation("place type must be a non-empty string"));
        }
        let radius = radius_m.unwrap_or(DEFAULT_NEARBY_RADIUS_M);
        self.places.nearby(center, category, radius).await
    }

    /// Autocomplete a partial query, preserving provider order.
    pub async fn autocomplete(
        &self,
        query: &str,
        bias: Option<LatLng>,
    ) -> ApiResult<Vec<AutocompletePrediction>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ApiError::validation("query must be a non-empty string"));
        }
        if let Some(bias) = bias {
            bias.validate()?;
        }
        self.places.autocomplete(query, bias).await
    }

    /// Look up full details for a place ID. `NotFound` when the ID is
    /// stale or invalid.
    pub async fn details(&self, place_id: &str) -> ApiResult<PlaceDetails> {
        let place_id = place_id.trim();
        if place_id.is_empty() {
            return Err(ApiError::validation("placeId must be a non-empty string"));
        }
        self.places
            .details(place_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("no place found for ID {place_id}")))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fake geocoder returning a canned candidate list.
    struct FakeGeocoder {
        candidates: Mutex<Vec<ResolvedPlace>>,
        calls: AtomicU32,
    }

    impl FakeGeocoder {
        fn with(candidates: Vec<ResolvedPlace>) -> Arc<Self> {
            Arc::new(Self {
                candidates: Mutex::new(candidates),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(&self, _address: &str) -> ApiResult<Vec<ResolvedPlace>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.candidates.lock().clone())
        }

        async fn reverse_geocode(&self, _point: LatLng) -> ApiResult<Vec<ResolvedPlace>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.candidates.lock().clone())
        }
    }

    struct FakePlaces {
        nearby_results: Vec<NearbyPlace>,
        details_result: Option<PlaceDetails>,
        calls: AtomicU32,
    }

    impl FakePlaces {
        fn empty() -> Arc<Self> {
            Arc::new(Self {
                nearby_results: Vec::new(),
                details_result: None,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl PlacesProvider for FakePlaces {
        async fn nearby(
            &self,
            _center: LatLng,
            _category: &str,
            _radius_m: u32,
        ) -> ApiResult<Vec<NearbyPlace>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.nearby_results.clone())
        }

        async fn autocomplete(
            &self,
            _query: &str,
            _bias: Option<LatLng>,
        ) -> ApiResult<Vec<AutocompletePrediction>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn details(&self, _place_id: &str) -> ApiResult<Option<PlaceDetails>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.details_result.clone())
        }
    }

    fn place(address: &str, lat: f64, lng: f64) -> ResolvedPlace {
        ResolvedPlace {
            place_id: Some("pid-1".into()),
            formatted_address: address.into(),
            location: LatLng::new(lat, lng),
        }
    }

    fn resolver(
        geocoder: Arc<FakeGeocoder>,
        places: Arc<FakePlaces>,
    ) -> PlaceResolver {
        PlaceResolver::new(geocoder, places)
    }

    #[tokio::test]
    async fn geocode_takes_first_of_many_candidates() {
        let geocoder = FakeGeocoder::with(vec![
            place("First St 1", 37.0, 127.0),
            place("Second St 2", 38.0, 128.0),
        ]);
        let r = resolver(geocoder, FakePlaces::empty());
        let resolved = r.geocode("Main street").await.unwrap();
        assert_eq!(resolved.formatted_address, "First St 1");
    }

    #[tokio::test]
    async fn geocode_zero_candidates_is_not_found() {
        let r = resolver(FakeGeocoder::with(vec![]), FakePlaces::empty());
        let err = r.geocode("Atlantis").await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn reverse_geocode_validates_before_calling_provider() {
        let geocoder = FakeGeocoder::with(vec![place("Somewhere", 0.0, 0.0)]);
        let r = resolver(geocoder.clone(), FakePlaces::empty());
        let err = r
            .reverse_geocode(LatLng::new(123.0, 10.0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reverse_geocode_open_ocean_is_not_found() {
        let r = resolver(FakeGeocoder::with(vec![]), FakePlaces::empty());
        let err = r.reverse_geocode(LatLng::new(0.0, -140.0)).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotFound);
    }

    /// Fake backed by a tiny address book: reverse lookups snap to the
    /// nearest known address, forward lookups resolve it exactly.
    struct AddressBook {
        entries: Vec<ResolvedPlace>,
    }

    #[async_trait]
    impl Geocoder for AddressBook {
        async fn geocode(&self, address: &str) -> ApiResult<Vec<ResolvedPlace>> {
            Ok(self
                .entries
                .iter()
                .filter(|e| e.formatted_address == address)
                .cloned()
                .collect())
        }

        async fn reverse_geocode(&self, point: LatLng) -> ApiResult<Vec<ResolvedPlace>> {
            let mut entries = self.entries.clone();
            entries.sort_by(|a, b| {
                let da = (a.location.lat - point.lat).hypot(a.location.lng - point.lng);
                let db = (b.location.lat - point.lat).hypot(b.location.lng - point.lng);
                da.total_cmp(&db)
            });
            Ok(entries)
        }
    }

    fn approx_meters(a: LatLng, b: LatLng) -> f64 {
        let lat_m = (a.lat - b.lat) * 111_320.0;
        let lng_m = (a.lng - b.lng) * 111_320.0 * a.lat.to_radians().cos();
        lat_m.hypot(lng_m)
    }

    #[tokio::test]
    async fn reverse_then_forward_geocode_round_trips_within_tolerance() {
        // The building centroid sits a few meters from the queried point.
        let book = Arc::new(AddressBook {
            entries: vec![
                place("12 Main St", 37.56655, 126.97810),
                place("99 Far Away Blvd", 38.2, 128.3),
            ],
        });
        let r = PlaceResolver::new(book, FakePlaces::empty());

        let queried = LatLng::new(37.56650, 126.97800);
        let reversed = r.reverse_geocode(queried).await.unwrap();
        let forward = r.geocode(&reversed.formatted_address).await.unwrap();

        assert_eq!(forward.formatted_address, "12 Main St");
        assert!(
            approx_meters(queried, forward.location) < 100.0,
            "round trip drifted {:.1}m",
            approx_meters(queried, forward.location)
        );
    }

    #[tokio::test]
    async fn nearby_empty_results_is_success() {
        let r = resolver(FakeGeocoder::with(vec![]), FakePlaces::empty());
        let hits = r
            .nearby(LatLng::new(37.5, 127.0), "pharmacy", None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn nearby_rejects_bad_center_without_calling_provider() {
        let places = FakePlaces::empty();
        let r = resolver(FakeGeocoder::with(vec![]), places.clone());
        let err = r
            .nearby(LatLng::new(37.5, 999.0), "pharmacy", Some(500))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(places.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn nearby_rejects_empty_category() {
        let r = resolver(FakeGeocoder::with(vec![]), FakePlaces::empty());
        let err = r
            .nearby(LatLng::new(37.5, 127.0), "  ", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn details_stale_id_is_not_found() {
        let r = resolver(FakeGeocoder::with(vec![]), FakePlaces::empty());
        let err = r.details("ChIJstale").await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn autocomplete_validates_bias_location() {
        let r = resolver(FakeGeocoder::with(vec![]), FakePlaces::empty());
        let err = r
            .autocomplete("cafe", Some(LatLng::new(-95.0, 0.0)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use shared::{Airport, GeoPoint};

use crate::{error::LookupError, synth};

/// Remote source of airport coordinates.
///
/// Implemented by [`crate::client::BackendClient`] in production and by
/// in-memory fakes in tests.
pub trait AirportLookup: Send + Sync {
    fn lookup(&self, code: &str) -> impl Future<Output = Result<Airport, LookupError>> + Send;
}

/// Airports of the dashboard's default flight board, used to pre-seed the cache.
const KNOWN_AIRPORTS: &[(&str, &str, f64, f64)] = &[
    ("JFK", "New York JFK", 40.6413, -73.7781),
    ("LAX", "Los Angeles", 33.9416, -118.4085),
    ("ATL", "Atlanta", 33.6407, -84.4277),
    ("LHR", "London Heathrow", 51.4700, -0.4543),
    ("SEA", "Seattle", 47.4502, -122.3088),
    ("NRT", "Tokyo Narita", 35.7720, 140.3929),
    ("ORD", "Chicago O'Hare", 41.9742, -87.9073),
    ("MIA", "Miami", 25.7959, -80.2870),
    ("DFW", "Dallas Fort Worth", 32.8998, -97.0403),
    ("CDG", "Paris Charles de Gaulle", 49.0097, 2.5479),
    ("BOS", "Boston", 42.3656, -71.0096),
    ("SFO", "San Francisco", 37.6213, -122.3790),
    ("SYD", "Sydney", -33.9399, 151.1753),
    ("MSP", "Minneapolis", 44.8848, -93.2223),
    ("AMS", "Amsterdam", 52.3105, 4.7683),
];

pub fn known_airports() -> impl Iterator<Item = Airport> {
    KNOWN_AIRPORTS
        .iter()
        .map(|&(code, name, lat, lon)| Airport::new(code, name, GeoPoint::new(lat, lon)))
}

/// Airport codes are three ASCII letters once trimmed and uppercased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn is_well_formed(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

/// Resolves airport codes to coordinates: cache, then one remote lookup,
/// then [`synth::synthetic_airport`]. Every outcome is cached, so a code
/// costs at most one completed remote call per resolver.
pub struct CoordinateResolver<L> {
    lookup: L,
    cache: Mutex<HashMap<String, Airport>>,
    remote_lookups: AtomicUsize,
}

impl<L: AirportLookup> CoordinateResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            cache: Mutex::new(HashMap::new()),
            remote_lookups: AtomicUsize::new(0),
        }
    }

    pub fn with_known_airports(self, airports: impl IntoIterator<Item = Airport>) -> Self {
        {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            for airport in airports {
                cache.insert(normalize_code(&airport.code), airport);
            }
        }
        self
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    pub async fn resolve(&self, code: &str) -> GeoPoint {
        self.resolve_airport(code).await.location
    }

    pub async fn resolve_airport(&self, code: &str) -> Airport {
        let code = normalize_code(code);
        if let Some(hit) = self.cached(&code) {
            tracing::debug!("airport {code} resolved from cache");
            return hit;
        }

        let resolved = if is_well_formed(&code) {
            self.remote_lookups.fetch_add(1, Ordering::Relaxed);
            match self.lookup.lookup(&code).await {
                Ok(airport) if airport.location.is_valid() => Airport {
                    code: code.clone(),
                    ..airport
                },
                Ok(airport) => {
                    tracing::warn!(
                        "airport {code} lookup returned invalid location {:?}, synthesizing",
                        airport.location
                    );
                    synth::synthetic_airport(&code)
                }
                Err(err) => {
                    tracing::warn!("airport {code} lookup failed ({err}), synthesizing");
                    synth::synthetic_airport(&code)
                }
            }
        } else {
            tracing::debug!("airport code {code:?} is malformed, synthesizing without lookup");
            synth::synthetic_airport(&code)
        };

        // concurrent first lookups can race here; the first to finish owns the entry
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.entry(code).or_insert(resolved).clone()
    }

    pub fn cached(&self, code: &str) -> Option<Airport> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(&normalize_code(code)).cloned()
    }

    /// Remote lookups issued so far.
    pub fn remote_lookups(&self) -> usize {
        self.remote_lookups.load(Ordering::Relaxed)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::FakeLookup;

    #[tokio::test]
    async fn second_resolve_hits_cache() {
        let resolver = CoordinateResolver::new(FakeLookup::with_airports(known_airports()));
        let first = resolver.resolve("sfo").await;
        let second = resolver.resolve("SFO").await;
        assert_eq!(first, second);
        assert_eq!(first, GeoPoint::new(37.6213, -122.3790));
        assert_eq!(resolver.remote_lookups(), 1);
        assert_eq!(resolver.lookup().calls(), 1);
    }

    #[tokio::test]
    async fn failed_lookup_synthesizes_and_caches() {
        let resolver = CoordinateResolver::new(FakeLookup::failing());
        let first = resolver.resolve("ZZZ").await;
        assert!(first.latitude.is_finite() && first.longitude.is_finite());
        assert_eq!(first, synth::synthetic_coordinate("ZZZ"));

        let again = resolver.resolve("ZZZ").await;
        assert_eq!(again, first);
        assert_eq!(resolver.lookup().calls(), 1);
    }

    #[tokio::test]
    async fn synthesis_is_stable_across_resolvers() {
        let a = CoordinateResolver::new(FakeLookup::failing());
        let b = CoordinateResolver::new(FakeLookup::failing());
        assert_eq!(a.resolve("ZZZ").await, b.resolve("ZZZ").await);
    }

    #[tokio::test]
    async fn malformed_code_skips_remote() {
        let resolver = CoordinateResolver::new(FakeLookup::with_airports(known_airports()));
        let point = resolver.resolve("J1").await;
        assert_eq!(point, synth::synthetic_coordinate("J1"));
        assert_eq!(resolver.remote_lookups(), 0);
        assert_eq!(resolver.lookup().calls(), 0);
    }

    #[tokio::test]
    async fn invalid_remote_location_falls_back() {
        let lookup =
            FakeLookup::with_airports([Airport::new("BAD", "Bad", GeoPoint::new(120.0, 0.0))]);
        let resolver = CoordinateResolver::new(lookup);
        assert_eq!(resolver.resolve("BAD").await, synth::synthetic_coordinate("BAD"));
    }

    #[tokio::test]
    async fn known_airports_never_go_remote() {
        let resolver =
            CoordinateResolver::new(FakeLookup::failing()).with_known_airports(known_airports());
        let jfk = resolver.resolve_airport("JFK").await;
        assert_eq!(jfk.display_name, "New York JFK");
        assert_eq!(resolver.remote_lookups(), 0);
        assert_eq!(resolver.cached_len(), KNOWN_AIRPORTS.len());
    }

    #[tokio::test]
    async fn concurrent_first_lookups_converge() {
        let lookup =
            FakeLookup::with_airports(known_airports()).with_delay(Duration::from_millis(10));
        let resolver = CoordinateResolver::new(lookup);
        let (a, b) = tokio::join!(resolver.resolve("LHR"), resolver.resolve("LHR"));
        assert_eq!(a, b);
        // both may go remote, but only one entry is kept
        assert!(resolver.lookup().calls() <= 2);
        assert_eq!(resolver.cached_len(), 1);
        resolver.resolve("LHR").await;
        assert!(resolver.lookup().calls() <= 2);
    }
}

//! Location resolution against a Nominatim-compatible geocoding service
//!
//! Request: `GET {base_url}/search?format=json&limit=N&q=<place>`
//! Response: ordered JSON array of candidates, each with `lat`/`lon` as numeric strings.
//! The first candidate wins; an empty array or any transport/parse failure is "not found".

use crate::domain::types::{Coordinate, CoordinateError, PlaceQuery, ResolvedPlace};
use crate::infra::config::Config;
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("geocoder returned HTTP {0}")]
    Status(u16),
    #[error("malformed geocoder response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("geocoder returned invalid coordinate: {0}")]
    InvalidCoordinate(#[from] CoordinateError),
    #[error("no match for query")]
    NoMatch,
}

/// Log lookup failure (cold path)
#[cold]
fn log_lookup_failed(query: &PlaceQuery, e: &GeocodeError) {
    error!(query = %query, error = %e, "geocode_lookup_failed");
}

/// Boundary to an external geocoding lookup
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// One external lookup; first candidate's coordinate
    async fn lookup(&self, query: &PlaceQuery) -> Result<Coordinate, GeocodeError>;

    /// Lookup mapped onto a `ResolvedPlace`. Never retries.
    async fn resolve(&self, query: PlaceQuery) -> ResolvedPlace {
        match self.lookup(&query).await {
            Ok(coordinate) => ResolvedPlace::resolved(query, coordinate),
            Err(GeocodeError::NoMatch) => {
                debug!(query = %query, "geocode_no_match");
                ResolvedPlace::failed(query)
            }
            Err(e) => {
                log_lookup_failed(&query, &e);
                ResolvedPlace::failed(query)
            }
        }
    }
}

/// One search candidate. Degrees may arrive as strings or bare numbers.
#[derive(Debug, Deserialize)]
pub struct SearchCandidate {
    #[serde(deserialize_with = "deserialize_degrees")]
    pub lat: f64,
    #[serde(deserialize_with = "deserialize_degrees")]
    pub lon: f64,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn deserialize_degrees<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct DegreesVisitor;

    impl<'de> Visitor<'de> for DegreesVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a numeric string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<f64, E>
        where
            E: de::Error,
        {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self))
        }

        fn visit_f64<E>(self, value: f64) -> Result<f64, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_i64<E>(self, value: i64) -> Result<f64, E>
        where
            E: de::Error,
        {
            Ok(value as f64)
        }

        fn visit_u64<E>(self, value: u64) -> Result<f64, E>
        where
            E: de::Error,
        {
            Ok(value as f64)
        }
    }

    deserializer.deserialize_any(DegreesVisitor)
}

/// Pick the first candidate out of a search response body
pub fn parse_search_response(body: &str) -> Result<Coordinate, GeocodeError> {
    let candidates: Vec<SearchCandidate> = serde_json::from_str(body)?;
    let first = candidates.into_iter().next().ok_or(GeocodeError::NoMatch)?;
    debug!(display_name = ?first.display_name, "geocode_candidate");
    Ok(Coordinate::new(first.lat, first.lon)?)
}

pub struct NominatimGeocoder {
    client: reqwest::Client,
    search_url: String,
    result_limit: u32,
}

impl NominatimGeocoder {
    pub fn new(config: &Config) -> Result<Self, GeocodeError> {
        // Create HTTP client once for reuse (connection pooling)
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.geocoder_timeout_ms()))
            .user_agent(config.geocoder_user_agent())
            .build()?;

        Ok(Self {
            client,
            search_url: format!("{}/search", config.geocoder_base_url().trim_end_matches('/')),
            result_limit: config.geocoder_result_limit(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn lookup(&self, query: &PlaceQuery) -> Result<Coordinate, GeocodeError> {
        let limit = self.result_limit.to_string();
        let response = self
            .client
            .get(&self.search_url)
            .query(&[("format", "json"), ("limit", limit.as_str()), ("q", query.as_str())])
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_search_response(&body)
    }
}

/// Memoizes successful lookups by normalized query. Failures are never cached, so a query
/// resolves to the same outcome with or without the cache.
pub struct CachingGeocoder<G> {
    inner: G,
    cache: Mutex<FxHashMap<String, Coordinate>>,
}

impl<G: Geocoder> CachingGeocoder<G> {
    pub fn new(inner: G) -> Self {
        Self { inner, cache: Mutex::new(FxHashMap::default()) }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }
}

#[async_trait]
impl<G: Geocoder> Geocoder for CachingGeocoder<G> {
    async fn lookup(&self, query: &PlaceQuery) -> Result<Coordinate, GeocodeError> {
        let key = query.normalized();
        let cached = self.cache.lock().get(&key).copied();
        if let Some(hit) = cached {
            debug!(query = %query, "geocode_cache_hit");
            return Ok(hit);
        }

        let coordinate = self.inner.lookup(query).await?;
        self.cache.lock().insert(key, coordinate);
        Ok(coordinate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ResolutionStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parse_first_candidate() {
        let body = r#"[
            {"lat": "19.0760", "lon": "72.8777", "display_name": "Mumbai, Maharashtra, India"},
            {"lat": "18.9", "lon": "72.8"}
        ]"#;
        let c = parse_search_response(body).unwrap();
        assert!((c.lat() - 19.076).abs() < 1e-9);
        assert!((c.lon() - 72.8777).abs() < 1e-9);
    }

    #[test]
    fn test_parse_numeric_degrees() {
        let c = parse_search_response(r#"[{"lat": 18.52, "lon": 73}]"#).unwrap();
        assert_eq!(c.lon(), 73.0);
    }

    #[test]
    fn test_parse_empty_is_no_match() {
        assert!(matches!(parse_search_response("[]"), Err(GeocodeError::NoMatch)));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_search_response("<html>"), Err(GeocodeError::Malformed(_))));
        assert!(matches!(
            parse_search_response(r#"[{"lat": "north", "lon": "1"}]"#),
            Err(GeocodeError::Malformed(_))
        ));
        assert!(matches!(
            parse_search_response(r#"{"lat": "1", "lon": "1"}"#),
            Err(GeocodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_out_of_range() {
        assert!(matches!(
            parse_search_response(r#"[{"lat": "91.0", "lon": "0"}]"#),
            Err(GeocodeError::InvalidCoordinate(_))
        ));
    }

    /// Returns a fixed coordinate for one name and counts calls
    struct CountingGeocoder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Geocoder for CountingGeocoder {
        async fn lookup(&self, query: &PlaceQuery) -> Result<Coordinate, GeocodeError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if query.normalized() == "pune" {
                Ok(Coordinate::new(18.520, 73.856)?)
            } else {
                Err(GeocodeError::NoMatch)
            }
        }
    }

    #[tokio::test]
    async fn test_resolve_maps_outcomes() {
        let geocoder = CountingGeocoder { calls: AtomicUsize::new(0) };

        let place = geocoder.resolve(PlaceQuery::parse("Pune").unwrap()).await;
        assert_eq!(place.status, ResolutionStatus::Resolved);
        assert_eq!(place.coordinate, Some(Coordinate::new(18.520, 73.856).unwrap()));

        let place = geocoder.resolve(PlaceQuery::parse("Xyzzyplonk123").unwrap()).await;
        assert_eq!(place.status, ResolutionStatus::Failed);
        assert_eq!(place.coordinate, None);
        assert_eq!(geocoder.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_cache_only_keeps_successes() {
        let cached = CachingGeocoder::new(CountingGeocoder { calls: AtomicUsize::new(0) });

        let first = cached.resolve(PlaceQuery::parse("Pune").unwrap()).await;
        let second = cached.resolve(PlaceQuery::parse(" PUNE ").unwrap()).await;
        assert_eq!(first.coordinate, second.coordinate);
        assert_eq!(cached.inner.calls.load(Ordering::Relaxed), 1);
        assert_eq!(cached.cached_len(), 1);

        cached.resolve(PlaceQuery::parse("Atlantis").unwrap()).await;
        let again = cached.resolve(PlaceQuery::parse("Atlantis").unwrap()).await;
        assert_eq!(again.status, ResolutionStatus::Failed);
        assert_eq!(cached.inner.calls.load(Ordering::Relaxed), 3);
        assert_eq!(cached.cached_len(), 1);
    }
}

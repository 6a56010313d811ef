//! Shared types for the route planner

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("coordinate component is not finite (lat={lat}, lon={lon})")]
    NotFinite { lat: f64, lon: f64 },
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// Geographic position in decimal degrees
///
/// Fields are private so every instance has passed range validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub const MIN_LAT: f64 = -90.0;
    pub const MAX_LAT: f64 = 90.0;
    pub const MIN_LON: f64 = -180.0;
    pub const MAX_LON: f64 = 180.0;

    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(CoordinateError::NotFinite { lat, lon });
        }
        if !(Self::MIN_LAT..=Self::MAX_LAT).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(Self::MIN_LON..=Self::MAX_LON).contains(&lon) {
            return Err(CoordinateError::LongitudeOutOfRange(lon));
        }
        Ok(Self { lat, lon })
    }

    /// Build from already-finite components, pinning them into range
    ///
    /// Used for derived points (waypoints, padded bounds) that may drift past a pole or the
    /// antimeridian. Non-finite input collapses to 0.0.
    pub fn clamped(lat: f64, lon: f64) -> Self {
        let lat = if lat.is_finite() { lat.clamp(Self::MIN_LAT, Self::MAX_LAT) } else { 0.0 };
        let lon = if lon.is_finite() { lon.clamp(Self::MIN_LON, Self::MAX_LON) } else { 0.0 };
        Self { lat, lon }
    }

    #[inline]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    #[inline]
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Arithmetic midpoint (no great-circle correction)
    #[inline]
    pub fn midpoint(&self, other: &Coordinate) -> Coordinate {
        Coordinate { lat: (self.lat + other.lat) / 2.0, lon: (self.lon + other.lon) / 2.0 }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

/// Which end of the trip a query or result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Origin,
    Destination,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Origin => "origin",
            Endpoint::Destination => "destination",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trimmed, non-empty place name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PlaceQuery(String);

impl PlaceQuery {
    /// Returns None for input that is empty after trimming
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded form used as a cache key
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }
}

impl std::fmt::Display for PlaceQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Pending,
    Resolved,
    Failed,
}

/// Outcome of resolving one query. Superseded by the next submission, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPlace {
    pub query: PlaceQuery,
    pub coordinate: Option<Coordinate>,
    pub status: ResolutionStatus,
}

impl ResolvedPlace {
    pub fn pending(query: PlaceQuery) -> Self {
        Self { query, coordinate: None, status: ResolutionStatus::Pending }
    }

    pub fn resolved(query: PlaceQuery, coordinate: Coordinate) -> Self {
        Self { query, coordinate: Some(coordinate), status: ResolutionStatus::Resolved }
    }

    pub fn failed(query: PlaceQuery) -> Self {
        Self { query, coordinate: None, status: ResolutionStatus::Failed }
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.status == ResolutionStatus::Resolved
    }
}

/// Polyline of origin, synthetic waypoint and destination
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RouteGeometry(pub [Coordinate; 3]);

impl RouteGeometry {
    pub fn origin(&self) -> Coordinate {
        self.0[0]
    }

    pub fn waypoint(&self) -> Coordinate {
        self.0[1]
    }

    pub fn destination(&self) -> Coordinate {
        self.0[2]
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.0
    }
}

/// Traffic tier shown on a route summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLevel {
    Low,
    Moderate,
    High,
}

impl TrafficLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficLevel::Low => "Low",
            TrafficLevel::Moderate => "Mod",
            TrafficLevel::High => "High",
        }
    }
}

/// Display tier of a route; decides its polyline color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteTier {
    Smartest,
    Fastest,
    Scenic,
}

impl RouteTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteTier::Smartest => "smartest",
            RouteTier::Fastest => "fastest",
            RouteTier::Scenic => "scenic",
        }
    }

    /// Hex color of the tier's polyline
    pub fn color(&self) -> &'static str {
        match self {
            RouteTier::Smartest => "#10b981",
            RouteTier::Fastest => "#3b82f6",
            RouteTier::Scenic => "#a855f7",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_rejects_out_of_range() {
        assert!(Coordinate::new(19.076, 72.877).is_ok());
        assert!(Coordinate::new(90.0, -180.0).is_ok());
        assert_eq!(
            Coordinate::new(90.5, 0.0),
            Err(CoordinateError::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            Coordinate::new(0.0, -180.1),
            Err(CoordinateError::LongitudeOutOfRange(-180.1))
        );
        assert!(matches!(
            Coordinate::new(f64::NAN, 0.0),
            Err(CoordinateError::NotFinite { .. })
        ));
    }

    #[test]
    fn test_coordinate_clamped() {
        let c = Coordinate::clamped(90.03, 180.2);
        assert_eq!(c.lat(), 90.0);
        assert_eq!(c.lon(), 180.0);

        let c = Coordinate::clamped(f64::INFINITY, -12.5);
        assert_eq!(c.lat(), 0.0);
        assert_eq!(c.lon(), -12.5);
    }

    #[test]
    fn test_midpoint() {
        let mumbai = Coordinate::new(19.076, 72.877).unwrap();
        let pune = Coordinate::new(18.520, 73.856).unwrap();
        let mid = mumbai.midpoint(&pune);
        assert!((mid.lat() - 18.798).abs() < 1e-9);
        assert!((mid.lon() - 73.3665).abs() < 1e-9);
    }

    #[test]
    fn test_place_query_trims() {
        assert_eq!(PlaceQuery::parse("  Pune \n").unwrap().as_str(), "Pune");
        assert!(PlaceQuery::parse("").is_none());
        assert!(PlaceQuery::parse("   \t").is_none());
        assert_eq!(PlaceQuery::parse(" New Delhi ").unwrap().normalized(), "new delhi");
    }

    #[test]
    fn test_resolved_place_constructors() {
        let q = PlaceQuery::parse("Delhi").unwrap();
        let coord = Coordinate::new(28.61, 77.21).unwrap();
        assert_eq!(ResolvedPlace::pending(q.clone()).status, ResolutionStatus::Pending);
        assert!(ResolvedPlace::resolved(q.clone(), coord).is_resolved());
        let failed = ResolvedPlace::failed(q);
        assert!(!failed.is_resolved());
        assert!(failed.coordinate.is_none());
    }
}

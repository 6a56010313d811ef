//! Route synthesis - deterministic candidate geometries between two resolved places
//!
//! Each configured curve offset displaces the origin/destination midpoint diagonally by
//! `offset * waypoint_scale` degrees. Output index i always pairs with catalog descriptor i,
//! so reordering offsets must be mirrored in the catalog.

use crate::domain::types::{Coordinate, RouteGeometry};

pub const DEFAULT_OFFSETS: [f64; 3] = [0.2, -0.2, 0.5];
pub const DEFAULT_WAYPOINT_SCALE: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct RouteSynthesizer {
    offsets: Vec<f64>,
    waypoint_scale: f64,
}

impl Default for RouteSynthesizer {
    fn default() -> Self {
        Self { offsets: DEFAULT_OFFSETS.to_vec(), waypoint_scale: DEFAULT_WAYPOINT_SCALE }
    }
}

impl RouteSynthesizer {
    pub fn new(offsets: Vec<f64>, waypoint_scale: f64) -> Self {
        Self { offsets, waypoint_scale }
    }

    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    /// Number of geometries produced per call
    #[inline]
    pub fn route_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn synthesize(&self, origin: Coordinate, destination: Coordinate) -> Vec<RouteGeometry> {
        let mid = origin.midpoint(&destination);
        self.offsets
            .iter()
            .map(|&offset| {
                let shift = offset * self.waypoint_scale;
                let waypoint = Coordinate::clamped(mid.lat() + shift, mid.lon() + shift);
                RouteGeometry([origin, waypoint, destination])
            })
            .collect()
    }
}

//! Viewport fitting - keeps the map framed on the resolved endpoints

use crate::domain::types::Coordinate;
use crate::io::map_surface::MapSurface;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Axis-aligned lat/lon bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitRegion {
    pub south_west: Coordinate,
    pub north_east: Coordinate,
}

impl FitRegion {
    pub fn lat_span(&self) -> f64 {
        self.north_east.lat() - self.south_west.lat()
    }

    pub fn lon_span(&self) -> f64 {
        self.north_east.lon() - self.south_west.lon()
    }

    pub fn center(&self) -> Coordinate {
        self.south_west.midpoint(&self.north_east)
    }

    pub fn contains(&self, c: &Coordinate) -> bool {
        (self.south_west.lat()..=self.north_east.lat()).contains(&c.lat())
            && (self.south_west.lon()..=self.north_east.lon()).contains(&c.lon())
    }

    /// Grow by `fraction` of each span, never less than `min_margin_deg` per side
    ///
    /// For surfaces that work in degrees rather than pixels. Keeps a degenerate (single point)
    /// region visible.
    pub fn expanded(&self, fraction: f64, min_margin_deg: f64) -> FitRegion {
        let lat_margin = (self.lat_span() * fraction).max(min_margin_deg);
        let lon_margin = (self.lon_span() * fraction).max(min_margin_deg);
        FitRegion {
            south_west: Coordinate::clamped(
                self.south_west.lat() - lat_margin,
                self.south_west.lon() - lon_margin,
            ),
            north_east: Coordinate::clamped(
                self.north_east.lat() + lat_margin,
                self.north_east.lon() + lon_margin,
            ),
        }
    }
}

/// "Animate viewport to region" instruction for the map surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitCommand {
    pub region: FitRegion,
    pub padding_px: [u32; 2],
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct ViewportController {
    padding_px: [u32; 2],
    animation: Duration,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self { padding_px: [50, 50], animation: Duration::from_millis(1500) }
    }
}

impl ViewportController {
    pub fn new(padding_px: [u32; 2], animation: Duration) -> Self {
        Self { padding_px, animation }
    }

    pub fn compute_fit_region(&self, origin: Coordinate, destination: Coordinate) -> FitRegion {
        FitRegion {
            south_west: Coordinate::clamped(
                origin.lat().min(destination.lat()),
                origin.lon().min(destination.lon()),
            ),
            north_east: Coordinate::clamped(
                origin.lat().max(destination.lat()),
                origin.lon().max(destination.lon()),
            ),
        }
    }

    pub fn fit_command(&self, origin: Coordinate, destination: Coordinate) -> FitCommand {
        FitCommand {
            region: self.compute_fit_region(origin, destination),
            padding_px: self.padding_px,
            duration: self.animation,
        }
    }

    /// Compute the region and issue exactly one fit command to the surface
    pub fn fit<S: MapSurface + ?Sized>(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        surface: &mut S,
    ) -> FitCommand {
        let cmd = self.fit_command(origin, destination);
        debug!(
            south_west = %cmd.region.south_west,
            north_east = %cmd.region.north_east,
            duration_ms = %cmd.duration.as_millis(),
            "viewport_fit"
        );
        surface.fit_viewport(&cmd);
        cmd
    }
}

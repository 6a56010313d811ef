//! Map rendering surface boundary
//!
//! The surface only ever receives derived data: a `MapScene` built from a session snapshot
//! and the catalog, plus fit commands from the viewport controller.

use crate::domain::catalog::RouteCatalog;
use crate::domain::types::Coordinate;
use crate::services::session::{PlanningSession, SessionStatus};
use crate::services::viewport::FitCommand;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, info};

pub const SELECTED_WIDTH: u32 = 6;
pub const UNSELECTED_WIDTH: u32 = 3;
pub const SELECTED_OPACITY: f32 = 1.0;
pub const UNSELECTED_OPACITY: f32 = 0.4;
pub const UNSELECTED_DASH: &str = "10, 10";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub position: Coordinate,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolylineStyle {
    pub color: &'static str,
    pub width: u32,
    pub opacity: f32,
    pub dash: Option<&'static str>,
}

impl PolylineStyle {
    pub fn for_route(color: &'static str, selected: bool) -> Self {
        if selected {
            Self { color, width: SELECTED_WIDTH, opacity: SELECTED_OPACITY, dash: None }
        } else {
            Self {
                color,
                width: UNSELECTED_WIDTH,
                opacity: UNSELECTED_OPACITY,
                dash: Some(UNSELECTED_DASH),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polyline {
    pub route_index: usize,
    pub selected: bool,
    pub points: Vec<Coordinate>,
    pub style: PolylineStyle,
}

/// Everything the surface needs to draw one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapScene {
    pub tile_url: String,
    pub attribution: String,
    pub markers: SmallVec<[Marker; 2]>,
    pub polylines: Vec<Polyline>,
}

impl MapScene {
    /// Derive a scene from a snapshot. Markers and routes only appear once `Ready`.
    pub fn build(
        session: &PlanningSession,
        catalog: &RouteCatalog,
        tile_url: &str,
        attribution: &str,
    ) -> Self {
        let mut scene = MapScene {
            tile_url: tile_url.to_string(),
            attribution: attribution.to_string(),
            markers: SmallVec::new(),
            polylines: Vec::new(),
        };

        if session.status != SessionStatus::Ready {
            return scene;
        }
        let Some((origin, destination)) = session.endpoints() else {
            return scene;
        };

        scene.markers.push(Marker {
            position: origin,
            label: Some(session.origin_query.trim().to_string()),
        });
        scene.markers.push(Marker {
            position: destination,
            label: Some(session.destination_query.trim().to_string()),
        });

        // catalog order; geometry i is described by descriptor i
        for (index, descriptor) in catalog.iter() {
            let Some(geometry) = session.geometries.get(index) else {
                continue;
            };
            let selected = session.selected_route == Some(index);
            scene.polylines.push(Polyline {
                route_index: index,
                selected,
                points: geometry.points().to_vec(),
                style: PolylineStyle::for_route(descriptor.tier.color(), selected),
            });
        }

        scene
    }
}

/// Something that can draw map scenes and animate its viewport
pub trait MapSurface {
    fn render(&mut self, scene: &MapScene);
    fn fit_viewport(&mut self, cmd: &FitCommand);
}

/// Headless surface that only logs what it would draw
#[derive(Debug, Default)]
pub struct LogSurface;

impl MapSurface for LogSurface {
    fn render(&mut self, scene: &MapScene) {
        debug!(
            markers = %scene.markers.len(),
            polylines = %scene.polylines.len(),
            selected = ?scene.polylines.iter().find(|p| p.selected).map(|p| p.route_index),
            "map_render"
        );
    }

    fn fit_viewport(&mut self, cmd: &FitCommand) {
        info!(
            south_west = %cmd.region.south_west,
            north_east = %cmd.region.north_east,
            padding_px = ?cmd.padding_px,
            duration_ms = %cmd.duration.as_millis(),
            "map_fit_viewport"
        );
    }
}

/// Surface that keeps every call for inspection in tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub scenes: Vec<MapScene>,
    pub fits: Vec<FitCommand>,
}

#[cfg(test)]
impl MapSurface for RecordingSurface {
    fn render(&mut self, scene: &MapScene) {
        self.scenes.push(scene.clone());
    }

    fn fit_viewport(&mut self, cmd: &FitCommand) {
        self.fits.push(*cmd);
    }
}

//! Domain models - core planning types and the route catalog
//!
//! This module contains the canonical data types used throughout the system:
//! - `Coordinate` - validated latitude/longitude pair
//! - `PlaceQuery` / `ResolvedPlace` - user input and its geocoding outcome
//! - `RouteGeometry` - drawable three-point route polyline
//! - `RouteCatalog` - static descriptors keyed by route index

pub mod catalog;
pub mod types;

pub use catalog::{CatalogError, RouteCatalog, RouteDescriptor};
pub use types::{
    Coordinate, CoordinateError, Endpoint, PlaceQuery, ResolutionStatus, ResolvedPlace,
    RouteGeometry, RouteTier, TrafficLevel,
};

//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `geocoder` - Nominatim-compatible place lookup (plus optional caching)
//! - `map_surface` - Map scene derivation and the rendering surface boundary
//! - `plan_log` - Settled sessions to file (JSONL format)

pub mod geocoder;
pub mod map_surface;
pub mod plan_log;

// Re-export commonly used types
pub use geocoder::{CachingGeocoder, GeocodeError, Geocoder, NominatimGeocoder};
pub use map_surface::{LogSurface, MapScene, MapSurface};
pub use plan_log::PlanLog;

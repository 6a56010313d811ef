//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::catalog::{default_descriptors, CatalogError, RouteCatalog, RouteDescriptor};
use crate::domain::types::Coordinate;
use crate::services::synthesizer::{RouteSynthesizer, DEFAULT_OFFSETS, DEFAULT_WAYPOINT_SCALE};
use crate::services::viewport::ViewportController;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

const DEFAULT_CONFIG_PATH: &str = "config/dev.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_base_url")]
    pub base_url: String,
    #[serde(default = "default_geocoder_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_geocoder_timeout_ms")]
    pub timeout_ms: u64,
    /// Memoize successful lookups for the lifetime of the process
    #[serde(default)]
    pub cache_enabled: bool,
    #[serde(default = "default_geocoder_result_limit")]
    pub result_limit: u32,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_base_url(),
            user_agent: default_geocoder_user_agent(),
            timeout_ms: default_geocoder_timeout_ms(),
            cache_enabled: false,
            result_limit: default_geocoder_result_limit(),
        }
    }
}

fn default_geocoder_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_geocoder_user_agent() -> String {
    concat!("route-planner/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_geocoder_timeout_ms() -> u64 {
    5000
}

fn default_geocoder_result_limit() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    /// Curve offsets, one route per entry, paired with catalog routes by position
    #[serde(default = "default_offsets")]
    pub offsets: Vec<f64>,
    #[serde(default = "default_waypoint_scale")]
    pub waypoint_scale: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self { offsets: default_offsets(), waypoint_scale: default_waypoint_scale() }
    }
}

fn default_offsets() -> Vec<f64> {
    DEFAULT_OFFSETS.to_vec()
}

fn default_waypoint_scale() -> f64 {
    DEFAULT_WAYPOINT_SCALE
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub default_index: usize,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    #[serde(default = "default_descriptors")]
    pub routes: Vec<RouteDescriptor>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_index: 0,
            currency_symbol: default_currency_symbol(),
            routes: default_descriptors(),
        }
    }
}

fn default_currency_symbol() -> String {
    "₹".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewportConfig {
    #[serde(default = "default_padding_px")]
    pub padding_px: [u32; 2],
    #[serde(default = "default_animation_ms")]
    pub animation_ms: u64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self { padding_px: default_padding_px(), animation_ms: default_animation_ms() }
    }
}

fn default_padding_px() -> [u32; 2] {
    [50, 50]
}

fn default_animation_ms() -> u64 {
    1500
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_tile_url")]
    pub tile_url: String,
    #[serde(default = "default_attribution")]
    pub attribution: String,
    /// [lat, lon] shown before any analyze
    #[serde(default = "default_initial_center")]
    pub initial_center: [f64; 2],
    #[serde(default = "default_initial_zoom")]
    pub initial_zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tile_url: default_tile_url(),
            attribution: default_attribution(),
            initial_center: default_initial_center(),
            initial_zoom: default_initial_zoom(),
        }
    }
}

fn default_tile_url() -> String {
    "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png".to_string()
}

fn default_attribution() -> String {
    "© OpenStreetMap contributors © CARTO".to_string()
}

fn default_initial_center() -> [f64; 2] {
    [20.5937, 78.9629]
}

fn default_initial_zoom() -> u8 {
    5
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PlanLogConfig {
    /// JSONL file for settled sessions (empty disables)
    #[serde(default)]
    pub file: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub plan_log: PlanLogConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    geocoder_base_url: String,
    geocoder_user_agent: String,
    geocoder_timeout_ms: u64,
    geocoder_cache_enabled: bool,
    geocoder_result_limit: u32,
    offsets: Vec<f64>,
    waypoint_scale: f64,
    catalog_default_index: usize,
    currency_symbol: String,
    routes: Vec<RouteDescriptor>,
    viewport_padding_px: [u32; 2],
    viewport_animation_ms: u64,
    tile_url: String,
    attribution: String,
    initial_center: [f64; 2],
    initial_zoom: u8,
    plan_log_file: String,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            geocoder_base_url: toml_config.geocoder.base_url,
            geocoder_user_agent: toml_config.geocoder.user_agent,
            geocoder_timeout_ms: toml_config.geocoder.timeout_ms,
            geocoder_cache_enabled: toml_config.geocoder.cache_enabled,
            geocoder_result_limit: toml_config.geocoder.result_limit.max(1),
            offsets: toml_config.synthesis.offsets,
            waypoint_scale: toml_config.synthesis.waypoint_scale,
            catalog_default_index: toml_config.catalog.default_index,
            currency_symbol: toml_config.catalog.currency_symbol,
            routes: toml_config.catalog.routes,
            viewport_padding_px: toml_config.viewport.padding_px,
            viewport_animation_ms: toml_config.viewport.animation_ms,
            tile_url: toml_config.map.tile_url,
            attribution: toml_config.map.attribution,
            initial_center: toml_config.map.initial_center,
            initial_zoom: toml_config.map.initial_zoom,
            plan_log_file: toml_config.plan_log.file,
            config_file,
        }
    }

    /// Determine config file path: explicit path, then `CONFIG_FILE`, then the dev default
    pub fn resolve_config_path(explicit: Option<&str>) -> String {
        if let Some(path) = explicit {
            return path.to_string();
        }

        match env::var("CONFIG_FILE") {
            Ok(path) if !path.is_empty() => path,
            _ => DEFAULT_CONFIG_PATH.to_string(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Resolve the path, then load it, falling back to defaults
    pub fn load(explicit: Option<&str>) -> Self {
        Self::load_from_path(&Self::resolve_config_path(explicit))
    }

    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Startup check: the catalog must describe every synthesized route
    pub fn validate(&self) -> Result<(), CatalogError> {
        self.catalog()?.validate_against(self.synthesizer().route_count())
    }

    pub fn synthesizer(&self) -> RouteSynthesizer {
        RouteSynthesizer::new(self.offsets.clone(), self.waypoint_scale)
    }

    pub fn catalog(&self) -> Result<RouteCatalog, CatalogError> {
        RouteCatalog::new(
            self.routes.clone(),
            self.catalog_default_index,
            self.currency_symbol.clone(),
        )
    }

    pub fn viewport_controller(&self) -> ViewportController {
        ViewportController::new(
            self.viewport_padding_px,
            Duration::from_millis(self.viewport_animation_ms),
        )
    }

    /// Initial map center; out-of-range values are pinned into range
    pub fn initial_center(&self) -> Coordinate {
        Coordinate::clamped(self.initial_center[0], self.initial_center[1])
    }

    pub fn geocoder_base_url(&self) -> &str {
        &self.geocoder_base_url
    }

    pub fn geocoder_user_agent(&self) -> &str {
        &self.geocoder_user_agent
    }

    pub fn geocoder_timeout_ms(&self) -> u64 {
        self.geocoder_timeout_ms
    }

    pub fn geocoder_cache_enabled(&self) -> bool {
        self.geocoder_cache_enabled
    }

    pub fn geocoder_result_limit(&self) -> u32 {
        self.geocoder_result_limit
    }

    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    pub fn tile_url(&self) -> &str {
        &self.tile_url
    }

    pub fn attribution(&self) -> &str {
        &self.attribution
    }

    pub fn initial_zoom(&self) -> u8 {
        self.initial_zoom
    }

    /// None when plan logging is disabled
    pub fn plan_log_file(&self) -> Option<&str> {
        Some(self.plan_log_file.as_str()).filter(|f| !f.is_empty())
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method to point the geocoder elsewhere (mock server, tests)
    pub fn with_geocoder_base_url(mut self, url: impl Into<String>) -> Self {
        self.geocoder_base_url = url.into();
        self
    }

    /// Builder method to set the geocoder timeout
    pub fn with_geocoder_timeout_ms(mut self, ms: u64) -> Self {
        self.geocoder_timeout_ms = ms;
        self
    }

    /// Builder method to enable the plan log
    pub fn with_plan_log_file(mut self, file: impl Into<String>) -> Self {
        self.plan_log_file = file.into();
        self
    }
}

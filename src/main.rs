//! Route planner - resolve two place names and offer alternative routes between them
//!
//! One-shot CLI: geocodes origin and destination concurrently, synthesizes the route
//! alternatives, prints them, and exits non-zero when either place cannot be found.
//!
//! Module structure:
//! - `domain/` - Core types (Coordinate, PlaceQuery, RouteGeometry, RouteCatalog)
//! - `io/` - External interfaces (geocoder, map surface, plan log)
//! - `services/` - Planning logic (SessionMachine, Planner, synthesizer, viewport)
//! - `infra/` - Infrastructure (Config, Metrics, logging)

use clap::Parser;
use route_planner::domain::{Endpoint, RouteCatalog};
use route_planner::infra::{logging, Config, Metrics};
use route_planner::io::{CachingGeocoder, Geocoder, LogSurface, NominatimGeocoder};
use route_planner::services::{Planner, PlanningSession, SessionStatus};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Route planner - compare alternative routes between two places
#[derive(Parser, Debug)]
#[command(name = "route-planner", version = VERSION, about)]
struct Args {
    /// Path to TOML configuration file (falls back to $CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Starting place, e.g. "Mumbai"
    #[arg(short, long)]
    origin: String,

    /// Target place, e.g. "Pune"
    #[arg(short, long)]
    destination: String,

    /// Route index to select after analysis (defaults to the catalog default)
    #[arg(short, long)]
    select: Option<usize>,

    /// Print the session snapshot as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.log_json);

    info!(version = %VERSION, "route-planner starting");

    let config = Config::load(args.config.as_deref());
    if let Err(e) = config.validate() {
        error!(config_file = %config.config_file(), error = %e, "config_invalid");
        return ExitCode::FAILURE;
    }
    info!(
        config_file = %config.config_file(),
        geocoder = %config.geocoder_base_url(),
        timeout_ms = %config.geocoder_timeout_ms(),
        cache = %config.geocoder_cache_enabled(),
        routes = %config.offsets().len(),
        "config_loaded"
    );

    let geocoder = match build_geocoder(&config) {
        Ok(geocoder) => geocoder,
        Err(e) => {
            error!(error = %e, "geocoder_init_failed");
            return ExitCode::FAILURE;
        }
    };

    let metrics = Arc::new(Metrics::new());
    let mut planner = match Planner::new(&config, geocoder, LogSurface, metrics.clone()) {
        Ok(planner) => planner,
        Err(e) => {
            error!(error = %e, "planner_init_failed");
            return ExitCode::FAILURE;
        }
    };

    planner.set_query(Endpoint::Origin, &args.origin);
    planner.set_query(Endpoint::Destination, &args.destination);

    if let Err(e) = planner.analyze() {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    tokio::select! {
        _ = planner.settle() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown_signal_received");
            return ExitCode::FAILURE;
        }
    }

    if let Some(index) = args.select {
        if !planner.select_route(index) {
            warn!(
                index = %index,
                routes = %planner.snapshot().geometries.len(),
                "selection_ignored"
            );
        }
    }

    let session = planner.snapshot();
    if args.json {
        match serde_json::to_string_pretty(session) {
            Ok(body) => println!("{}", body),
            Err(e) => error!(error = %e, "snapshot_serialize_failed"),
        }
    } else {
        print_session(session, planner.catalog());
    }

    metrics.report().log();

    if session.status == SessionStatus::Ready {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn build_geocoder(config: &Config) -> Result<Arc<dyn Geocoder>, route_planner::io::GeocodeError> {
    let nominatim = NominatimGeocoder::new(config)?;
    if config.geocoder_cache_enabled() {
        Ok(Arc::new(CachingGeocoder::new(nominatim)))
    } else {
        Ok(Arc::new(nominatim))
    }
}

fn print_session(session: &PlanningSession, catalog: &RouteCatalog) {
    if session.status != SessionStatus::Ready {
        if let Some(ref message) = session.error_message {
            eprintln!("{}", message);
        }
        return;
    }

    if let Some((origin, destination)) = session.endpoints() {
        println!(
            "{} {} -> {} {}",
            session.origin_query, origin, session.destination_query, destination
        );
    }
    println!();
    println!("   {:<3} {:<20} {:>8} {:>8}  {}", "#", "ROUTE", "TIME", "COST", "TRAFFIC");

    for (index, descriptor) in catalog.iter().take(session.geometries.len()) {
        let marker = if session.selected_route == Some(index) { "*" } else { " " };
        println!(
            " {} {:<3} {:<20} {:>8} {:>8}  {}",
            marker,
            index,
            descriptor.label,
            descriptor.duration_label(),
            catalog.cost_label(descriptor),
            descriptor.traffic.as_str()
        );
    }

    if let Some(geometry) = session.selected_geometry() {
        println!();
        println!("selected route via {}", geometry.waypoint());
    }
}

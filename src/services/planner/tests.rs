//! Tests for the Planner module

use super::*;
use crate::domain::types::{Coordinate, ResolutionStatus};
use crate::io::geocoder::GeocodeError;
use crate::io::map_surface::RecordingSurface;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::{sleep, timeout, Duration};

/// Gazetteer with a per-name delay. Unknown names fail immediately.
struct ScriptedGeocoder {
    places: HashMap<String, (f64, f64, u64)>,
    calls: AtomicUsize,
}

impl ScriptedGeocoder {
    fn new(places: &[(&str, f64, f64, u64)]) -> Self {
        let places = places
            .iter()
            .map(|&(name, lat, lon, delay_ms)| (name.to_lowercase(), (lat, lon, delay_ms)))
            .collect();
        Self { places, calls: AtomicUsize::new(0) }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Geocoder for ScriptedGeocoder {
    async fn lookup(&self, query: &PlaceQuery) -> Result<Coordinate, GeocodeError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.places.get(&query.normalized()) {
            Some(&(lat, lon, delay_ms)) => {
                sleep(millis(delay_ms)).await;
                Ok(Coordinate::new(lat, lon)?)
            }
            None => Err(GeocodeError::NoMatch),
        }
    }
}

struct TestPlanner {
    planner: Planner<RecordingSurface>,
    geocoder: Arc<ScriptedGeocoder>,
    metrics: Arc<Metrics>,
}

impl std::ops::Deref for TestPlanner {
    type Target = Planner<RecordingSurface>;
    fn deref(&self) -> &Self::Target {
        &self.planner
    }
}

impl std::ops::DerefMut for TestPlanner {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.planner
    }
}

fn default_places() -> ScriptedGeocoder {
    ScriptedGeocoder::new(&[
        ("Mumbai", 19.0760, 72.8777, 5),
        ("Pune", 18.5204, 73.8567, 5),
        ("Delhi", 28.6139, 77.2090, 5),
        ("Goa", 15.2993, 74.1240, 5),
    ])
}

fn create_test_planner(geocoder: ScriptedGeocoder) -> TestPlanner {
    create_test_planner_with_config(geocoder, Config::default())
}

fn create_test_planner_with_config(geocoder: ScriptedGeocoder, config: Config) -> TestPlanner {
    let geocoder = Arc::new(geocoder);
    let metrics = Arc::new(Metrics::new());
    let planner =
        Planner::new(&config, geocoder.clone(), RecordingSurface::default(), metrics.clone())
            .unwrap();
    TestPlanner { planner, geocoder, metrics }
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

fn enter(p: &mut TestPlanner, origin: &str, destination: &str) {
    p.set_query(Endpoint::Origin, origin);
    p.set_query(Endpoint::Destination, destination);
}

#[tokio::test]
async fn test_analyze_success() {
    let mut p = create_test_planner(default_places());
    enter(&mut p, "Mumbai", "Pune");

    p.analyze().unwrap();
    assert_eq!(p.snapshot().status, SessionStatus::Resolving);
    p.settle().await;

    let s = p.snapshot().clone();
    assert_eq!(s.status, SessionStatus::Ready);
    assert_eq!(s.geometries.len(), 3);
    assert_eq!(s.selected_route, Some(0));
    assert_eq!(s.error_message, None);
    assert!((s.geometries[0].waypoint().lat() - 18.8182).abs() < 1e-9);
    assert_eq!(p.geocoder.calls(), 2);

    assert_eq!(p.surface().fits.len(), 1);
    let scene = p.surface().scenes.last().unwrap();
    assert_eq!(scene.markers.len(), 2);
    assert_eq!(scene.polylines.len(), 3);
    assert!(scene.polylines[0].selected);
    assert!(!scene.polylines[1].selected);

    let fit = p.last_fit().unwrap();
    assert!(fit.region.contains(&s.geometries[0].origin()));
    assert!(fit.region.contains(&s.geometries[0].destination()));
}

#[tokio::test]
async fn test_empty_query_never_touches_geocoder() {
    let mut p = create_test_planner(default_places());
    p.set_query(Endpoint::Origin, "Mumbai");

    assert_eq!(p.analyze(), Err(PlanError::EmptyQuery(Endpoint::Destination)));
    assert_eq!(p.snapshot().status, SessionStatus::Idle);
    assert_eq!(p.snapshot().generation, 0);

    sleep(millis(20)).await;
    assert_eq!(p.drain(), 0);
    assert_eq!(p.geocoder.calls(), 0);
    assert_eq!(p.metrics.report().input_rejected, 1);
}

#[tokio::test]
async fn test_unknown_destination_reports_error() {
    let mut p = create_test_planner(default_places());
    enter(&mut p, "Mumbai", "Xyzzyplonk123");

    p.analyze().unwrap();
    p.settle().await;

    let s = p.snapshot();
    assert_eq!(s.status, SessionStatus::Error);
    assert!(s.geometries.is_empty());
    assert_eq!(s.selected_route, None);
    assert!(s.error_message.as_deref().unwrap().contains("Xyzzyplonk123"));
    assert!(p.surface().fits.is_empty());

    let scene = p.surface().scenes.last().unwrap();
    assert!(scene.markers.is_empty());
    assert!(scene.polylines.is_empty());
}

#[tokio::test]
async fn test_first_failure_does_not_wait_for_other_lookup() {
    let geocoder = ScriptedGeocoder::new(&[("Mumbai", 19.0760, 72.8777, 300)]);
    let mut p = create_test_planner(geocoder);
    enter(&mut p, "Mumbai", "Atlantis");

    p.analyze().unwrap();
    timeout(millis(200), p.settle()).await.expect("failure should settle before the slow lookup");

    let s = p.snapshot().clone();
    assert_eq!(s.status, SessionStatus::Error);
    assert_eq!(s.origin_place.as_ref().unwrap().status, ResolutionStatus::Pending);

    // the slow origin lookup still lands, and is ignored
    sleep(millis(400)).await;
    assert_eq!(p.drain(), 1);
    assert_eq!(p.snapshot(), &s);
    assert_eq!(p.metrics.stale_discarded(), 1);
    assert!(p.surface().fits.is_empty());
}

#[tokio::test]
async fn test_superseded_analyze_results_are_ignored() {
    let geocoder = ScriptedGeocoder::new(&[
        ("Mumbai", 19.0760, 72.8777, 200),
        ("Pune", 18.5204, 73.8567, 200),
        ("Delhi", 28.6139, 77.2090, 5),
        ("Goa", 15.2993, 74.1240, 5),
    ]);
    let mut p = create_test_planner(geocoder);
    enter(&mut p, "Mumbai", "Pune");
    let first = p.analyze().unwrap();

    enter(&mut p, "Delhi", "Goa");
    let second = p.analyze().unwrap();
    assert!(second > first);

    p.settle().await;
    let ready = p.snapshot().clone();
    assert_eq!(ready.status, SessionStatus::Ready);
    assert_eq!(ready.geometries[0].origin(), Coordinate::new(28.6139, 77.2090).unwrap());

    sleep(millis(400)).await;
    assert_eq!(p.drain(), 2);
    assert_eq!(p.snapshot(), &ready);
    assert_eq!(p.metrics.stale_discarded(), 2);
    assert_eq!(p.surface().fits.len(), 1);
}

#[tokio::test]
async fn test_reanalyze_while_resolving_supersedes() {
    let mut p = create_test_planner(default_places());
    enter(&mut p, "Mumbai", "Pune");
    let first = p.analyze().unwrap();
    let second = p.analyze().unwrap();
    assert_eq!(second, first + 1);

    p.settle().await;
    sleep(millis(50)).await;
    p.drain();

    assert_eq!(p.snapshot().status, SessionStatus::Ready);
    assert_eq!(p.snapshot().generation, second);
    assert_eq!(p.metrics.stale_discarded(), 2);
    assert_eq!(p.surface().fits.len(), 1);

    let summary = p.metrics.report();
    assert_eq!(summary.analyses_started, 2);
    assert_eq!(summary.analyses_superseded, 1);
    assert_eq!(summary.analyses_ready, 1);
}

#[tokio::test]
async fn test_edit_while_resolving_discards_inflight() {
    let mut p = create_test_planner(default_places());
    enter(&mut p, "Mumbai", "Pune");
    p.analyze().unwrap();

    p.set_query(Endpoint::Destination, "Goa");
    assert_eq!(p.snapshot().status, SessionStatus::Idle);

    sleep(millis(50)).await;
    assert_eq!(p.drain(), 2);
    assert_eq!(p.snapshot().status, SessionStatus::Idle);
    assert!(p.snapshot().geometries.is_empty());
    assert_eq!(p.metrics.stale_discarded(), 2);
}

#[tokio::test]
async fn test_same_origin_and_destination() {
    let mut p = create_test_planner(default_places());
    enter(&mut p, "Delhi", "Delhi");
    p.analyze().unwrap();
    p.settle().await;

    let s = p.snapshot();
    assert_eq!(s.status, SessionStatus::Ready);
    assert_eq!(s.geometries.len(), 3);
    let delhi = Coordinate::new(28.6139, 77.2090).unwrap();
    assert!(s.geometries.iter().all(|g| g.origin() == delhi && g.destination() == delhi));

    // degenerate region still produces a usable fit
    let fit = p.last_fit().unwrap();
    assert!(fit.region.contains(&delhi));
}

#[tokio::test]
async fn test_select_route_redraws_without_lookups() {
    let mut p = create_test_planner(default_places());
    enter(&mut p, "Mumbai", "Pune");
    p.analyze().unwrap();
    p.settle().await;

    let calls = p.geocoder.calls();
    let geometries = p.snapshot().geometries.clone();
    let scenes = p.surface().scenes.len();

    assert!(p.select_route(2));
    assert_eq!(p.snapshot().selected_route, Some(2));
    assert_eq!(p.snapshot().geometries, geometries);
    assert_eq!(p.geocoder.calls(), calls);
    assert_eq!(p.surface().fits.len(), 1);
    assert_eq!(p.surface().scenes.len(), scenes + 1);

    let scene = p.surface().scenes.last().unwrap();
    assert!(scene.polylines[2].selected);
    assert!(!scene.polylines[0].selected);

    assert!(!p.select_route(3));
    assert_eq!(p.snapshot().selected_route, Some(2));
    assert_eq!(p.surface().scenes.len(), scenes + 1);
}

#[tokio::test]
async fn test_reset_returns_to_idle() {
    let mut p = create_test_planner(default_places());
    enter(&mut p, "Mumbai", "Pune");
    p.analyze().unwrap();
    p.settle().await;

    p.reset();
    let s = p.snapshot();
    assert_eq!(s.status, SessionStatus::Idle);
    assert!(s.origin_query.is_empty());
    assert!(s.geometries.is_empty());
    assert!(p.last_fit().is_none());
    assert!(p.surface().scenes.last().unwrap().polylines.is_empty());
}

#[tokio::test]
async fn test_settled_sessions_are_logged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plans.jsonl");
    let config = Config::default().with_plan_log_file(path.to_str().unwrap());
    let mut p = create_test_planner_with_config(default_places(), config);

    enter(&mut p, "Mumbai", "Pune");
    p.analyze().unwrap();
    p.settle().await;

    enter(&mut p, "Mumbai", "Atlantis");
    p.analyze().unwrap();
    p.settle().await;

    let content = std::fs::read_to_string(&path).unwrap();
    let statuses: Vec<String> = content
        .lines()
        .map(|line| {
            let v: serde_json::Value = serde_json::from_str(line).unwrap();
            v["session"]["status"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(statuses, vec!["ready", "error"]);
}

#[tokio::test]
async fn test_run_loop_processes_commands() {
    let p = create_test_planner(default_places());
    let TestPlanner { mut planner, geocoder, .. } = p;

    let mut snapshots = planner.subscribe();
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        planner.run(cmd_rx, shutdown_rx).await;
        planner
    });

    cmd_tx.send(PlannerCommand::SetQuery(Endpoint::Origin, "Mumbai".into())).await.unwrap();
    cmd_tx.send(PlannerCommand::SetQuery(Endpoint::Destination, "Pune".into())).await.unwrap();
    cmd_tx.send(PlannerCommand::Analyze).await.unwrap();

    let ready = timeout(millis(1000), snapshots.wait_for(|s| s.status == SessionStatus::Ready))
        .await
        .is_ok();
    assert!(ready);

    cmd_tx.send(PlannerCommand::SelectRoute(1)).await.unwrap();
    let selected =
        timeout(millis(1000), snapshots.wait_for(|s| s.selected_route == Some(1))).await.is_ok();
    assert!(selected);

    shutdown_tx.send(true).unwrap();
    let planner = handle.await.unwrap();
    assert_eq!(planner.snapshot().selected_route, Some(1));
    assert_eq!(planner.surface().fits.len(), 1);
    assert_eq!(geocoder.calls(), 2);
}

#[tokio::test]
async fn test_run_loop_stops_when_commands_close() {
    let mut p = create_test_planner(default_places());
    let (cmd_tx, cmd_rx) = mpsc::channel(1);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    drop(cmd_tx);

    let stopped = timeout(millis(500), p.run(cmd_rx, shutdown_rx)).await.is_ok();
    assert!(stopped);
}

#[tokio::test]
async fn test_run_loop_stops_when_shutdown_sender_dropped() {
    let mut p = create_test_planner(default_places());
    let (_cmd_tx, cmd_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    drop(shutdown_tx);

    let stopped = timeout(millis(500), p.run(cmd_rx, shutdown_rx)).await.is_ok();
    assert!(stopped);
}

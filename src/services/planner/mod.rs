//! Planner - drives a planning session against the geocoder and the map surface
//!
//! The Planner is the only writer of the session. It coordinates:
//! - Query edits and analyze requests (validated before any network activity)
//! - Concurrent origin/destination lookups, one tokio task each
//! - Applying lookup results through the generation-guarded state machine
//! - Viewport fits and scene redraws on the map surface
//! - Publishing snapshots to observers over a watch channel

#[cfg(test)]
mod tests;

use crate::domain::catalog::{CatalogError, RouteCatalog};
use crate::domain::types::{Endpoint, PlaceQuery, ResolvedPlace};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::geocoder::Geocoder;
use crate::io::map_surface::{MapScene, MapSurface};
use crate::io::plan_log::PlanLog;
use crate::services::session::{
    PlanError, PlanningSession, SessionMachine, SessionStatus, Transition,
};
use crate::services::viewport::{FitCommand, ViewportController};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Buffer for lookup results; at most two are outstanding per generation
const RESULT_CHANNEL_SIZE: usize = 16;

/// User intent delivered to a running planner
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerCommand {
    SetQuery(Endpoint, String),
    Analyze,
    SelectRoute(usize),
    Reset,
}

/// A finished lookup, tagged with the generation it was issued under
#[derive(Debug)]
pub struct ResolutionEvent {
    pub generation: u64,
    pub endpoint: Endpoint,
    pub place: ResolvedPlace,
}

pub struct Planner<S: MapSurface> {
    machine: SessionMachine,
    geocoder: Arc<dyn Geocoder>,
    viewport: ViewportController,
    surface: S,
    metrics: Arc<Metrics>,
    plan_log: Option<PlanLog>,
    tile_url: String,
    attribution: String,
    result_tx: mpsc::Sender<ResolutionEvent>,
    result_rx: mpsc::Receiver<ResolutionEvent>,
    snapshot_tx: watch::Sender<PlanningSession>,
    last_fit: Option<FitCommand>,
}

impl<S: MapSurface> Planner<S> {
    /// Fails when the configured catalog does not match the configured offsets
    pub fn new(
        config: &Config,
        geocoder: Arc<dyn Geocoder>,
        surface: S,
        metrics: Arc<Metrics>,
    ) -> Result<Self, CatalogError> {
        let machine = SessionMachine::new(config.synthesizer(), config.catalog()?)?;
        let (result_tx, result_rx) = mpsc::channel(RESULT_CHANNEL_SIZE);
        let (snapshot_tx, _) = watch::channel(machine.snapshot().clone());

        let mut planner = Self {
            machine,
            geocoder,
            viewport: config.viewport_controller(),
            surface,
            metrics,
            plan_log: config.plan_log_file().map(PlanLog::new),
            tile_url: config.tile_url().to_string(),
            attribution: config.attribution().to_string(),
            result_tx,
            result_rx,
            snapshot_tx,
            last_fit: None,
        };
        planner.publish();
        Ok(planner)
    }

    pub fn subscribe(&self) -> watch::Receiver<PlanningSession> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> &PlanningSession {
        self.machine.snapshot()
    }

    pub fn catalog(&self) -> &RouteCatalog {
        self.machine.catalog()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Most recent viewport fit, if any analyze has succeeded
    pub fn last_fit(&self) -> Option<&FitCommand> {
        self.last_fit.as_ref()
    }

    pub fn handle_command(&mut self, cmd: PlannerCommand) {
        match cmd {
            PlannerCommand::SetQuery(endpoint, text) => self.set_query(endpoint, &text),
            PlannerCommand::Analyze => {
                // rejection is already logged and counted
                let _ = self.analyze();
            }
            PlannerCommand::SelectRoute(index) => {
                self.select_route(index);
            }
            PlannerCommand::Reset => self.reset(),
        }
    }

    pub fn set_query(&mut self, endpoint: Endpoint, text: &str) {
        let before = self.machine.generation();
        self.machine.set_query(endpoint, text);
        if self.machine.generation() != before {
            self.last_fit = None;
        }
        self.publish();
    }

    /// Submit both queries for resolution. Returns the new generation.
    pub fn analyze(&mut self) -> Result<u64, PlanError> {
        let superseding = self.machine.status() == SessionStatus::Resolving;
        let request = match self.machine.begin_analyze() {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "analyze_rejected");
                self.metrics.record_input_rejected();
                return Err(e);
            }
        };
        self.metrics.record_analyze_started(superseding);
        self.last_fit = None;

        self.spawn_lookup(request.generation, Endpoint::Origin, request.origin);
        self.spawn_lookup(request.generation, Endpoint::Destination, request.destination);

        self.publish();
        Ok(request.generation)
    }

    fn spawn_lookup(&self, generation: u64, endpoint: Endpoint, query: PlaceQuery) {
        let geocoder = self.geocoder.clone();
        let result_tx = self.result_tx.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            let start = Instant::now();
            let place = geocoder.resolve(query).await;
            let latency_ms = start.elapsed().as_millis() as u64;
            metrics.record_geocode(place.is_resolved(), latency_ms);
            debug!(
                generation = %generation,
                endpoint = %endpoint,
                resolved = %place.is_resolved(),
                latency_ms = %latency_ms,
                "lookup_finished"
            );

            // planner gone means the session was torn down
            let _ = result_tx.send(ResolutionEvent { generation, endpoint, place }).await;
        });
    }

    /// Apply one lookup result to the session
    pub fn apply(&mut self, event: ResolutionEvent) -> Transition {
        let transition =
            self.machine.apply_resolution(event.generation, event.endpoint, event.place);

        match transition {
            Transition::Discarded => {
                self.metrics.record_stale_discarded();
                return transition;
            }
            Transition::AwaitingOther => {}
            Transition::Ready { origin, destination } => {
                self.metrics.record_analyze_ready();
                let cmd = self.viewport.fit(origin, destination, &mut self.surface);
                self.last_fit = Some(cmd);
                self.log_plan();
            }
            Transition::Failed(endpoint) => {
                self.metrics.record_analyze_failed();
                info!(generation = %event.generation, endpoint = %endpoint, "analyze_failed");
                self.log_plan();
            }
        }

        self.publish();
        transition
    }

    /// Returns true when the selection changed the session
    pub fn select_route(&mut self, index: usize) -> bool {
        let applied = self.machine.select_route(index);
        self.metrics.record_selection(applied);
        if applied {
            self.publish();
        }
        applied
    }

    pub fn reset(&mut self) {
        self.machine.reset();
        self.last_fit = None;
        self.publish();
    }

    /// Wait until the current analyze leaves `Resolving`
    pub async fn settle(&mut self) {
        while self.machine.status() == SessionStatus::Resolving {
            match self.result_rx.recv().await {
                Some(event) => {
                    self.apply(event);
                }
                None => break,
            }
        }
    }

    /// Apply every result already queued without waiting. Returns how many were applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.result_rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Process commands and lookup results until the command channel closes or shutdown
    pub async fn run(
        &mut self,
        mut cmd_rx: mpsc::Receiver<PlannerCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("planner_started");

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd),
                        None => break,
                    }
                }
                Some(event) = self.result_rx.recv() => {
                    self.apply(event);
                }
                changed = shutdown.changed() => {
                    // a dropped sender counts as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(generation = %self.machine.generation(), "planner_stopped");
    }

    fn log_plan(&self) {
        if let Some(ref plan_log) = self.plan_log {
            plan_log.write_session(self.machine.snapshot());
        }
    }

    fn publish(&mut self) {
        let snapshot = self.machine.snapshot();
        let scene =
            MapScene::build(snapshot, self.machine.catalog(), &self.tile_url, &self.attribution);
        self.surface.render(&scene);
        self.snapshot_tx.send_replace(snapshot.clone());
    }
}

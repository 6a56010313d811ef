//! Planning session state machine
//!
//! States: `Idle -> Resolving -> Ready` on success, `Resolving -> Error` on the first failed
//! resolution. `Ready`/`Error` re-enter `Resolving` on a new analyze, and an analyze while
//! `Resolving` supersedes the in-flight one.
//!
//! Every analyze and every reset bumps a generation counter. Resolution results carry the
//! generation they were issued under; anything not matching the current generation, or
//! arriving after the session left `Resolving`, is discarded.

use crate::domain::catalog::{CatalogError, RouteCatalog};
use crate::domain::types::{Coordinate, Endpoint, PlaceQuery, ResolvedPlace, RouteGeometry};
use crate::services::synthesizer::RouteSynthesizer;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("{0} query is empty")]
    EmptyQuery(Endpoint),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Resolving,
    Ready,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Resolving => "resolving",
            SessionStatus::Ready => "ready",
            SessionStatus::Error => "error",
        }
    }
}

/// Plain snapshot handed to whatever draws the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanningSession {
    pub generation: u64,
    pub origin_query: String,
    pub destination_query: String,
    pub origin_place: Option<ResolvedPlace>,
    pub destination_place: Option<ResolvedPlace>,
    pub geometries: Vec<RouteGeometry>,
    pub selected_route: Option<usize>,
    pub status: SessionStatus,
    pub error_message: Option<String>,
}

impl PlanningSession {
    fn empty(generation: u64) -> Self {
        Self {
            generation,
            origin_query: String::new(),
            destination_query: String::new(),
            origin_place: None,
            destination_place: None,
            geometries: Vec::new(),
            selected_route: None,
            status: SessionStatus::Idle,
            error_message: None,
        }
    }

    pub fn query(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Origin => &self.origin_query,
            Endpoint::Destination => &self.destination_query,
        }
    }

    /// Both endpoint coordinates, only once both resolved
    pub fn endpoints(&self) -> Option<(Coordinate, Coordinate)> {
        let origin = self.origin_place.as_ref().filter(|p| p.is_resolved())?.coordinate?;
        let destination =
            self.destination_place.as_ref().filter(|p| p.is_resolved())?.coordinate?;
        Some((origin, destination))
    }

    pub fn selected_geometry(&self) -> Option<&RouteGeometry> {
        self.selected_route.and_then(|i| self.geometries.get(i))
    }

    fn place_mut(&mut self, endpoint: Endpoint) -> &mut Option<ResolvedPlace> {
        match endpoint {
            Endpoint::Origin => &mut self.origin_place,
            Endpoint::Destination => &mut self.destination_place,
        }
    }

    fn clear_derived(&mut self) {
        self.origin_place = None;
        self.destination_place = None;
        self.geometries.clear();
        self.selected_route = None;
        self.status = SessionStatus::Idle;
        self.error_message = None;
    }
}

/// The pair of lookups one analyze needs
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeRequest {
    pub generation: u64,
    pub origin: PlaceQuery,
    pub destination: PlaceQuery,
}

/// What a resolution result did to the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Result belonged to a superseded generation or a settled session
    Discarded,
    /// Accepted; the other endpoint is still outstanding
    AwaitingOther,
    /// Both endpoints resolved and routes were synthesized
    Ready { origin: Coordinate, destination: Coordinate },
    /// This endpoint failed; session is now in `Error`
    Failed(Endpoint),
}

pub struct SessionMachine {
    session: PlanningSession,
    synthesizer: RouteSynthesizer,
    catalog: RouteCatalog,
}

impl SessionMachine {
    /// Fails when the catalog cannot describe every synthesized geometry
    pub fn new(synthesizer: RouteSynthesizer, catalog: RouteCatalog) -> Result<Self, CatalogError> {
        catalog.validate_against(synthesizer.route_count())?;
        Ok(Self { session: PlanningSession::empty(0), synthesizer, catalog })
    }

    pub fn snapshot(&self) -> &PlanningSession {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn generation(&self) -> u64 {
        self.session.generation
    }

    pub fn catalog(&self) -> &RouteCatalog {
        &self.catalog
    }

    /// Update query text. Leaving a non-idle session invalidates everything derived from the
    /// previous query, including in-flight lookups.
    ///
    /// Returns true when the session was reset.
    pub fn set_query(&mut self, endpoint: Endpoint, text: &str) -> bool {
        if self.session.query(endpoint) == text {
            return false;
        }
        let was_active = self.session.status != SessionStatus::Idle;
        if was_active {
            self.session.generation += 1;
            self.session.clear_derived();
            debug!(
                endpoint = %endpoint,
                generation = %self.session.generation,
                "session_reset_on_edit"
            );
        }
        match endpoint {
            Endpoint::Origin => self.session.origin_query = text.to_string(),
            Endpoint::Destination => self.session.destination_query = text.to_string(),
        }
        was_active
    }

    /// Start resolving both endpoints. Empty queries are rejected with no state change.
    pub fn begin_analyze(&mut self) -> Result<AnalyzeRequest, PlanError> {
        let origin = PlaceQuery::parse(&self.session.origin_query)
            .ok_or(PlanError::EmptyQuery(Endpoint::Origin))?;
        let destination = PlaceQuery::parse(&self.session.destination_query)
            .ok_or(PlanError::EmptyQuery(Endpoint::Destination))?;

        if self.session.status == SessionStatus::Resolving {
            info!(superseded = %self.session.generation, "analyze_superseded");
        }

        self.session.generation += 1;
        self.session.clear_derived();
        self.session.origin_place = Some(ResolvedPlace::pending(origin.clone()));
        self.session.destination_place = Some(ResolvedPlace::pending(destination.clone()));
        self.session.status = SessionStatus::Resolving;

        info!(
            generation = %self.session.generation,
            origin = %origin,
            destination = %destination,
            "analyze_started"
        );

        Ok(AnalyzeRequest { generation: self.session.generation, origin, destination })
    }

    pub fn apply_resolution(
        &mut self,
        generation: u64,
        endpoint: Endpoint,
        place: ResolvedPlace,
    ) -> Transition {
        if generation != self.session.generation
            || self.session.status != SessionStatus::Resolving
        {
            debug!(
                generation = %generation,
                current = %self.session.generation,
                status = %self.session.status.as_str(),
                endpoint = %endpoint,
                "stale_resolution_discarded"
            );
            return Transition::Discarded;
        }

        let slot = self.session.place_mut(endpoint);
        let pending_here = matches!(slot, Some(p) if p.query == place.query && !p.is_resolved());
        if !pending_here {
            warn!(endpoint = %endpoint, query = %place.query, "unexpected_resolution_discarded");
            return Transition::Discarded;
        }

        if !place.is_resolved() {
            let message = format!(
                "Could not find the {} location \"{}\". Please try a valid city name.",
                endpoint, place.query
            );
            warn!(
                generation = %generation,
                endpoint = %endpoint,
                query = %place.query,
                "location_not_found"
            );
            *slot = Some(place);
            self.session.geometries.clear();
            self.session.selected_route = None;
            self.session.status = SessionStatus::Error;
            self.session.error_message = Some(message);
            return Transition::Failed(endpoint);
        }

        info!(
            generation = %generation,
            endpoint = %endpoint,
            query = %place.query,
            coordinate = %place.coordinate.map(|c| c.to_string()).unwrap_or_default(),
            "location_resolved"
        );
        *slot = Some(place);

        let Some((origin, destination)) = self.session.endpoints() else {
            return Transition::AwaitingOther;
        };

        self.session.geometries = self.synthesizer.synthesize(origin, destination);
        self.session.selected_route = Some(self.catalog.default_index());
        self.session.status = SessionStatus::Ready;
        info!(
            generation = %generation,
            routes = %self.session.geometries.len(),
            "routes_ready"
        );
        Transition::Ready { origin, destination }
    }

    /// Select a route by index. Only valid when ready and in bounds; otherwise a no-op.
    pub fn select_route(&mut self, index: usize) -> bool {
        if self.session.status != SessionStatus::Ready || index >= self.session.geometries.len() {
            debug!(
                index = %index,
                status = %self.session.status.as_str(),
                "route_selection_rejected"
            );
            return false;
        }
        self.session.selected_route = Some(index);
        true
    }

    /// Back to idle with every field cleared
    pub fn reset(&mut self) {
        let generation = self.session.generation + 1;
        self.session = PlanningSession::empty(generation);
        debug!(generation = %generation, "session_reset");
    }
}

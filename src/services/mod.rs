//! Services - business logic and state management
//!
//! This module contains the core planning services:
//! - `planner` - Async driver that owns the session and talks to the geocoder and map
//! - `session` - Planning session state machine (generation-guarded)
//! - `synthesizer` - Deterministic route geometry from two endpoints
//! - `viewport` - Fit region and camera command for a resolved pair

pub mod planner;
pub mod session;
pub mod synthesizer;
pub mod viewport;

// Re-export commonly used types
pub use planner::{Planner, PlannerCommand, ResolutionEvent};
pub use session::{PlanError, PlanningSession, SessionMachine, SessionStatus, Transition};
pub use synthesizer::RouteSynthesizer;
pub use viewport::{FitCommand, FitRegion, ViewportController};

//! HTTP API server for external control (intake form / proctoring client)
//!
//! This module provides a REST API for driving screening sessions:
//! - POST /screenings/start - Start a new screening
//! - POST /screenings/stop/:id - Manual stop ("end interview")
//! - POST /screenings/violation/:id - Report a proctoring violation
//! - GET /screenings/:id/status - Live status snapshot
//! - GET /screenings/:id/transcript - Transcript of a finished screening
//! - GET /screenings/:id/result - Terminal result
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, ScreeningEntry, ScreeningResult};

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Screening control
        .route("/screenings/start", post(handlers::start_screening))
        .route(
            "/screenings/stop/:session_id",
            post(handlers::stop_screening),
        )
        .route(
            "/screenings/violation/:session_id",
            post(handlers::report_violation),
        )
        // Screening queries
        .route(
            "/screenings/:session_id/status",
            get(handlers::get_screening_status),
        )
        .route(
            "/screenings/:session_id/transcript",
            get(handlers::get_screening_transcript),
        )
        .route(
            "/screenings/:session_id/result",
            get(handlers::get_screening_result),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

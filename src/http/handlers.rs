use super::state::{AppState, ScreeningEntry, ScreeningResult};
use crate::audio::{CaptureBackendFactory, CaptureSource};
use crate::session::{SessionDescriptor, SessionEngine};
use crate::transport::{NatsDialogueConnector, NatsPlaybackSink};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartScreeningRequest {
    pub candidate_name: String,
    pub target_role: String,

    /// Spoken language (default: "en")
    pub language: Option<String>,

    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<String>,

    /// Override the hard time budget for this screening (seconds)
    pub time_budget_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StartScreeningResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ViolationRequest {
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct StopScreeningResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /screenings/start
/// Start a new screening session
pub async fn start_screening(
    State(state): State<AppState>,
    Json(req): Json<StartScreeningRequest>,
) -> impl IntoResponse {
    let mut descriptor = SessionDescriptor::new(
        req.candidate_name,
        req.target_role,
        req.language.unwrap_or_else(|| "en".to_string()),
    );
    if let Some(session_id) = req.session_id {
        descriptor.session_id = session_id;
    }
    let session_id = descriptor.session_id.clone();

    info!("Starting screening for session: {}", session_id);

    // Check if already running
    {
        let sessions = state.sessions.read().await;
        if sessions.contains_key(&session_id) {
            return (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!("Screening {} already exists", session_id),
                }),
            )
                .into_response();
        }
    }

    let mut config = state.session_config.clone();
    if let Some(budget) = req.time_budget_secs {
        config.time_budget_secs = budget;
    }

    let connector = Arc::new(NatsDialogueConnector::new(
        state.nats_url.clone(),
        config.sample_rate,
        config.channels,
    ));

    let capture = match CaptureBackendFactory::create(
        CaptureSource::Nats {
            url: state.nats_url.clone(),
            session_id: session_id.clone(),
        },
        config.capture(),
    ) {
        Ok(capture) => capture,
        Err(e) => {
            error!("Failed to create capture backend: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to create capture backend: {}", e),
                }),
            )
                .into_response();
        }
    };

    let sink = match NatsPlaybackSink::connect(
        &state.nats_url,
        session_id.clone(),
        config.sample_rate,
        config.channels,
    )
    .await
    {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            error!("Failed to create playback sink: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to create playback sink: {}", e),
                }),
            )
                .into_response();
        }
    };

    let (engine, handle) = SessionEngine::new(descriptor, config, connector, capture, sink);

    // Run the engine to its single terminal result; the outcome slot is
    // what the result/transcript endpoints serve afterwards
    let outcome_slot = Arc::new(RwLock::new(None));
    {
        let slot = Arc::clone(&outcome_slot);
        let task_session_id = session_id.clone();
        tokio::spawn(async move {
            let view = match engine.run().await {
                Ok(outcome) => ScreeningResult::from_outcome(&outcome),
                Err(e) => {
                    error!("Screening {} failed: {}", task_session_id, e);
                    ScreeningResult::from_error(task_session_id, &e)
                }
            };
            *slot.write().await = Some(view);
        });
    }

    // Store entry
    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(
            session_id.clone(),
            ScreeningEntry {
                handle,
                outcome: outcome_slot,
            },
        );
    }

    info!("Screening started for session: {}", session_id);

    (
        StatusCode::OK,
        Json(StartScreeningResponse {
            session_id: session_id.clone(),
            status: "running".to_string(),
            message: format!("Screening started for session {}", session_id),
        }),
    )
        .into_response()
}

/// POST /screenings/stop/:session_id
/// Manual stop ("end interview"); superseded by an agent decision if
/// one already exists
pub async fn stop_screening(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!("Manual stop requested for session: {}", session_id);

    let sessions = state.sessions.read().await;

    match sessions.get(&session_id) {
        Some(entry) => {
            let delivered = entry.handle.manual_stop().await;

            (
                StatusCode::OK,
                Json(StopScreeningResponse {
                    session_id: session_id.clone(),
                    status: if delivered { "stopping" } else { "ended" }.to_string(),
                    message: if delivered {
                        "Stop requested".to_string()
                    } else {
                        "Session already ended".to_string()
                    },
                }),
            )
                .into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Screening {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// POST /screenings/violation/:session_id
/// Report a proctoring violation (tab switch, focus loss)
pub async fn report_violation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<ViolationRequest>,
) -> impl IntoResponse {
    let sessions = state.sessions.read().await;

    match sessions.get(&session_id) {
        Some(entry) => {
            let delivered = entry.handle.report_violation(req.detail).await;

            (
                StatusCode::OK,
                Json(StopScreeningResponse {
                    session_id: session_id.clone(),
                    status: if delivered { "stopping" } else { "ended" }.to_string(),
                    message: "Violation reported".to_string(),
                }),
            )
                .into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Screening {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// GET /screenings/:session_id/status
/// Get the live status snapshot of a screening
pub async fn get_screening_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let sessions = state.sessions.read().await;

    match sessions.get(&session_id) {
        Some(entry) => (StatusCode::OK, Json(entry.handle.status())).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Screening {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// GET /screenings/:session_id/transcript
/// Get the transcript of a finished screening
pub async fn get_screening_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let sessions = state.sessions.read().await;

    match sessions.get(&session_id) {
        Some(entry) => match entry.outcome.read().await.as_ref() {
            Some(result) => (StatusCode::OK, Json(result.transcript.clone())).into_response(),
            None => (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!("Screening {} still in progress", session_id),
                }),
            )
                .into_response(),
        },
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Screening {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// GET /screenings/:session_id/result
/// Get the terminal result of a finished screening
pub async fn get_screening_result(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let sessions = state.sessions.read().await;

    match sessions.get(&session_id) {
        Some(entry) => match entry.outcome.read().await.as_ref() {
            Some(result) => (StatusCode::OK, Json(result.clone())).into_response(),
            None => (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!("Screening {} still in progress", session_id),
                }),
            )
                .into_response(),
        },
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Screening {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

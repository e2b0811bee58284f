use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::EngineError;
use crate::session::{SessionConfig, SessionHandle, SessionOutcome, TranscriptEntry};

/// Outcome view exposed over the API once a session finishes.
#[derive(Debug, Clone, Serialize)]
pub struct ScreeningResult {
    pub session_id: String,
    /// None when the session died on a fatal error before finalizing
    pub passed: Option<bool>,
    pub reason: String,
    pub transcript: Vec<TranscriptEntry>,
    pub recording_bytes: usize,
    pub error: Option<String>,
}

impl ScreeningResult {
    pub fn from_outcome(outcome: &SessionOutcome) -> Self {
        let recording_bytes = outcome
            .recording
            .as_ref()
            .map(|r| r.audio_wav.len() + r.video.len())
            .unwrap_or(0);

        Self {
            session_id: outcome.session_id.clone(),
            passed: Some(outcome.passed),
            reason: outcome.reason.clone(),
            transcript: outcome.transcript.clone(),
            recording_bytes,
            error: None,
        }
    }

    pub fn from_error(session_id: String, error: &EngineError) -> Self {
        Self {
            session_id,
            passed: None,
            reason: "Session failed".to_string(),
            transcript: Vec::new(),
            recording_bytes: 0,
            error: Some(error.to_string()),
        }
    }
}

/// One live or finished screening tracked by the server.
#[derive(Clone)]
pub struct ScreeningEntry {
    pub handle: SessionHandle,
    pub outcome: Arc<RwLock<Option<ScreeningResult>>>,
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Tracked screenings (session_id → entry)
    pub sessions: Arc<RwLock<HashMap<String, ScreeningEntry>>>,
    pub nats_url: String,
    pub session_config: SessionConfig,
}

impl AppState {
    pub fn new(nats_url: String, session_config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            nats_url,
            session_config,
        }
    }
}

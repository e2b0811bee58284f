use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::audio::recorder::RecordingArtifact;
use crate::session::transcript::TranscriptEntry;
use crate::transport::supervisor::ConnectionState;

/// Statistics about a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Microphone frames transmitted to the dialogue service
    pub frames_sent: u64,

    /// Number of transcript entries assembled
    pub transcript_entries: usize,

    /// Successful reconnects after transient drops
    pub reconnects: u32,
}

/// Terminal result of one screening session.
///
/// Exactly one of these is produced per session, whether by agent
/// decision, manual stop, security violation, or hard timeout.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub session_id: String,
    pub passed: bool,
    pub reason: String,
    pub transcript: Vec<TranscriptEntry>,
    /// Recording artifact; absent when the recorder never produced data
    #[serde(skip)]
    pub recording: Option<RecordingArtifact>,
    pub stats: SessionStats,
}

/// Live snapshot reported over the status channel.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub state: ConnectionState,
    pub elapsed_secs: f64,
    pub strikes: u32,
    pub transcript_entries: usize,
    pub agent_speaking: bool,
}

impl SessionStatus {
    pub fn initial(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: ConnectionState::Idle,
            elapsed_secs: 0.0,
            strikes: 0,
            transcript_entries: 0,
            agent_speaking: false,
        }
    }
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::backend::CaptureConfig;
use crate::audio::capture::PipelineConfig;
use crate::audio::recorder::RecorderConfig;
use crate::session::liveness::LivenessConfig;
use crate::transport::supervisor::RetryBudget;

/// Candidate identity and setup for one assessment attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Unique session identifier (e.g., "screening-<uuid>")
    pub session_id: String,
    pub candidate_name: String,
    pub target_role: String,
    /// Spoken language for the interview (e.g., "en")
    pub language: String,
}

impl SessionDescriptor {
    pub fn new(
        candidate_name: impl Into<String>,
        target_role: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            session_id: format!("screening-{}", uuid::Uuid::new_v4()),
            candidate_name: candidate_name.into(),
            target_role: target_role.into(),
            language: language.into(),
        }
    }
}

/// Engine configuration.
///
/// Every supervision threshold is a named knob here, not a hidden
/// constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Hard overall time budget while connected. Default 600; stricter
    /// designated limits (e.g. 300) use the same knob.
    pub time_budget_secs: u64,

    /// Candidate silence tolerated before a strike.
    pub silence_threshold_secs: u64,

    /// Strikes before the forced-fail escalation.
    pub strike_limit: u32,

    /// Reconnect attempts after transient drops.
    pub reconnect_attempts: u32,

    /// First reconnect delay; doubles per attempt.
    pub reconnect_base_delay_ms: u64,

    /// Ceiling on the reconnect delay.
    pub reconnect_max_delay_ms: u64,

    /// A close/error sooner than this after a connect attempt began is
    /// classified as an outright rejection.
    pub rejection_window_ms: u64,

    /// Audio per outbound wire frame.
    pub frame_duration_ms: u64,

    /// Capture sample rate.
    pub sample_rate: u32,

    /// Capture channel count (1 = mono).
    pub channels: u16,

    /// RMS level at or above which a frame counts as speech.
    pub energy_threshold: f32,

    /// Transmit only frames at or above the threshold.
    pub energy_gate: bool,

    /// Wait after budget expiry before forcing a timeout failure.
    pub decision_grace_secs: u64,

    /// Wait for the recorder's final chunk on shutdown.
    pub recorder_stop_grace_ms: u64,

    /// Tool name the agent uses to deliver its verdict.
    pub decision_tool: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            time_budget_secs: 600,
            silence_threshold_secs: 8,
            strike_limit: 3,
            reconnect_attempts: 3,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 5000,
            rejection_window_ms: 1000,
            frame_duration_ms: 10,
            sample_rate: 16000,
            channels: 1,
            energy_threshold: 0.015,
            energy_gate: false,
            decision_grace_secs: 3,
            recorder_stop_grace_ms: 2000,
            decision_tool: "submit_result".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn liveness(&self) -> LivenessConfig {
        LivenessConfig {
            silence_threshold: Duration::from_secs(self.silence_threshold_secs),
            strike_limit: self.strike_limit,
            time_budget: Duration::from_secs(self.time_budget_secs),
            decision_grace: Duration::from_secs(self.decision_grace_secs),
        }
    }

    pub fn retry_budget(&self) -> RetryBudget {
        RetryBudget::new(
            self.reconnect_attempts,
            Duration::from_millis(self.reconnect_base_delay_ms),
            Duration::from_millis(self.reconnect_max_delay_ms),
        )
    }

    pub fn rejection_window(&self) -> Duration {
        Duration::from_millis(self.rejection_window_ms)
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            energy_threshold: self.energy_threshold,
            energy_gate: self.energy_gate,
        }
    }

    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            frame_duration_ms: self.frame_duration_ms,
        }
    }

    pub fn recorder(&self) -> RecorderConfig {
        RecorderConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            max_buffer_delay_ms: 200,
        }
    }

    pub fn recorder_stop_grace(&self) -> Duration {
        Duration::from_millis(self.recorder_stop_grace_ms)
    }
}

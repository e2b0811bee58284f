use thiserror::Error;

/// Fatal session errors surfaced to the caller as blocking failures.
///
/// Everything else (recording faults, dropped frames, late transcript
/// fragments) degrades gracefully and the session still produces a result.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The transport rejected the session outright (bad credentials,
    /// malformed setup). Never retried; the user must reload.
    #[error("dialogue transport rejected the session: {0}")]
    Configuration(String),

    /// The connection dropped mid-session and the reconnect budget is spent.
    #[error("connection lost after {attempts} reconnect attempts: {reason}")]
    ConnectionLost { attempts: u32, reason: String },

    /// Camera/microphone acquisition failed at initialization.
    #[error("media access denied: {0}")]
    MediaAccess(String),
}

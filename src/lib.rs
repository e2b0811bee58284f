pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod transport;

pub use audio::{
    AudioFile, AudioFrame, AudioTrack, CaptureBackend, CaptureBackendFactory, CaptureConfig,
    CaptureSource, CaptureStreams, PlaybackScheduler, RecorderConfig, RecordingArtifact,
    SessionRecorder,
};
pub use config::Config;
pub use error::EngineError;
pub use http::{create_router, AppState};
pub use session::{
    SessionConfig, SessionDescriptor, SessionEngine, SessionHandle, SessionOutcome, SessionStats,
    SessionStatus, Speaker, TranscriptEntry, Verdict,
};
pub use transport::{
    ConnectionState, DialogueConnection, DialogueConnector, DialogueHandle, NatsDialogueConnector,
    PlaybackSink, ServerEvent, TransportError,
};

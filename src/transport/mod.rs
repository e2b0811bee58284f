//! Live dialogue transport contract
//!
//! The engine talks to the remote conversational agent through a
//! bidirectional message channel. This module specifies the abstract
//! contract: client-to-server operations on `DialogueHandle`,
//! server-to-client events as `ServerEvent`, and connection
//! establishment through `DialogueConnector`. The NATS implementation
//! lives in `nats`; the `supervisor` owns retry and state-machine
//! concerns on top of whichever implementation is plugged in.

pub mod messages;
pub mod nats;
pub mod supervisor;

pub use messages::{
    AudioFrameMessage, ServerEventMessage, SessionSetupMessage, SystemTextMessage,
    ToolResponseMessage,
};
pub use nats::{NatsCaptureBackend, NatsDialogueConnector, NatsPlaybackSink};
pub use supervisor::{ConnectionState, ConnectionSupervisor, DropDisposition, RetryBudget};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::session::config::SessionDescriptor;
use crate::session::transcript::Speaker;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("transport closed")]
    Closed,
}

/// Server-to-client event delivered to the engine's event loop.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Opened,
    AudioFrame(Vec<u8>),
    PartialTranscript { speaker: Speaker, text: String },
    TurnComplete,
    Interrupted,
    ToolCall {
        name: String,
        args: serde_json::Value,
        id: String,
    },
    Closed { code: Option<i32> },
    Error { message: String },
}

/// Send half of an established dialogue connection.
#[async_trait::async_trait]
pub trait DialogueHandle: Send + Sync {
    /// Transmit one encoded microphone frame.
    async fn send_audio_frame(&self, pcm: &[u8]) -> Result<(), TransportError>;

    /// Send a system-directed text message to the agent.
    async fn send_text(&self, text: &str) -> Result<(), TransportError>;

    /// Acknowledge a tool call.
    async fn send_tool_response(
        &self,
        id: &str,
        payload: serde_json::Value,
    ) -> Result<(), TransportError>;

    /// Close the connection.
    async fn close(&self) -> Result<(), TransportError>;
}

/// One established connection: send handle plus the ordered event stream.
///
/// Exactly one handler set exists per connection attempt; a reconnect
/// always produces a brand new `DialogueConnection`.
pub struct DialogueConnection {
    pub handle: Box<dyn DialogueHandle>,
    pub events: mpsc::Receiver<ServerEvent>,
}

/// Factory for dialogue connections.
#[async_trait::async_trait]
pub trait DialogueConnector: Send + Sync {
    async fn connect(
        &self,
        descriptor: &SessionDescriptor,
    ) -> Result<DialogueConnection, TransportError>;
}

/// Direct-listen output for agent speech.
///
/// Scheduled agent buffers are drained here so the candidate hears the
/// agent, in parallel with the recording mix.
#[async_trait::async_trait]
pub trait PlaybackSink: Send + Sync {
    async fn play(&self, samples: &[i16]) -> Result<(), TransportError>;
}

// NATS-backed dialogue transport
//
// Per-session subjects carry the conversation:
//   dialogue.start.<id>          session setup (client -> service)
//   dialogue.audio.<id>          candidate mic frames (client -> service)
//   dialogue.text.<id>           system-directed text (client -> service)
//   dialogue.tool_response.<id>  tool acknowledgements (client -> service)
//   dialogue.events.<id>         server events (service -> client)
//   media.playback.<id>          agent speech to the candidate's client
//   media.mic.<id>               candidate mic relay (browser -> engine)
//   media.camera.<id>            candidate camera chunks (browser -> engine)

use anyhow::{Context, Result};
use base64::Engine;
use chrono::Utc;
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::messages::{
    AudioFrameMessage, ServerEventMessage, SessionSetupMessage, SystemTextMessage,
    ToolResponseMessage,
};
use super::{
    DialogueConnection, DialogueConnector, DialogueHandle, PlaybackSink, ServerEvent,
    TransportError,
};
use crate::audio::backend::{AudioFrame, AudioTrack, CaptureBackend, CaptureConfig, CaptureStreams};
use crate::audio::codec;
use crate::session::config::SessionDescriptor;
use crate::session::transcript::Speaker;

fn parse_speaker(raw: &str) -> Option<Speaker> {
    match raw {
        "candidate" | "user" => Some(Speaker::Candidate),
        "agent" | "model" => Some(Speaker::Agent),
        _ => None,
    }
}

/// Convert a wire event into an engine event.
///
/// Returns None for events that fail to decode; the stream keeps going.
fn convert_event(message: ServerEventMessage) -> Option<ServerEvent> {
    match message {
        ServerEventMessage::Opened => Some(ServerEvent::Opened),
        ServerEventMessage::Closed { code } => Some(ServerEvent::Closed { code }),
        ServerEventMessage::Error { message } => Some(ServerEvent::Error { message }),
        ServerEventMessage::AudioFrame { pcm } => {
            match base64::engine::general_purpose::STANDARD.decode(&pcm) {
                Ok(bytes) => Some(ServerEvent::AudioFrame(bytes)),
                Err(e) => {
                    warn!("Failed to decode agent audio payload: {}", e);
                    None
                }
            }
        }
        ServerEventMessage::PartialTranscript { speaker, text } => {
            match parse_speaker(&speaker) {
                Some(speaker) => Some(ServerEvent::PartialTranscript { speaker, text }),
                None => {
                    warn!("Unknown transcript speaker: {}", speaker);
                    None
                }
            }
        }
        ServerEventMessage::TurnComplete => Some(ServerEvent::TurnComplete),
        ServerEventMessage::Interrupted => Some(ServerEvent::Interrupted),
        ServerEventMessage::ToolCall { name, args, id } => {
            Some(ServerEvent::ToolCall { name, args, id })
        }
    }
}

/// Connects dialogue sessions over NATS.
pub struct NatsDialogueConnector {
    url: String,
    sample_rate: u32,
    channels: u16,
}

impl NatsDialogueConnector {
    pub fn new(url: impl Into<String>, sample_rate: u32, channels: u16) -> Self {
        Self {
            url: url.into(),
            sample_rate,
            channels,
        }
    }
}

#[async_trait::async_trait]
impl DialogueConnector for NatsDialogueConnector {
    async fn connect(
        &self,
        descriptor: &SessionDescriptor,
    ) -> Result<DialogueConnection, TransportError> {
        info!("Connecting dialogue transport at {}", self.url);

        let client = async_nats::connect(&self.url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let events_subject = format!("dialogue.events.{}", descriptor.session_id);
        let mut subscriber = client
            .subscribe(events_subject)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        // Announce the session so the dialogue service can spin up the agent
        let setup = SessionSetupMessage {
            session_id: descriptor.session_id.clone(),
            candidate_name: descriptor.candidate_name.clone(),
            target_role: descriptor.target_role.clone(),
            language: descriptor.language.clone(),
            timestamp: Utc::now().to_rfc3339(),
        };
        let payload =
            serde_json::to_vec(&setup).map_err(|e| TransportError::Connect(e.to_string()))?;
        client
            .publish(format!("dialogue.start.{}", descriptor.session_id), payload.into())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (event_tx, event_rx) = mpsc::channel(256);

        // One forwarder per connection: parse wire events and hand them
        // to the engine in arrival order
        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<ServerEventMessage>(&msg.payload) {
                    Ok(message) => {
                        if let Some(event) = convert_event(message) {
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse dialogue event: {}", e);
                    }
                }
            }

            // Subscription ended without an explicit close event
            let _ = event_tx.send(ServerEvent::Closed { code: None }).await;
        });

        let handle = NatsDialogueHandle {
            client,
            session_id: descriptor.session_id.clone(),
            sequence: AtomicU32::new(0),
            sample_rate: self.sample_rate,
            channels: self.channels,
        };

        Ok(DialogueConnection {
            handle: Box::new(handle),
            events: event_rx,
        })
    }
}

struct NatsDialogueHandle {
    client: async_nats::Client,
    session_id: String,
    sequence: AtomicU32,
    sample_rate: u32,
    channels: u16,
}

#[async_trait::async_trait]
impl DialogueHandle for NatsDialogueHandle {
    async fn send_audio_frame(&self, pcm: &[u8]) -> Result<(), TransportError> {
        let message = AudioFrameMessage {
            session_id: self.session_id.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            pcm: base64::engine::general_purpose::STANDARD.encode(pcm),
            sample_rate: self.sample_rate,
            channels: self.channels,
            timestamp: Utc::now().to_rfc3339(),
        };

        let payload =
            serde_json::to_vec(&message).map_err(|e| TransportError::Send(e.to_string()))?;

        self.client
            .publish(format!("dialogue.audio.{}", self.session_id), payload.into())
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        let message = SystemTextMessage {
            session_id: self.session_id.clone(),
            text: text.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };

        let payload =
            serde_json::to_vec(&message).map_err(|e| TransportError::Send(e.to_string()))?;

        self.client
            .publish(format!("dialogue.text.{}", self.session_id), payload.into())
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn send_tool_response(
        &self,
        id: &str,
        payload: serde_json::Value,
    ) -> Result<(), TransportError> {
        let message = ToolResponseMessage {
            session_id: self.session_id.clone(),
            id: id.to_string(),
            payload,
        };

        let payload =
            serde_json::to_vec(&message).map_err(|e| TransportError::Send(e.to_string()))?;

        self.client
            .publish(
                format!("dialogue.tool_response.{}", self.session_id),
                payload.into(),
            )
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        // async-nats handles cleanup on drop
        Ok(())
    }
}

/// Publishes agent speech to the candidate's client.
pub struct NatsPlaybackSink {
    client: async_nats::Client,
    session_id: String,
    sequence: AtomicU32,
    sample_rate: u32,
    channels: u16,
}

impl NatsPlaybackSink {
    pub async fn connect(
        url: &str,
        session_id: String,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, TransportError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Self {
            client,
            session_id,
            sequence: AtomicU32::new(0),
            sample_rate,
            channels,
        })
    }
}

#[async_trait::async_trait]
impl PlaybackSink for NatsPlaybackSink {
    async fn play(&self, samples: &[i16]) -> Result<(), TransportError> {
        let message = AudioFrameMessage {
            session_id: self.session_id.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            pcm: base64::engine::general_purpose::STANDARD.encode(codec::encode_frame(samples)),
            sample_rate: self.sample_rate,
            channels: self.channels,
            timestamp: Utc::now().to_rfc3339(),
        };

        let payload =
            serde_json::to_vec(&message).map_err(|e| TransportError::Send(e.to_string()))?;

        self.client
            .publish(format!("media.playback.{}", self.session_id), payload.into())
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

/// Capture backend fed by the candidate's browser over NATS.
pub struct NatsCaptureBackend {
    url: String,
    session_id: String,
    config: CaptureConfig,
    capturing: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl NatsCaptureBackend {
    pub fn new(url: String, session_id: String, config: CaptureConfig) -> Self {
        Self {
            url,
            session_id,
            config,
            capturing: Arc::new(AtomicBool::new(false)),
            tasks: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for NatsCaptureBackend {
    async fn start(&mut self) -> Result<CaptureStreams> {
        info!("Starting NATS capture for session {}", self.session_id);

        let client = async_nats::connect(&self.url)
            .await
            .context("Failed to connect to NATS for candidate media")?;

        let mut mic_sub = client
            .subscribe(format!("media.mic.{}", self.session_id))
            .await
            .context("Failed to subscribe to candidate microphone")?;

        let mut camera_sub = client
            .subscribe(format!("media.camera.{}", self.session_id))
            .await
            .context("Failed to subscribe to candidate camera")?;

        let (audio_tx, audio_rx) = mpsc::channel(100);
        let (video_tx, video_rx) = mpsc::channel(100);

        self.capturing.store(true, Ordering::SeqCst);

        let frame_duration_ms = self.config.frame_duration_ms;
        let capturing = Arc::clone(&self.capturing);
        let mic_task = tokio::spawn(async move {
            while let Some(msg) = mic_sub.next().await {
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }

                let message = match serde_json::from_slice::<AudioFrameMessage>(&msg.payload) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("Failed to parse mic frame message: {}", e);
                        continue;
                    }
                };

                let bytes =
                    match base64::engine::general_purpose::STANDARD.decode(&message.pcm) {
                        Ok(b) => b,
                        Err(e) => {
                            warn!("Failed to decode mic frame payload: {}", e);
                            continue;
                        }
                    };

                let samples = match codec::decode_frame(&bytes) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!("Malformed mic frame: {}", e);
                        continue;
                    }
                };

                let frame = AudioFrame {
                    samples,
                    sample_rate: message.sample_rate,
                    channels: message.channels,
                    timestamp_ms: message.sequence as u64 * frame_duration_ms,
                    track: AudioTrack::Microphone,
                };

                // Real-time stream: drop rather than backlog when full
                if audio_tx.try_send(frame).is_err() {
                    continue;
                }
            }
        });

        let capturing = Arc::clone(&self.capturing);
        let camera_task = tokio::spawn(async move {
            while let Some(msg) = camera_sub.next().await {
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }

                if video_tx.try_send(msg.payload.to_vec()).is_err() {
                    continue;
                }
            }
        });

        self.tasks.push(mic_task);
        self.tasks.push(camera_task);

        Ok(CaptureStreams {
            audio: audio_rx,
            video: video_rx,
        })
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);

        for task in self.tasks.drain(..) {
            task.abort();
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "nats"
    }
}

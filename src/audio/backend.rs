use anyhow::Result;
use tokio::sync::mpsc;

/// Which track a frame belongs to in the recording mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioTrack {
    /// Candidate's microphone.
    Microphone,
    /// Agent speech drained from the playback scheduler.
    Agent,
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
    /// Track this frame belongs to
    pub track: AudioTrack,
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate
    pub sample_rate: u32,
    /// Target channel count (1 = mono)
    pub channels: u16,
    /// Audio per frame; smaller frames mean lower round-trip latency
    pub frame_duration_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_duration_ms: 10,
        }
    }
}

/// Streams produced by a started capture backend.
///
/// The camera stream carries opaque container chunks; the engine never
/// inspects them, it only records them.
pub struct CaptureStreams {
    pub audio: mpsc::Receiver<AudioFrame>,
    pub video: mpsc::Receiver<Vec<u8>>,
}

/// Candidate media capture backend trait
///
/// Implementations:
/// - NATS: candidate's client publishes mic frames and camera chunks to
///   per-session subjects (see `transport::nats`)
/// - File: read mic audio from a WAV fixture (tests/demos)
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing candidate media.
    ///
    /// Failure here is fatal to session initialization and reported as a
    /// media-access error.
    async fn start(&mut self) -> Result<CaptureStreams>;

    /// Stop capturing media
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Capture source type
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Candidate media relayed over NATS subjects
    Nats { url: String, session_id: String },
    /// Microphone audio from a WAV file (no camera track)
    File(String),
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    pub fn create(source: CaptureSource, config: CaptureConfig) -> Result<Box<dyn CaptureBackend>> {
        match source {
            CaptureSource::Nats { url, session_id } => {
                use crate::transport::nats::NatsCaptureBackend;
                Ok(Box::new(NatsCaptureBackend::new(url, session_id, config)))
            }

            CaptureSource::File(path) => {
                use super::file::FileCaptureBackend;
                Ok(Box::new(FileCaptureBackend::new(path, config)))
            }
        }
    }
}

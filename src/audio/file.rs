use anyhow::{Context, Result};
use hound::WavReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use super::backend::{
    AudioFrame, AudioTrack, CaptureBackend, CaptureConfig, CaptureStreams,
};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Slice the file into fixed-duration microphone frames.
    pub fn frames(&self, frame_duration_ms: u64) -> Vec<AudioFrame> {
        let samples_per_frame =
            (self.sample_rate as u64 * frame_duration_ms / 1000) as usize
                * self.channels as usize;

        if samples_per_frame == 0 {
            return Vec::new();
        }

        self.samples
            .chunks(samples_per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * frame_duration_ms,
                track: AudioTrack::Microphone,
            })
            .collect()
    }
}

/// Capture backend that replays a WAV fixture as the candidate's
/// microphone, paced in real time. Produces no camera track.
pub struct FileCaptureBackend {
    path: String,
    config: CaptureConfig,
    capturing: Arc<AtomicBool>,
}

impl FileCaptureBackend {
    pub fn new(path: String, config: CaptureConfig) -> Self {
        Self {
            path,
            config,
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FileCaptureBackend {
    async fn start(&mut self) -> Result<CaptureStreams> {
        let audio = AudioFile::open(&self.path)?;

        if audio.sample_rate != self.config.sample_rate
            || audio.channels != self.config.channels
        {
            anyhow::bail!(
                "Fixture format mismatch: expected {}Hz {}ch, got {}Hz {}ch",
                self.config.sample_rate,
                self.config.channels,
                audio.sample_rate,
                audio.channels
            );
        }

        let frames = audio.frames(self.config.frame_duration_ms);
        let pace = Duration::from_millis(self.config.frame_duration_ms);

        let (audio_tx, audio_rx) = mpsc::channel(100);
        // No camera on a file source; dropping the sender closes the stream
        let (_video_tx, video_rx) = mpsc::channel::<Vec<u8>>(1);

        self.capturing.store(true, Ordering::SeqCst);
        let capturing = Arc::clone(&self.capturing);

        tokio::spawn(async move {
            for frame in frames {
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }

                if audio_tx.send(frame).await.is_err() {
                    break;
                }

                tokio::time::sleep(pace).await;
            }

            capturing.store(false, Ordering::SeqCst);
        });

        Ok(CaptureStreams {
            audio: audio_rx,
            video: video_rx,
        })
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "file"
    }
}

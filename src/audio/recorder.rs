// Session recorder
//
// Binds the mixed audio track (microphone + agent) and the camera chunk
// stream into one continuous recording artifact. The recorder runs as
// its own task fed through a channel; on session end it is stopped and
// awaited with a short bound for the final chunk. A recorder that never
// initialized or produced no data is non-fatal: the session proceeds
// without an artifact.

use std::io::Cursor;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::backend::AudioFrame;
use super::mixer::{MixerConfig, TrackMixer};

/// Inputs accepted by the session recorder.
#[derive(Debug)]
pub enum RecorderInput {
    /// A frame for the audio mix (microphone or agent track).
    Audio(AudioFrame),
    /// An opaque camera container chunk.
    Video(Vec<u8>),
}

/// The assembled recording of one session.
#[derive(Debug, Clone)]
pub struct RecordingArtifact {
    /// Complete WAV body of the mixed audio track.
    pub audio_wav: Vec<u8>,
    /// Accumulated camera chunks; empty when no camera track existed.
    pub video: Vec<u8>,
    pub audio_duration_secs: f64,
    pub sample_rate: u32,
}

/// Configuration for the session recorder.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Mixer alignment window, see `MixerConfig`.
    pub max_buffer_delay_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            max_buffer_delay_ms: 200,
        }
    }
}

pub struct SessionRecorder {
    input_tx: mpsc::Sender<RecorderInput>,
    task: JoinHandle<Option<RecordingArtifact>>,
    config: RecorderConfig,
}

impl SessionRecorder {
    /// Spawn the recorder task bound to the mixed audio + camera chunks.
    pub fn start(config: RecorderConfig) -> Self {
        let (input_tx, mut input_rx) = mpsc::channel::<RecorderInput>(256);

        info!(
            "Session recorder started: {}Hz, {} channels",
            config.sample_rate, config.channels
        );

        let task_config = config.clone();
        let task = tokio::spawn(async move {
            let mut mixer = TrackMixer::new(MixerConfig {
                sample_rate: task_config.sample_rate,
                channels: task_config.channels,
                max_buffer_delay_ms: task_config.max_buffer_delay_ms,
            });

            let mut audio_samples: Vec<i16> = Vec::new();
            let mut video: Vec<u8> = Vec::new();

            while let Some(input) = input_rx.recv().await {
                match input {
                    RecorderInput::Audio(frame) => {
                        mixer.push(frame);
                        while let Some(chunk) = mixer.mix_next() {
                            audio_samples.extend_from_slice(&chunk.samples);
                        }
                    }
                    RecorderInput::Video(chunk) => {
                        video.extend_from_slice(&chunk);
                    }
                }
            }

            // Channel closed: flush whatever is still buffered
            for chunk in mixer.drain() {
                audio_samples.extend_from_slice(&chunk.samples);
            }

            assemble_artifact(audio_samples, video, &task_config)
        });

        Self {
            input_tx,
            task,
            config,
        }
    }

    /// Sender used to feed frames and camera chunks into the recorder.
    pub fn sender(&self) -> mpsc::Sender<RecorderInput> {
        self.input_tx.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Stop the recorder and wait, bounded by `grace`, for the final
    /// chunk to materialize. Returns None on timeout or empty recording.
    pub async fn stop(self, grace: Duration) -> Option<RecordingArtifact> {
        // Closing the channel signals the task to finish
        drop(self.input_tx);

        match tokio::time::timeout(grace, self.task).await {
            Ok(Ok(artifact)) => artifact,
            Ok(Err(e)) => {
                error!("Recorder task panicked: {}", e);
                None
            }
            Err(_) => {
                warn!("Recorder did not flush within {:?}, discarding", grace);
                None
            }
        }
    }
}

/// Build the final artifact, or None when nothing was recorded.
fn assemble_artifact(
    audio_samples: Vec<i16>,
    video: Vec<u8>,
    config: &RecorderConfig,
) -> Option<RecordingArtifact> {
    if audio_samples.is_empty() && video.is_empty() {
        warn!("Recorder produced no data, session proceeds without artifact");
        return None;
    }

    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut audio_wav = Vec::new();
    {
        let cursor = Cursor::new(&mut audio_wav);
        let mut writer = match hound::WavWriter::new(cursor, spec) {
            Ok(w) => w,
            Err(e) => {
                error!("Failed to create WAV writer: {}", e);
                return None;
            }
        };

        for &sample in &audio_samples {
            if let Err(e) = writer.write_sample(sample) {
                error!("Failed to write sample to WAV: {}", e);
                return None;
            }
        }

        if let Err(e) = writer.finalize() {
            error!("Failed to finalize WAV body: {}", e);
            return None;
        }
    }

    let audio_duration_secs = audio_samples.len() as f64
        / (config.sample_rate as f64 * config.channels as f64);

    info!(
        "Recording assembled: {:.1}s audio ({} bytes), {} video bytes",
        audio_duration_secs,
        audio_wav.len(),
        video.len()
    );

    Some(RecordingArtifact {
        audio_wav,
        video,
        audio_duration_secs,
        sample_rate: config.sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::AudioTrack;

    fn mic_frame(samples: Vec<i16>, timestamp_ms: u64) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate: 16000,
            channels: 1,
            timestamp_ms,
            track: AudioTrack::Microphone,
        }
    }

    #[tokio::test]
    async fn test_recorder_assembles_wav_artifact() {
        let recorder = SessionRecorder::start(RecorderConfig::default());
        let tx = recorder.sender();

        for i in 0..10u64 {
            let frame = mic_frame(vec![100i16; 160], i * 10);
            tx.send(RecorderInput::Audio(frame)).await.unwrap();
        }
        drop(tx);

        let artifact = recorder
            .stop(Duration::from_secs(2))
            .await
            .expect("artifact should exist");

        // 10 frames * 160 samples at 16kHz = 100ms
        assert!((artifact.audio_duration_secs - 0.1).abs() < 1e-9);
        assert!(!artifact.audio_wav.is_empty());
        assert!(artifact.video.is_empty());
    }

    #[tokio::test]
    async fn test_recorder_accumulates_video_chunks() {
        let recorder = SessionRecorder::start(RecorderConfig::default());
        let tx = recorder.sender();

        tx.send(RecorderInput::Video(vec![1, 2, 3])).await.unwrap();
        tx.send(RecorderInput::Video(vec![4, 5])).await.unwrap();
        drop(tx);

        let artifact = recorder
            .stop(Duration::from_secs(2))
            .await
            .expect("artifact should exist");

        assert_eq!(artifact.video, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_empty_recording_yields_no_artifact() {
        let recorder = SessionRecorder::start(RecorderConfig::default());

        let artifact = recorder.stop(Duration::from_secs(2)).await;
        assert!(artifact.is_none());
    }
}

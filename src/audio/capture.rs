// Outbound capture pipeline
//
// Microphone frames are a continuous real-time stream: each one is
// encoded and handed to the transport immediately, and a failed send is
// dropped rather than buffered, since a missed frame beats unbounded
// backlog.
// The pipeline also measures per-frame energy so the liveness monitor
// knows when the candidate last spoke.

use tracing::debug;

use super::backend::AudioFrame;
use super::codec;

/// Tuning for the outbound capture path.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// RMS level at or above which a frame counts as speech.
    pub energy_threshold: f32,
    /// When true, only frames at or above the threshold are transmitted.
    ///
    /// Saves bandwidth but risks clipping soft speech; off by default so
    /// every captured frame reaches the recognizer.
    pub energy_gate: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.015,
            energy_gate: false,
        }
    }
}

/// Result of processing one captured frame.
#[derive(Debug)]
pub struct ProcessedFrame {
    /// Frame crossed the speech-energy threshold.
    pub speech: bool,
    /// Wire bytes to transmit, if this frame should be sent.
    pub wire: Option<Vec<u8>>,
}

pub struct CapturePipeline {
    config: PipelineConfig,
    frames_processed: u64,
    frames_gated: u64,
}

impl CapturePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            frames_processed: 0,
            frames_gated: 0,
        }
    }

    /// Encode one microphone frame for the wire and measure speech energy.
    pub fn process(&mut self, frame: &AudioFrame) -> ProcessedFrame {
        self.frames_processed += 1;

        let energy = codec::rms_energy(&frame.samples);
        let speech = energy >= self.config.energy_threshold;

        let transmit = !self.config.energy_gate || speech;
        if !transmit {
            self.frames_gated += 1;
            debug!(
                "Gating silent frame at {}ms (energy {:.4})",
                frame.timestamp_ms, energy
            );
        }

        ProcessedFrame {
            speech,
            wire: transmit.then(|| codec::encode_frame(&frame.samples)),
        }
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn frames_gated(&self) -> u64 {
        self.frames_gated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::AudioTrack;

    fn frame(samples: Vec<i16>) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 0,
            track: AudioTrack::Microphone,
        }
    }

    fn loud_samples() -> Vec<i16> {
        vec![i16::MAX / 2; 160]
    }

    #[test]
    fn test_every_frame_transmitted_by_default() {
        let mut pipeline = CapturePipeline::new(PipelineConfig::default());

        let silent = pipeline.process(&frame(vec![0i16; 160]));
        assert!(!silent.speech);
        assert!(silent.wire.is_some(), "silence is still transmitted");

        let loud = pipeline.process(&frame(loud_samples()));
        assert!(loud.speech);
        assert!(loud.wire.is_some());

        assert_eq!(pipeline.frames_processed(), 2);
        assert_eq!(pipeline.frames_gated(), 0);
    }

    #[test]
    fn test_energy_gate_drops_silent_frames() {
        let mut pipeline = CapturePipeline::new(PipelineConfig {
            energy_threshold: 0.015,
            energy_gate: true,
        });

        let silent = pipeline.process(&frame(vec![0i16; 160]));
        assert!(silent.wire.is_none());

        let loud = pipeline.process(&frame(loud_samples()));
        assert!(loud.wire.is_some());

        assert_eq!(pipeline.frames_gated(), 1);
    }

    #[test]
    fn test_wire_encoding_matches_codec() {
        let mut pipeline = CapturePipeline::new(PipelineConfig::default());
        let samples = loud_samples();

        let processed = pipeline.process(&frame(samples.clone()));
        assert_eq!(processed.wire.unwrap(), codec::encode_frame(&samples));
    }
}

// Track mixer for the session recording
//
// Combines the candidate's microphone track with agent speech drained
// from the playback scheduler into one recording track. Frames from
// each track are buffered, paired off, and mixed by simple addition
// with clipping.

use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

use super::backend::{AudioFrame, AudioTrack};

/// Configuration for the track mixer
#[derive(Debug, Clone)]
pub struct MixerConfig {
    /// Target sample rate for output
    pub sample_rate: u32,
    /// Number of channels in output
    pub channels: u16,
    /// Maximum buffering delay in milliseconds (default: 200ms)
    /// Frames older than this are dropped to prevent unbounded buffering
    pub max_buffer_delay_ms: u64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            max_buffer_delay_ms: 200,
        }
    }
}

/// One mixed chunk of the recording track.
#[derive(Debug, Clone)]
pub struct MixedChunk {
    pub samples: Vec<i16>,
    pub timestamp_ms: u64,
}

/// Mixes the microphone and agent tracks into the recording track.
pub struct TrackMixer {
    config: MixerConfig,
    buffers: HashMap<AudioTrack, VecDeque<AudioFrame>>,
    current_position_ms: u64,
}

impl TrackMixer {
    pub fn new(config: MixerConfig) -> Self {
        let mut buffers = HashMap::new();
        buffers.insert(AudioTrack::Microphone, VecDeque::new());
        buffers.insert(AudioTrack::Agent, VecDeque::new());

        Self {
            config,
            buffers,
            current_position_ms: 0,
        }
    }

    /// Buffer a frame on its track.
    pub fn push(&mut self, frame: AudioFrame) {
        // Validate frame format
        if frame.sample_rate != self.config.sample_rate {
            warn!(
                "Frame sample rate mismatch: expected {}, got {}. Dropping frame.",
                self.config.sample_rate, frame.sample_rate
            );
            return;
        }

        if frame.channels != self.config.channels {
            warn!(
                "Frame channel count mismatch: expected {}, got {}. Dropping frame.",
                self.config.channels, frame.channels
            );
            return;
        }

        if let Some(buffer) = self.buffers.get_mut(&frame.track) {
            buffer.push_back(frame);
        }

        self.cleanup_old_frames();
    }

    /// Remove frames that are too old (beyond max buffer delay)
    fn cleanup_old_frames(&mut self) {
        let cutoff_time = self
            .current_position_ms
            .saturating_sub(self.config.max_buffer_delay_ms);

        for (track, buffer) in &mut self.buffers {
            while let Some(frame) = buffer.front() {
                if frame.timestamp_ms < cutoff_time {
                    debug!(
                        "Dropping old {:?} frame at {}ms (current position: {}ms)",
                        track, frame.timestamp_ms, self.current_position_ms
                    );
                    buffer.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    /// Mix the next chunk from the buffered tracks.
    ///
    /// Returns None when no data is available on either track.
    pub fn mix_next(&mut self) -> Option<MixedChunk> {
        let mut frames_to_mix: Vec<AudioFrame> = Vec::new();

        for buffer in self.buffers.values_mut() {
            if let Some(frame) = buffer.pop_front() {
                frames_to_mix.push(frame);
            }
        }

        if frames_to_mix.is_empty() {
            return None;
        }

        // Single track active: pass it through untouched
        if frames_to_mix.len() == 1 {
            let frame = frames_to_mix.into_iter().next()?;
            self.current_position_ms = frame.timestamp_ms;
            return Some(MixedChunk {
                samples: frame.samples,
                timestamp_ms: frame.timestamp_ms,
            });
        }

        let mixed = Self::mix_frames(&frames_to_mix);
        self.current_position_ms = mixed.timestamp_ms;
        Some(mixed)
    }

    /// Drain everything still buffered.
    pub fn drain(&mut self) -> Vec<MixedChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.mix_next() {
            chunks.push(chunk);
        }
        chunks
    }

    /// Mix frames together by adding their samples, clipped to i16 range.
    fn mix_frames(frames: &[AudioFrame]) -> MixedChunk {
        // Use the earliest timestamp
        let timestamp_ms = frames
            .iter()
            .map(|f| f.timestamp_ms)
            .min()
            .unwrap_or(0);

        // Output length follows the longest frame
        let max_len = frames.iter().map(|f| f.samples.len()).max().unwrap_or(0);
        let mut mixed_samples = Vec::with_capacity(max_len);

        for i in 0..max_len {
            let mut sum: i32 = 0;

            for frame in frames {
                let sample = frame.samples.get(i).copied().unwrap_or(0);
                sum += sample as i32;
            }

            let mixed = sum.clamp(i16::MIN as i32, i16::MAX as i32);
            mixed_samples.push(mixed as i16);
        }

        MixedChunk {
            samples: mixed_samples,
            timestamp_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(track: AudioTrack, samples: Vec<i16>, timestamp_ms: u64) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate: 16000,
            channels: 1,
            timestamp_ms,
            track,
        }
    }

    #[test]
    fn test_mixer_creation() {
        let mixer = TrackMixer::new(MixerConfig::default());

        assert_eq!(mixer.buffers.len(), 2);
        assert_eq!(mixer.current_position_ms, 0);
    }

    #[test]
    fn test_single_track_passes_through() {
        let mut mixer = TrackMixer::new(MixerConfig::default());

        mixer.push(frame(AudioTrack::Microphone, vec![100, 200, 300], 0));

        let chunk = mixer.mix_next().unwrap();
        assert_eq!(chunk.samples, vec![100, 200, 300]);
        assert!(mixer.mix_next().is_none());
    }

    #[test]
    fn test_mix_both_tracks() {
        let mut mixer = TrackMixer::new(MixerConfig::default());

        mixer.push(frame(AudioTrack::Microphone, vec![100, 200, 300], 0));
        mixer.push(frame(AudioTrack::Agent, vec![50, 100, 150], 0));

        let chunk = mixer.mix_next().unwrap();
        assert_eq!(chunk.samples, vec![150, 300, 450]);
    }

    #[test]
    fn test_mix_with_clipping() {
        let mut mixer = TrackMixer::new(MixerConfig::default());

        mixer.push(frame(AudioTrack::Microphone, vec![i16::MAX - 100], 0));
        mixer.push(frame(AudioTrack::Agent, vec![200], 0));

        let chunk = mixer.mix_next().unwrap();
        assert_eq!(chunk.samples[0], i16::MAX); // Clipped to max
    }

    #[test]
    fn test_mix_different_lengths() {
        let mut mixer = TrackMixer::new(MixerConfig::default());

        mixer.push(frame(AudioTrack::Microphone, vec![100, 200], 0));
        mixer.push(frame(AudioTrack::Agent, vec![50, 100, 150, 200], 0));

        let chunk = mixer.mix_next().unwrap();
        assert_eq!(chunk.samples.len(), 4); // Length of longer frame
        assert_eq!(chunk.samples[0], 150);
        assert_eq!(chunk.samples[1], 300);
        assert_eq!(chunk.samples[2], 150); // Mic frame ended
        assert_eq!(chunk.samples[3], 200);
    }

    #[test]
    fn test_format_mismatch_dropped() {
        let mut mixer = TrackMixer::new(MixerConfig::default());

        let mut bad = frame(AudioTrack::Microphone, vec![1, 2, 3], 0);
        bad.sample_rate = 44100;
        mixer.push(bad);

        assert!(mixer.mix_next().is_none());
    }

    #[test]
    fn test_drain_empties_buffers() {
        let mut mixer = TrackMixer::new(MixerConfig::default());

        mixer.push(frame(AudioTrack::Microphone, vec![1], 0));
        mixer.push(frame(AudioTrack::Microphone, vec![2], 10));
        mixer.push(frame(AudioTrack::Agent, vec![3], 0));

        let chunks = mixer.drain();
        assert_eq!(chunks.len(), 2);
        assert!(mixer.mix_next().is_none());
    }
}

// Wire-level audio codec
//
// The dialogue transport carries 16-bit little-endian PCM. Outbound
// microphone frames are encoded here; inbound agent speech is decoded
// back into samples before scheduling. Both directions are pure and
// stateless.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    /// A PCM16 frame must contain a whole number of samples.
    #[error("audio frame has odd byte length: {0}")]
    TruncatedFrame(usize),
}

/// Encode raw capture samples into the wire representation (PCM16-LE).
pub fn encode_frame(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Decode an inbound wire frame back into samples.
pub fn decode_frame(bytes: &[u8]) -> Result<Vec<i16>, CodecError> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::TruncatedFrame(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Playback duration of a mono sample buffer at the given rate.
pub fn buffer_duration(sample_count: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }

    Duration::from_secs_f64(sample_count as f64 / sample_rate as f64)
}

/// Short-window RMS energy of a frame, normalized to 0.0..=1.0.
///
/// Used by the capture pipeline to mark "speech observed now".
pub fn rms_energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = s as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN, 12345];
        let bytes = encode_frame(&samples);

        assert_eq!(bytes.len(), samples.len() * 2);

        let decoded = decode_frame(&bytes).unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_decode_rejects_odd_length() {
        let result = decode_frame(&[0x01, 0x02, 0x03]);
        assert!(matches!(result, Err(CodecError::TruncatedFrame(3))));
    }

    #[test]
    fn test_buffer_duration() {
        // 160 samples at 16kHz = 10ms
        assert_eq!(buffer_duration(160, 16000), Duration::from_millis(10));
        assert_eq!(buffer_duration(16000, 16000), Duration::from_secs(1));
        assert_eq!(buffer_duration(100, 0), Duration::ZERO);
    }

    #[test]
    fn test_rms_energy_silence_is_zero() {
        let silence = vec![0i16; 160];
        assert!(rms_energy(&silence) < 0.0001);
        assert_eq!(rms_energy(&[]), 0.0);
    }

    #[test]
    fn test_rms_energy_loud_signal() {
        // Half-scale square wave has RMS of ~0.5
        let loud: Vec<i16> = (0..160)
            .map(|i| if i % 2 == 0 { i16::MAX / 2 } else { i16::MIN / 2 })
            .collect();
        let energy = rms_energy(&loud);
        assert!(energy > 0.45 && energy < 0.55);
    }
}

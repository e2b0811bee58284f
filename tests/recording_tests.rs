// Integration tests for the session recorder
//
// These tests verify the assembled artifact is a valid WAV body that
// the upload collaborator could write to disk and read back.

use std::time::Duration;
use tempfile::TempDir;

use viva_screen::audio::{AudioFrame, AudioTrack, RecorderConfig, RecorderInput, SessionRecorder};

#[tokio::test]
async fn test_artifact_round_trips_through_disk() {
    let recorder = SessionRecorder::start(RecorderConfig::default());
    let tx = recorder.sender();

    // 1 second of interleaved microphone and agent frames (100ms each
    // track slot, 10ms frames)
    for i in 0..100u64 {
        let track = if i % 2 == 0 {
            AudioTrack::Microphone
        } else {
            AudioTrack::Agent
        };

        let frame = AudioFrame {
            samples: vec![(i as i16) * 10; 160],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: i * 10,
            track,
        };
        tx.send(RecorderInput::Audio(frame)).await.unwrap();
    }
    drop(tx);

    let artifact = recorder
        .stop(Duration::from_secs(2))
        .await
        .expect("artifact should exist");

    // Write the body the way the upload collaborator would
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("screening.wav");
    std::fs::write(&path, &artifact.audio_wav).unwrap();

    let reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);

    let samples: Vec<i16> = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(samples.len(), 16000);
    assert!((artifact.audio_duration_secs - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_recorder_stop_is_bounded() {
    let recorder = SessionRecorder::start(RecorderConfig::default());
    let tx = recorder.sender();

    tx.send(RecorderInput::Video(vec![1, 2, 3])).await.unwrap();
    drop(tx);

    let started = std::time::Instant::now();
    let artifact = recorder.stop(Duration::from_secs(2)).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(artifact.is_some());
}

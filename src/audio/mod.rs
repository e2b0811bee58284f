pub mod backend;
pub mod capture;
pub mod codec;
pub mod file;
pub mod mixer;
pub mod playback;
pub mod recorder;

pub use backend::{
    AudioFrame, AudioTrack, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureSource,
    CaptureStreams,
};
pub use capture::{CapturePipeline, PipelineConfig, ProcessedFrame};
pub use codec::CodecError;
pub use file::{AudioFile, FileCaptureBackend};
pub use mixer::{MixedChunk, MixerConfig, TrackMixer};
pub use playback::{PlaybackScheduler, ScheduledBuffer};
pub use recorder::{RecorderConfig, RecorderInput, RecordingArtifact, SessionRecorder};

//! Audio capture, codec and playback for realtime voice sessions.
//!
//! Every stream handled here is mono PCM at 24kHz. Captured audio travels as
//! `f32` samples until it is packed into 16-bit little-endian transport
//! frames; inbound fragments are wrapped in a WAV container and decoded
//! before playback.
//!
//! # Modules
//! - `pcm`: linear <-> PCM16 conversion and base64 transport encoding
//! - `wav`: per-fragment WAV header synthesis and decoding
//! - `capture`: microphone capture re-chunked into fixed-size frames
//! - `playback`: strictly sequential playback queue
//! - `resample`: streaming conversion between device rates and 24kHz

use thiserror::Error;

pub mod capture;
pub mod pcm;
pub mod playback;
pub mod resample;
pub mod wav;

#[cfg(feature = "capture-cpal")]
pub mod cpal_backend;

#[cfg(not(feature = "capture-cpal"))]
pub mod dummy_backend;

pub use capture::{AudioCaptureEncoder, CaptureBackend, CaptureConfig, FrameAssembler, FrameCallback};
pub use playback::{AudioSink, PlaybackQueue};
pub use resample::StreamResampler;

#[cfg(feature = "capture-cpal")]
pub use cpal_backend::{CpalAudioSink as DefaultAudioSink, CpalCaptureBackend as DefaultCaptureBackend};

#[cfg(not(feature = "capture-cpal"))]
pub use dummy_backend::{NullAudioSink as DefaultAudioSink, UnavailableCaptureBackend as DefaultCaptureBackend};

/// Sample rate shared by capture, transport and playback.
pub const SAMPLE_RATE: u32 = 24_000;

/// Mono everywhere.
pub const CHANNELS: u16 = 1;

/// PCM16 transport and container format.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Number of samples in one captured frame.
pub const FRAME_SIZE: usize = 4096;

/// Errors raised by the audio layer.
#[derive(Debug, Error)]
pub enum AudioError {
    /// No input device, or access to it was denied
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Capture was started twice without a stop in between
    #[error("Audio capture already started")]
    AlreadyStarted,

    /// Capture cannot be restarted once stopped
    #[error("Audio capture was stopped and cannot be restarted")]
    NotRestartable,

    /// An inbound fragment could not be decoded
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// The device stream failed while running
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// Sample-rate conversion could not be set up or failed
    #[error("Audio resample error: {0}")]
    Resample(String),
}

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

//! Stand-ins used when the crate is built without `capture-cpal`.

use super::capture::{CaptureBackend, CaptureConfig, SampleHandler};
use super::playback::AudioSink;
use super::{AudioError, AudioResult};

/// Capture backend that never finds a device.
#[derive(Debug, Default)]
pub struct UnavailableCaptureBackend;

impl UnavailableCaptureBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for UnavailableCaptureBackend {
    fn open(&mut self, _config: &CaptureConfig, _on_samples: SampleHandler) -> AudioResult<()> {
        Err(AudioError::DeviceUnavailable(
            "audio capture is not available in this build (missing 'capture-cpal' feature)"
                .to_string(),
        ))
    }

    fn close(&mut self) {}
}

/// Sink that discards audio.
#[derive(Debug, Default)]
pub struct NullAudioSink;

impl NullAudioSink {
    pub fn new() -> AudioResult<Self> {
        Ok(Self)
    }
}

impl AudioSink for NullAudioSink {
    fn play(&self, _samples: &[f32]) -> AudioResult<()> {
        Ok(())
    }
}

//! Microphone capture encoder.
//!
//! An [`AudioCaptureEncoder`] owns a [`CaptureBackend`] and turns the
//! arbitrarily sized buffers a device delivers into frames of exactly
//! [`FRAME_SIZE`] samples. The frame callback runs on the backend's audio
//! thread, so it must only hand the frame off (e.g. into a channel).
//!
//! The encoder is single-use: once stopped it cannot be started again.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{AudioError, AudioResult, CHANNELS, FRAME_SIZE, SAMPLE_RATE};

/// Callback invoked once per complete frame.
pub type FrameCallback = Arc<dyn Fn(&[f32]) + Send + Sync>;

/// Raw sample sink a backend pushes device buffers into.
pub type SampleHandler = Box<dyn FnMut(&[f32]) + Send>;

/// Device settings requested when capture starts.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Request platform echo cancellation where available
    pub echo_cancellation: bool,
    /// Request platform noise suppression where available
    pub noise_suppression: bool,
    /// Request automatic gain control where available
    pub auto_gain_control: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// A source of microphone samples.
///
/// `open` must either start delivering mono samples at the configured rate
/// into `on_samples`, or fail with [`AudioError::DeviceUnavailable`].
/// `close` releases the device and must be safe to call more than once.
pub trait CaptureBackend: Send {
    fn open(&mut self, config: &CaptureConfig, on_samples: SampleHandler) -> AudioResult<()>;
    fn close(&mut self);
}

/// Re-chunks a stream of samples into fixed-size frames.
#[derive(Debug)]
pub struct FrameAssembler {
    frame_size: usize,
    buffer: Vec<f32>,
}

impl FrameAssembler {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size,
            buffer: Vec::with_capacity(frame_size),
        }
    }

    /// Append samples, calling `emit` for every frame that becomes complete.
    pub fn push(&mut self, mut samples: &[f32], mut emit: impl FnMut(&[f32])) {
        while !samples.is_empty() {
            let needed = self.frame_size - self.buffer.len();
            let take = needed.min(samples.len());
            self.buffer.extend_from_slice(&samples[..take]);
            samples = &samples[take..];

            if self.buffer.len() == self.frame_size {
                emit(&self.buffer);
                self.buffer.clear();
            }
        }
    }

    /// Samples waiting for the next frame boundary.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

enum CaptureState {
    Idle(Box<dyn CaptureBackend>),
    Running(Box<dyn CaptureBackend>),
    Stopped,
}

/// Captures microphone audio as fixed-size linear frames.
pub struct AudioCaptureEncoder {
    config: CaptureConfig,
    state: Mutex<CaptureState>,
}

impl AudioCaptureEncoder {
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        Self::with_config(backend, CaptureConfig::default())
    }

    pub fn with_config(backend: Box<dyn CaptureBackend>, config: CaptureConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CaptureState::Idle(backend)),
        }
    }

    /// Acquire the input device and begin emitting frames to `on_frame`.
    ///
    /// # Errors
    /// - `DeviceUnavailable` if the backend cannot open a device; the
    ///   encoder is released and cannot be started again
    /// - `AlreadyStarted` if capture is running
    /// - `NotRestartable` after `stop()`
    pub fn start(&self, on_frame: FrameCallback) -> AudioResult<()> {
        let mut state = self.state.lock();
        let mut backend = match std::mem::replace(&mut *state, CaptureState::Stopped) {
            CaptureState::Idle(backend) => backend,
            running @ CaptureState::Running(_) => {
                *state = running;
                return Err(AudioError::AlreadyStarted);
            }
            CaptureState::Stopped => return Err(AudioError::NotRestartable),
        };

        let mut assembler = FrameAssembler::new(FRAME_SIZE);
        let handler: SampleHandler = Box::new(move |samples: &[f32]| {
            assembler.push(samples, |frame| on_frame(frame));
        });

        match backend.open(&self.config, handler) {
            Ok(()) => {
                info!(
                    sample_rate = self.config.sample_rate,
                    frame_size = FRAME_SIZE,
                    "Audio capture started"
                );
                *state = CaptureState::Running(backend);
                Ok(())
            }
            Err(e) => {
                warn!("Audio capture failed to start: {}", e);
                backend.close();
                Err(e)
            }
        }
    }

    /// Release the device. Idempotent and safe before `start()`.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, CaptureState::Stopped) {
            CaptureState::Running(mut backend) => {
                backend.close();
                info!("Audio capture stopped");
            }
            CaptureState::Idle(mut backend) => {
                backend.close();
                debug!("Audio capture stopped before it was started");
            }
            CaptureState::Stopped => {}
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), CaptureState::Running(_))
    }
}

impl Drop for AudioCaptureEncoder {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Streaming sample-rate conversion between device rates and the 24kHz
//! session rate.
//!
//! Device callbacks deliver buffers of arbitrary length, while the sinc
//! resampler consumes fixed-size chunks. [`StreamResampler`] carries the
//! remainder between calls, so a continuous stream is converted without
//! padding or clicks at buffer boundaries.

use rubato::{
    InterpolationParameters, InterpolationType, Resampler, SincFixedIn, WindowFunction,
};

use super::{AudioError, AudioResult};

/// Input frames consumed per resampler pass.
const CHUNK_SIZE: usize = 256;

/// Mono sample-rate converter for a continuous stream.
pub struct StreamResampler {
    from_rate: u32,
    to_rate: u32,
    inner: Option<SincFixedIn<f32>>,
    pending: Vec<f32>,
}

impl StreamResampler {
    /// Converter from `from_rate` to `to_rate`; a pass-through when equal.
    pub fn new(from_rate: u32, to_rate: u32) -> AudioResult<Self> {
        if from_rate == 0 || to_rate == 0 {
            return Err(AudioError::Resample(format!(
                "invalid sample rates {from_rate}Hz -> {to_rate}Hz"
            )));
        }

        let inner = if from_rate == to_rate {
            None
        } else {
            let params = InterpolationParameters {
                sinc_len: 64,
                f_cutoff: 0.90,
                interpolation: InterpolationType::Cubic,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            };
            let ratio = to_rate as f64 / from_rate as f64;
            let resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, 1)
                .map_err(|e| AudioError::Resample(e.to_string()))?;
            Some(resampler)
        };

        Ok(Self {
            from_rate,
            to_rate,
            inner,
            pending: Vec::with_capacity(CHUNK_SIZE * 2),
        })
    }

    pub fn from_rate(&self) -> u32 {
        self.from_rate
    }

    pub fn to_rate(&self) -> u32 {
        self.to_rate
    }

    pub fn is_passthrough(&self) -> bool {
        self.inner.is_none()
    }

    /// Input samples held back until a full chunk is available.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Convert `input`, appending every sample that can be produced so far
    /// to `output`.
    pub fn process(&mut self, input: &[f32], output: &mut Vec<f32>) -> AudioResult<()> {
        let Some(resampler) = self.inner.as_mut() else {
            output.extend_from_slice(input);
            return Ok(());
        };

        self.pending.extend_from_slice(input);
        let mut consumed = 0;
        while self.pending.len() - consumed >= CHUNK_SIZE {
            let chunk = &self.pending[consumed..consumed + CHUNK_SIZE];
            let produced = resampler
                .process(std::slice::from_ref(&chunk), None)
                .map_err(|e| AudioError::Resample(e.to_string()))?;
            if let Some(channel) = produced.first() {
                output.extend_from_slice(channel);
            }
            consumed += CHUNK_SIZE;
        }
        self.pending.drain(..consumed);
        Ok(())
    }
}

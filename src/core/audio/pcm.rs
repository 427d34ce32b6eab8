//! Linear `f32` <-> PCM16 conversion.
//!
//! Negative samples scale by 32768 and non-negative ones by 32767 so that the
//! full `i16` range is reachable from [-1.0, 1.0]. Decoding applies the exact
//! inverse scale, which keeps the round-trip error within half a quantization
//! step.

use base64::prelude::*;
use bytes::Bytes;

use super::{AudioError, AudioResult};

const NEGATIVE_SCALE: f32 = 32768.0;
const POSITIVE_SCALE: f32 = 32767.0;

/// Convert one linear sample to PCM16.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * NEGATIVE_SCALE).round() as i16
    } else {
        (s * POSITIVE_SCALE).round() as i16
    }
}

/// Convert one PCM16 sample back to linear.
#[inline]
pub fn i16_to_sample(value: i16) -> f32 {
    if value < 0 {
        value as f32 / NEGATIVE_SCALE
    } else {
        value as f32 / POSITIVE_SCALE
    }
}

/// Encode linear samples as little-endian PCM16 bytes.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        out.extend_from_slice(&sample_to_i16(sample).to_le_bytes());
    }
    out
}

/// Decode little-endian PCM16 bytes into linear samples.
///
/// A trailing odd byte cannot form a sample and is ignored.
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16_to_sample(i16::from_le_bytes([pair[0], pair[1]])))
        .collect()
}

/// Encode a linear frame into the base64 payload of `input_audio_buffer.append`.
pub fn encode_frame_base64(samples: &[f32]) -> String {
    BASE64_STANDARD.encode(encode_pcm16(samples))
}

/// Decode a base64 audio payload (e.g. `response.audio.delta`) into raw PCM16 bytes.
pub fn decode_base64_audio(payload: &str) -> AudioResult<Bytes> {
    BASE64_STANDARD
        .decode(payload)
        .map(Bytes::from)
        .map_err(|e| AudioError::Decode(format!("invalid base64 audio payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_ERROR: f32 = 1.0 / 32768.0;

    #[test]
    fn test_extremes_map_to_full_range() {
        assert_eq!(sample_to_i16(-1.0), i16::MIN);
        assert_eq!(sample_to_i16(1.0), i16::MAX);
        assert_eq!(sample_to_i16(0.0), 0);
        assert_eq!(i16_to_sample(i16::MIN), -1.0);
        assert_eq!(i16_to_sample(i16::MAX), 1.0);
    }

    #[test]
    fn test_out_of_range_samples_are_clamped() {
        assert_eq!(sample_to_i16(-3.5), i16::MIN);
        assert_eq!(sample_to_i16(7.0), i16::MAX);
    }

    #[test]
    fn test_round_trip_within_quantization_error() {
        let samples: Vec<f32> = (0..4096)
            .map(|i| ((i as f32) * 0.013).sin() * 0.97)
            .chain([-1.0, 1.0, 0.0, -0.000_01, 0.000_01, 0.5, -0.5])
            .collect();

        let decoded = decode_pcm16(&encode_pcm16(&samples));

        assert_eq!(decoded.len(), samples.len());
        for (original, restored) in samples.iter().zip(decoded.iter()) {
            assert!(
                (original - restored).abs() <= MAX_ERROR,
                "sample {original} restored as {restored}"
            );
        }
    }

    #[test]
    fn test_encoding_is_little_endian() {
        let bytes = encode_pcm16(&[i16_to_sample(0x0102)]);
        assert_eq!(bytes, vec![0x02, 0x01]);
    }

    #[test]
    fn test_odd_trailing_byte_is_dropped() {
        let decoded = decode_pcm16(&[0x00, 0x40, 0x7f]);
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn test_base64_payload() {
        let payload = encode_frame_base64(&[0.0, 0.25]);
        let raw = decode_base64_audio(&payload).unwrap();
        assert_eq!(raw.len(), 4);
        assert!(decode_base64_audio("not base64!!").is_err());
    }
}

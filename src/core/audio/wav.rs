//! WAV container synthesis for inbound PCM16 fragments.
//!
//! Each fragment gets its own 44-byte RIFF header so it can be decoded in
//! isolation. This costs one header per fragment; fragments are small, so the
//! overhead stays negligible next to the decode itself.

use std::io::Cursor;

use super::{AudioError, AudioResult, BITS_PER_SAMPLE, CHANNELS, SAMPLE_RATE};

/// Size of the canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

/// Build a PCM WAV header for `data_len` bytes of 24kHz mono PCM16.
pub fn wav_header(data_len: u32) -> [u8; WAV_HEADER_LEN] {
    let block_align = CHANNELS * (BITS_PER_SAMPLE / 8);
    let byte_rate = SAMPLE_RATE * u32::from(block_align);

    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    header[24..28].copy_from_slice(&SAMPLE_RATE.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    header
}

/// Wrap a raw PCM16 fragment in a WAV container.
///
/// Fragments are not frame aligned; an odd trailing byte is dropped.
pub fn wrap_fragment(pcm: &[u8]) -> Vec<u8> {
    let usable = pcm.len() & !1;
    let data = &pcm[..usable];

    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + data.len());
    wav.extend_from_slice(&wav_header(data.len() as u32));
    wav.extend_from_slice(data);
    wav
}

/// Wrap and decode a fragment into linear samples ready for playback.
pub fn decode_fragment(pcm: &[u8]) -> AudioResult<Vec<f32>> {
    let wav = wrap_fragment(pcm);
    let reader = hound::WavReader::new(Cursor::new(wav))
        .map_err(|e| AudioError::Decode(e.to_string()))?;

    let spec = reader.spec();
    if spec.sample_rate != SAMPLE_RATE || spec.channels != CHANNELS {
        return Err(AudioError::Decode(format!(
            "unexpected container format {}Hz/{}ch",
            spec.sample_rate, spec.channels
        )));
    }

    let samples = reader
        .into_samples::<i16>()
        .map(|s| s.map(super::pcm::i16_to_sample))
        .collect::<Result<Vec<f32>, _>>()
        .map_err(|e| AudioError::Decode(e.to_string()))?;

    if samples.is_empty() {
        return Err(AudioError::Decode("fragment contains no samples".to_string()));
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::pcm::encode_pcm16;

    #[test]
    fn test_header_layout() {
        let header = wav_header(480);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(header[4..8].try_into().unwrap()), 516);
        assert_eq!(&header[8..16], b"WAVEfmt ");
        assert_eq!(u32::from_le_bytes(header[24..28].try_into().unwrap()), 24_000);
        assert_eq!(u32::from_le_bytes(header[28..32].try_into().unwrap()), 48_000);
        assert_eq!(u16::from_le_bytes(header[32..34].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(header[34..36].try_into().unwrap()), 16);
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u32::from_le_bytes(header[40..44].try_into().unwrap()), 480);
    }

    #[test]
    fn test_wrap_drops_odd_byte() {
        let wav = wrap_fragment(&[1, 2, 3]);
        assert_eq!(wav.len(), WAV_HEADER_LEN + 2);
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 2);
    }

    #[test]
    fn test_decode_fragment_matches_samples() {
        let samples = vec![0.0, 0.5, -0.5, 0.25];
        let decoded = decode_fragment(&encode_pcm16(&samples)).unwrap();

        assert_eq!(decoded.len(), samples.len());
        for (a, b) in samples.iter().zip(decoded.iter()) {
            assert!((a - b).abs() <= 1.0 / 32768.0);
        }
    }

    #[test]
    fn test_decode_empty_fragment_fails() {
        assert!(matches!(decode_fragment(&[]), Err(AudioError::Decode(_))));
        assert!(matches!(decode_fragment(&[7]), Err(AudioError::Decode(_))));
    }
}

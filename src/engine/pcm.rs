//! Raw PCM decoding for model output
//!
//! The generation service answers with base64 text wrapping signed 16-bit
//! little-endian PCM, interleaved by channel and carrying no header.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::engine::buffer::AudioBuffer;
use crate::engine::wav::{check_wav_format, quantize_sample};
use crate::error::{Result, SuaraError};

/// Sample rate the hosted speech model produces
pub const DEFAULT_PCM_SAMPLE_RATE: u32 = 24000;

/// Channel count the hosted speech model produces
pub const DEFAULT_PCM_CHANNELS: u16 = 1;

/// Scale mapping i16 onto [-1.0, 1.0). +32767 lands on 0.99997, not 1.0.
const PCM_SCALE: f32 = 32768.0;

/// Layout of a headerless PCM payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_PCM_SAMPLE_RATE,
            channels: DEFAULT_PCM_CHANNELS,
        }
    }
}

impl PcmFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Reject formats the WAV encoder cannot describe
    pub fn validate(&self) -> Result<()> {
        check_wav_format(self.sample_rate, self.channels as usize)
    }
}

/// Decode a base64 PCM payload into a normalized buffer
///
/// ASCII whitespace inside the payload is ignored. An empty payload gives a
/// zero-length buffer.
///
/// # Example
/// ```
/// use suara::engine::{decode_pcm, PcmFormat};
///
/// // two frames: 0 and -32768
/// let buffer = decode_pcm("AAAAgA==", PcmFormat::default()).unwrap();
/// assert_eq!(buffer.channel(0), &[0.0, -1.0]);
/// ```
pub fn decode_pcm(data: &str, format: PcmFormat) -> Result<AudioBuffer> {
    format.validate()?;

    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = BASE64
        .decode(cleaned.as_bytes())
        .map_err(|e| SuaraError::InvalidBase64 {
            reason: e.to_string(),
            source: Some(e),
        })?;

    Ok(decode_pcm_bytes(&bytes, format))
}

/// Decode already-unwrapped PCM bytes
///
/// `length = floor(bytes / 2 / channels)`; a dangling byte or partial frame
/// at the end is ignored.
pub fn decode_pcm_bytes(bytes: &[u8], format: PcmFormat) -> AudioBuffer {
    let channels = format.channels.max(1) as usize;
    let frames = bytes.len() / 2 / channels;

    let interleaved: Vec<f32> = bytes
        .chunks_exact(2)
        .take(frames * channels)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM_SCALE)
        .collect();

    AudioBuffer::from_interleaved(&interleaved, channels, format.sample_rate)
}

/// Encode a buffer as base64 PCM using the WAV encoder's quantizer
///
/// Used for transform payloads in tests and by the offline service.
pub fn encode_pcm(buffer: &AudioBuffer) -> String {
    let bytes: Vec<u8> = buffer
        .to_interleaved()
        .into_iter()
        .flat_map(|s| quantize_sample(s).to_le_bytes())
        .collect();
    BASE64.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm_base64(values: &[i16]) -> String {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        BASE64.encode(bytes)
    }

    #[test]
    fn test_decode_normalizes_by_32768() {
        let data = pcm_base64(&[0, 16384, -16384, 32767, -32768]);
        let buffer = decode_pcm(&data, PcmFormat::default()).unwrap();

        assert_eq!(buffer.sample_rate, 24000);
        assert_eq!(buffer.channels(), 1);
        assert_eq!(
            buffer.channel(0),
            &[0.0, 0.5, -0.5, 32767.0 / 32768.0, -1.0]
        );
    }

    #[test]
    fn test_full_scale_positive_is_not_unity() {
        let buffer = decode_pcm(&pcm_base64(&[i16::MAX]), PcmFormat::default()).unwrap();
        assert!(buffer.channel(0)[0] < 1.0);
        assert!((buffer.channel(0)[0] - 0.99997).abs() < 1e-5);
    }

    #[test]
    fn test_empty_input_gives_empty_buffer() {
        let buffer = decode_pcm("", PcmFormat::default()).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.channels(), 1);
    }

    #[test]
    fn test_malformed_base64_is_decode_error() {
        let result = decode_pcm("not*base64!", PcmFormat::default());
        match result {
            Err(e @ SuaraError::InvalidBase64 { .. }) => {
                assert_eq!(e.kind(), crate::error::ErrorKind::Decode)
            }
            other => panic!("Expected InvalidBase64, got: {:?}", other),
        }
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let data = pcm_base64(&[100, 200, 300]);
        let wrapped = format!("{}\n{}", &data[..4], &data[4..]);
        let buffer = decode_pcm(&wrapped, PcmFormat::default()).unwrap();
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_odd_byte_count_is_floored() {
        let buffer = decode_pcm_bytes(&[0x00, 0x40, 0x7f], PcmFormat::default());
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.channel(0)[0], 0.5);
    }

    #[test]
    fn test_stereo_deinterleave() {
        let data = pcm_base64(&[16384, -16384, 8192, -8192, 0]);
        let buffer = decode_pcm(&data, PcmFormat::new(48000, 2)).unwrap();

        assert_eq!(buffer.sample_rate, 48000);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.channel(0), &[0.5, 0.25]);
        assert_eq!(buffer.channel(1), &[-0.5, -0.25]);
    }

    #[test]
    fn test_zero_channels_rejected() {
        let result = decode_pcm("", PcmFormat::new(24000, 0));
        assert!(matches!(result, Err(SuaraError::InvalidParameter { .. })));
    }

    #[test]
    fn test_out_of_range_format_rejected() {
        let result = decode_pcm("AAA=", PcmFormat::new(3_000_000_000, 1));
        assert!(matches!(result, Err(SuaraError::InvalidParameter { .. })));
        let result = decode_pcm("AAA=", PcmFormat::new(24000, 40000));
        assert!(matches!(result, Err(SuaraError::InvalidParameter { .. })));
    }

    #[test]
    fn test_encode_pcm_inverts_decode() {
        let values = [-1, -100, -20000, -32767, 0, 1, 16385, 20000, 32766];
        let buffer = decode_pcm(&pcm_base64(&values), PcmFormat::default()).unwrap();
        assert_eq!(encode_pcm(&buffer), pcm_base64(&values));
    }
}

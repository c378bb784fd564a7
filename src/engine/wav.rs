//! WAV encoding for downloads and transform payloads
//!
//! Always writes the canonical 44-byte RIFF header (plain PCM `fmt ` chunk,
//! 16 bits per sample) whatever the channel count, so the output size is
//! exactly `44 + frames * channels * 2`.

use crate::engine::buffer::AudioBuffer;
use crate::error::{Result, SuaraError};

/// Size of the RIFF/WAVE header written by [`encode_wav`]
pub const WAV_HEADER_LEN: usize = 44;

/// MIME type of the encoded artifact
pub const WAV_MIME_TYPE: &str = "audio/wav";

/// Highest sample rate accepted for buffers headed for the encoder
pub const MAX_WAV_SAMPLE_RATE: u32 = 768_000;

/// Highest channel count accepted for buffers headed for the encoder
pub const MAX_WAV_CHANNELS: usize = 32;

const BYTES_PER_SAMPLE: u16 = 2;
const FMT_CHUNK_LEN: u32 = 16;
const FORMAT_PCM: u16 = 1;

/// Quantize a float sample to i16
///
/// Clamped to [-1.0, 1.0] first; negative values scale by 32768 and
/// non-negative values by 32767. Non-negative values round up, so every
/// decoded `v / 32768` comes back as `v`. NaN quantizes to silence.
#[inline]
pub fn quantize_sample(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0) as f64;
    if s < 0.0 {
        (s * 32768.0).round() as i16
    } else {
        (s * 32767.0).ceil() as i16
    }
}

/// Check that a sample rate and channel count fit the WAV header
pub fn check_wav_format(sample_rate: u32, channels: usize) -> Result<()> {
    if sample_rate == 0 || sample_rate > MAX_WAV_SAMPLE_RATE {
        return Err(SuaraError::InvalidParameter {
            param: "sample_rate".to_string(),
            value: sample_rate.to_string(),
            expected: format!("1 to {} Hz", MAX_WAV_SAMPLE_RATE),
        });
    }
    if channels == 0 || channels > MAX_WAV_CHANNELS {
        return Err(SuaraError::InvalidParameter {
            param: "channels".to_string(),
            value: channels.to_string(),
            expected: format!("1 to {} channels", MAX_WAV_CHANNELS),
        });
    }
    Ok(())
}

/// Serialize `frame_count` frames of `buffer` as a 16-bit PCM WAV file
///
/// Frames past the end of the buffer are written as silence. Header fields
/// saturate for formats [`check_wav_format`] rejects.
///
/// # Example
/// ```
/// use suara::engine::{encode_wav, AudioBuffer};
///
/// let buffer = AudioBuffer::new(2, 100, 24000);
/// let wav = encode_wav(&buffer, buffer.len());
/// assert_eq!(wav.len(), 44 + 100 * 2 * 2);
/// assert_eq!(&wav[0..4], b"RIFF");
/// ```
pub fn encode_wav(buffer: &AudioBuffer, frame_count: usize) -> Vec<u8> {
    let channels = buffer.channels() as u64;
    let block_align = channels * BYTES_PER_SAMPLE as u64;
    let data_len = (frame_count as u64).saturating_mul(block_align);
    let byte_rate = buffer.sample_rate as u64 * block_align;
    let total_len = data_len.saturating_add(WAV_HEADER_LEN as u64);

    let mut out = Vec::with_capacity(usize::try_from(total_len).unwrap_or(0));

    // RIFF header
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&header_u32(total_len - 8).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt chunk
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&header_u16(channels).to_le_bytes());
    out.extend_from_slice(&buffer.sample_rate.to_le_bytes());
    out.extend_from_slice(&header_u32(byte_rate).to_le_bytes());
    out.extend_from_slice(&header_u16(block_align).to_le_bytes());
    out.extend_from_slice(&(BYTES_PER_SAMPLE * 8).to_le_bytes());

    // data chunk
    out.extend_from_slice(b"data");
    out.extend_from_slice(&header_u32(data_len).to_le_bytes());

    for frame in 0..frame_count {
        for channel in &buffer.samples {
            let sample = channel.get(frame).copied().unwrap_or(0.0);
            out.extend_from_slice(&quantize_sample(sample).to_le_bytes());
        }
    }

    out
}

fn header_u16(value: u64) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

fn header_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Encode the whole buffer
#[inline]
pub fn encode_buffer(buffer: &AudioBuffer) -> Vec<u8> {
    encode_wav(buffer, buffer.len())
}

// ============================================================================
// Tests
// ============================================================================

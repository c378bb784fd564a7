//! Native decoding of uploaded audio files
//!
//! Uploads are handed straight to the WAV decoder with no extra format
//! checks. Anything it cannot read is reported as unsupported or corrupted.
//! Channel count and sample rate come from the file itself.

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::engine::buffer::AudioBuffer;
use crate::engine::wav::check_wav_format;
use crate::error::{Result, SuaraError};

/// Decode an uploaded file's bytes into a buffer
pub fn decode_audio_file(bytes: &[u8]) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| SuaraError::UnsupportedAudio {
        reason: format!("Failed to open audio file: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    check_wav_format(spec.sample_rate, channels).map_err(|e| SuaraError::UnsupportedAudio {
        reason: e.to_string(),
        source: Some(Box::new(e)),
    })?;

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    let buffer = AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate);

    tracing::debug!(
        channels,
        sample_rate = spec.sample_rate,
        frames = buffer.len(),
        "decoded uploaded audio"
    );

    Ok(buffer)
}

/// Read and decode an audio file from disk
pub fn import_audio(path: &Path) -> Result<AudioBuffer> {
    let bytes = fs::read(path)?;
    decode_audio_file(&bytes)
}

/// Read samples from a WAV reader and normalize to f32
fn read_samples_as_f32<R: Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let corrupted = |e: hound::Error| SuaraError::UnsupportedAudio {
        reason: format!("Failed to read {}-bit samples: {}", bits_per_sample, e),
        source: Some(Box::new(e)),
    };

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(corrupted),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(corrupted),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(corrupted),
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(corrupted),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(corrupted),
            _ => Err(SuaraError::UnsupportedAudio {
                reason: format!("{}-bit integer audio", bits_per_sample),
                source: None,
            }),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::wav::encode_buffer;
    use hound::{WavSpec, WavWriter};
    use tempfile::tempdir;

    #[test]
    fn test_decodes_encoder_output() {
        let buffer = AudioBuffer::from_channels(
            vec![vec![0.5, -0.5, 0.0], vec![-1.0, 0.25, 0.75]],
            44100,
        )
        .unwrap();
        let decoded = decode_audio_file(&encode_buffer(&buffer)).unwrap();

        assert_eq!(decoded.channels(), 2);
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.channel(1)[0], -1.0);
        assert!((decoded.channel(0)[0] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_decodes_float_wav() {
        let mut cursor = Cursor::new(Vec::new());
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for s in [0.1_f32, -0.2, 0.3] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }

        let decoded = decode_audio_file(cursor.get_ref()).unwrap();
        assert_eq!(decoded.channel(0), &[0.1, -0.2, 0.3]);
    }

    #[test]
    fn test_corrupted_file_is_unsupported() {
        let result = decode_audio_file(b"definitely not audio");
        match result {
            Err(SuaraError::UnsupportedAudio { .. }) => {}
            other => panic!("Expected UnsupportedAudio, got: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_file_is_unsupported() {
        let buffer = AudioBuffer::new(1, 100, 24000);
        let wav = encode_buffer(&buffer);
        let result = decode_audio_file(&wav[..30]);
        assert!(matches!(result, Err(SuaraError::UnsupportedAudio { .. })));
    }

    #[test]
    fn test_unencodable_sample_rate_is_unsupported() {
        let mut wav = encode_buffer(&AudioBuffer::new(1, 4, 24000));
        wav[24..28].copy_from_slice(&3_000_000_000_u32.to_le_bytes());
        let result = decode_audio_file(&wav);
        assert!(matches!(result, Err(SuaraError::UnsupportedAudio { .. })));
    }

    #[test]
    fn test_import_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        fs::write(&path, encode_buffer(&AudioBuffer::new(1, 2400, 24000))).unwrap();

        let imported = import_audio(&path).unwrap();
        assert_eq!(imported.len(), 2400);
        assert_eq!(imported.duration_secs(), 0.1);
    }

    #[test]
    fn test_import_missing_file() {
        let result = import_audio(Path::new("/nonexistent/path/audio.wav"));
        assert!(matches!(result, Err(SuaraError::Io(_))));
    }
}

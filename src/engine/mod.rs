//! Audio Engine Module
//!
//! The audio pipeline behind the studio:
//! - Audio buffer type
//! - PCM decoding of model output
//! - Trim/fade editing
//! - WAV encoding
//! - Native decoding of uploads
//! - Playback state machine and visualization tap

pub mod analyser;
pub mod buffer;
pub mod edit;
pub mod import;
pub mod pcm;
pub mod transport;
pub mod wav;

pub use analyser::{Analyser, DEFAULT_FFT_SIZE};
pub use buffer::AudioBuffer;
pub use edit::{apply_edits, EditConfig, EditField, FADE_CEILING_SECS, MIN_EDIT_DURATION_SECS};
pub use import::{decode_audio_file, import_audio};
pub use pcm::{decode_pcm, decode_pcm_bytes, encode_pcm, PcmFormat};
pub use transport::{format_time, AudioSink, NullSink, PlaybackEngine, PlaybackState};
pub use wav::{
    check_wav_format, encode_buffer, encode_wav, quantize_sample, MAX_WAV_CHANNELS,
    MAX_WAV_SAMPLE_RATE, WAV_HEADER_LEN, WAV_MIME_TYPE,
};

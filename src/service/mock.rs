//! Offline generation service
//!
//! Produces deterministic tones instead of calling the hosted model, so the
//! whole studio pipeline can run in tests and without credentials.

use std::cell::Cell;
use std::f32::consts::PI;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::debug;

use crate::engine::{decode_audio_file, encode_pcm, AudioBuffer, PcmFormat};
use crate::error::{Result, SuaraError};
use crate::service::model::{
    GeneratedAudio, GenerationService, MelodyRequest, MusicGenre, SpeechRequest, TransformRequest,
};

/// Seconds of tone per script line
const LINE_SECS: f32 = 0.5;
const MELODY_SECS: f32 = 2.0;
const TONE_AMPLITUDE: f32 = 0.5;
const TRANSFORM_GAIN: f32 = 0.5;

/// How the mock answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockBehavior {
    #[default]
    Normal,
    /// Every call returns a response without audio
    Empty,
    /// Every call fails as if the network were down
    Unavailable,
}

#[derive(Debug, Default)]
pub struct MockService {
    behavior: MockBehavior,
    calls: Cell<usize>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: Cell::new(0),
        }
    }

    /// Number of requests received so far
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    fn respond(&self, render: impl FnOnce() -> Result<GeneratedAudio>) -> Result<GeneratedAudio> {
        self.calls.set(self.calls.get() + 1);
        match self.behavior {
            MockBehavior::Normal => render(),
            MockBehavior::Empty => Err(SuaraError::EmptyResponse),
            MockBehavior::Unavailable => Err(SuaraError::ServiceUnavailable {
                reason: "mock service offline".to_string(),
            }),
        }
    }
}

fn genre_frequency(genre: MusicGenre) -> f32 {
    match genre {
        MusicGenre::Pop => 440.0,
        MusicGenre::Jazz => 349.23,
        MusicGenre::Rock => 329.63,
        MusicGenre::Lofi => 261.63,
        MusicGenre::Klasik => 392.0,
    }
}

/// Append a sine tone to `out`
fn push_tone(out: &mut Vec<f32>, frequency: f32, secs: f32, sample_rate: u32) {
    let frames = (secs * sample_rate as f32) as usize;
    out.extend((0..frames).map(|i| {
        let t = i as f32 / sample_rate as f32;
        TONE_AMPLITUDE * (2.0 * PI * frequency * t).sin()
    }));
}

fn mono(samples: Vec<f32>, format: PcmFormat) -> Result<GeneratedAudio> {
    let buffer = AudioBuffer::from_channels(vec![samples], format.sample_rate)?;
    Ok(GeneratedAudio::new(encode_pcm(&buffer), format))
}

impl GenerationService for MockService {
    fn name(&self) -> &str {
        "mock"
    }

    fn generate_speech(&self, request: &SpeechRequest) -> Result<GeneratedAudio> {
        self.respond(|| {
            let format = PcmFormat::default();
            let mut samples = Vec::new();
            for line in &request.lines {
                // Each speaker gets a pitch from its voice slot
                let slot = request
                    .voices
                    .iter()
                    .position(|v| v.speaker == line.speaker)
                    .unwrap_or(0);
                push_tone(
                    &mut samples,
                    220.0 * (slot as f32 + 1.0),
                    LINE_SECS,
                    format.sample_rate,
                );
            }
            debug!(lines = request.lines.len(), "mock speech rendered");
            mono(samples, format)
        })
    }

    fn generate_melody(&self, request: &MelodyRequest) -> Result<GeneratedAudio> {
        self.respond(|| {
            let format = PcmFormat::default();
            let mut samples = Vec::new();
            push_tone(
                &mut samples,
                genre_frequency(request.genre),
                MELODY_SECS,
                format.sample_rate,
            );
            mono(samples, format)
        })
    }

    fn transform_audio(&self, request: &TransformRequest) -> Result<GeneratedAudio> {
        self.respond(|| {
            let wav = BASE64
                .decode(request.audio_base64.as_bytes())
                .map_err(|e| SuaraError::InvalidBase64 {
                    reason: "transform source is not valid base64".to_string(),
                    source: Some(e),
                })?;
            let mut buffer = decode_audio_file(&wav)?;
            for channel in buffer.samples.iter_mut() {
                for sample in channel.iter_mut() {
                    *sample *= TRANSFORM_GAIN;
                }
            }
            let format = PcmFormat::new(buffer.sample_rate, buffer.channels() as u16);
            Ok(GeneratedAudio::new(encode_pcm(&buffer), format))
        })
    }
}

//! Generation service trait and request types
//!
//! The studio only knows the data contract of the hosted model: request
//! parameters go in, base64 audio plus its PCM layout comes out.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::engine::{decode_pcm, encode_buffer, AudioBuffer, PcmFormat};
use crate::error::{Result, SuaraError};
use crate::state::session::{MelodyConfig, ScriptBlock};

// ============================================================================
// Voices
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

/// Prebuilt voices the speech model supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoiceName {
    Kore,
    Puck,
    Charon,
    Fenrir,
    Zephyr,
}

impl VoiceName {
    pub const ALL: [VoiceName; 5] = [
        VoiceName::Puck,
        VoiceName::Charon,
        VoiceName::Kore,
        VoiceName::Fenrir,
        VoiceName::Zephyr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kore => "Kore",
            Self::Puck => "Puck",
            Self::Charon => "Charon",
            Self::Fenrir => "Fenrir",
            Self::Zephyr => "Zephyr",
        }
    }

    pub fn gender(&self) -> Gender {
        match self {
            Self::Kore | Self::Zephyr => Gender::Female,
            Self::Puck | Self::Charon | Self::Fenrir => Gender::Male,
        }
    }

    pub fn style(&self) -> &'static str {
        match self {
            Self::Kore => "Calm, Soothing",
            Self::Puck => "Soft, Deep",
            Self::Charon => "Deep, Authoritative",
            Self::Fenrir => "Energetic, Strong",
            Self::Zephyr => "Bright, Clear",
        }
    }
}

impl fmt::Display for VoiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceName {
    type Err = SuaraError;

    fn from_str(s: &str) -> Result<Self> {
        VoiceName::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SuaraError::InvalidParameter {
                param: "voice".to_string(),
                value: s.to_string(),
                expected: "one of Kore, Puck, Charon, Fenrir, Zephyr".to_string(),
            })
    }
}

/// Voice used for every melody request
pub const MELODY_VOICE: VoiceName = VoiceName::Zephyr;

// ============================================================================
// Melody parameters
// ============================================================================

macro_rules! name_enum {
    ($(#[$meta:meta])* $name:ident, $param:literal, [$($variant:ident),+]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = SuaraError;

            fn from_str(s: &str) -> Result<Self> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| SuaraError::InvalidParameter {
                        param: $param.to_string(),
                        value: s.to_string(),
                        expected: $name::ALL
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }
    };
}

name_enum!(
    /// Genre of a melody request
    MusicGenre,
    "genre",
    [Pop, Jazz, Rock, Lofi, Klasik]
);

name_enum!(
    /// Mood of a melody request
    MusicMood,
    "mood",
    [Ceria, Sedih, Epik, Santai, Tegang]
);

// ============================================================================
// Requests
// ============================================================================

/// One spoken line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLine {
    pub speaker: String,
    pub text: String,
}

/// Voice assigned to a speaker name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerVoice {
    pub speaker: String,
    pub voice: VoiceName,
}

/// Multi-speaker speech request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub lines: Vec<ScriptLine>,
    /// One entry per distinct speaker, in order of first appearance
    pub voices: Vec<SpeakerVoice>,
}

impl SpeechRequest {
    /// Build a request from script blocks
    ///
    /// Blocks with blank text are skipped. A speaker keeps the voice of the
    /// first block it appears in.
    pub fn from_blocks(blocks: &[ScriptBlock]) -> Result<Self> {
        let mut lines = Vec::new();
        let mut voices: Vec<SpeakerVoice> = Vec::new();

        for block in blocks.iter().filter(|b| !b.text.trim().is_empty()) {
            lines.push(ScriptLine {
                speaker: block.speaker.clone(),
                text: block.text.clone(),
            });
            if !voices.iter().any(|v| v.speaker == block.speaker) {
                voices.push(SpeakerVoice {
                    speaker: block.speaker.clone(),
                    voice: block.voice,
                });
            }
        }

        if lines.is_empty() {
            return Err(SuaraError::EmptyScript);
        }

        Ok(Self { lines, voices })
    }

    /// `Speaker: text` lines joined by newlines
    pub fn prompt(&self) -> String {
        self.lines
            .iter()
            .map(|l| format!("{}: {}", l.speaker, l.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Sung/hummed melody request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MelodyRequest {
    pub genre: MusicGenre,
    pub mood: MusicMood,
    pub text: String,
}

impl MelodyRequest {
    pub fn from_config(config: &MelodyConfig) -> Result<Self> {
        if config.text.trim().is_empty() {
            return Err(SuaraError::EmptyLyrics);
        }
        Ok(Self {
            genre: config.genre,
            mood: config.mood,
            text: config.text.clone(),
        })
    }

    pub fn prompt(&self) -> String {
        format!(
            "(Singing in a {} {} style) {}",
            self.mood, self.genre, self.text
        )
    }

    pub fn voice(&self) -> VoiceName {
        MELODY_VOICE
    }
}

/// Audio-to-audio restyling request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    /// Base64 WAV of the source audio
    pub audio_base64: String,
    pub instruction: String,
}

impl TransformRequest {
    /// WAV-encode `buffer` and attach the instruction
    pub fn from_buffer(buffer: &AudioBuffer, instruction: &str) -> Result<Self> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(SuaraError::EmptyInstruction);
        }
        Ok(Self {
            audio_base64: BASE64.encode(encode_buffer(buffer)),
            instruction: instruction.to_string(),
        })
    }

    /// Instruction wrapped with the preservation constraints
    pub fn prompt(&self) -> String {
        format!(
            "Task: Audio-to-Audio Transformation.\n\
             Input: An audio file containing music or vocals.\n\
             Instruction: {}.\n\
             \n\
             CRITICAL CONSTRAINTS:\n\
             1. PRESERVE the original melody, harmony, tempo, rhythm, and song structure EXACTLY.\n\
             2. DO NOT compose a new song. The output must align with the original audio.\n\
             3. ONLY change the vocal timbre or instrumentation style as requested.\n\
             4. When changing the voice, keep the original lyrics and pitch melody.\n\
             5. High fidelity output required.",
            self.instruction
        )
    }
}

// ============================================================================
// Response
// ============================================================================

/// Audio returned by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAudio {
    /// Base64 headerless PCM
    pub data: String,
    /// Layout of `data`, taken from the response metadata
    pub format: PcmFormat,
}

impl GeneratedAudio {
    pub fn new(data: String, format: PcmFormat) -> Self {
        Self { data, format }
    }

    /// Decode into a playable buffer
    pub fn decode(&self) -> Result<AudioBuffer> {
        decode_pcm(&self.data, self.format)
    }
}

/// The hosted generative audio model
pub trait GenerationService {
    /// Short identifier for logs
    fn name(&self) -> &str;

    /// Multi-speaker conversational speech
    fn generate_speech(&self, request: &SpeechRequest) -> Result<GeneratedAudio>;

    /// Melodic hum or singing
    fn generate_melody(&self, request: &MelodyRequest) -> Result<GeneratedAudio>;

    /// Restyle existing audio
    fn transform_audio(&self, request: &TransformRequest) -> Result<GeneratedAudio>;
}

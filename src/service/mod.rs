//! Generation service boundary
//!
//! - Request types and the `GenerationService` trait
//! - Environment configuration
//! - REST client for the hosted model
//! - Deterministic offline mock

pub mod config;
pub mod gemini;
pub mod mock;
pub mod model;

pub use config::{ServiceConfig, API_KEY_ENV};
pub use gemini::{parse_pcm_mime, GeminiService};
pub use mock::{MockBehavior, MockService};
pub use model::{
    Gender, GeneratedAudio, GenerationService, MelodyRequest, MusicGenre, MusicMood, ScriptLine,
    SpeakerVoice, SpeechRequest, TransformRequest, VoiceName, MELODY_VOICE,
};

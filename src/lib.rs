//! SuaraAI Studio - Speech and Melody Generation Core
//!
//! Turns scripts and melody prompts into audio through a hosted generative
//! model, then lets the result be trimmed, faded, played and exported.
//!
//! # Architecture
//!
//! - `engine`: pure audio pipeline (PCM decode, trim/fade edit, WAV encode,
//!   upload decode) plus the playback state machine
//! - `service`: the generation service boundary and its clients
//! - `state`: persisted session, history and the studio orchestrator

pub mod cli;
pub mod engine;
pub mod error;
pub mod service;
pub mod state;

pub use engine::{apply_edits, decode_pcm, encode_wav, AudioBuffer, EditConfig, PcmFormat};
pub use error::{ErrorKind, Result, SuaraError};
pub use service::{GenerationService, MockService};
pub use state::Studio;

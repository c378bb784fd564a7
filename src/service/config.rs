//! Generation service configuration
//!
//! Read from the environment. A missing API key only fails when a request
//! is actually made.

use std::env;

use crate::error::{Result, SuaraError};

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "API_KEY";

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_TRANSFORM_MODEL: &str = "gemini-2.5-flash-preview";
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    /// Model used for speech and melody
    pub tts_model: String,
    /// Multimodal model used for audio-to-audio transforms
    pub transform_model: String,
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            transform_model: DEFAULT_TRANSFORM_MODEL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ServiceConfig {
    /// Load from `API_KEY`, `SUARA_API_URL`, `SUARA_TTS_MODEL`,
    /// `SUARA_TRANSFORM_MODEL` and `SUARA_TIMEOUT_MS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()),
            api_url: env::var("SUARA_API_URL").unwrap_or(defaults.api_url),
            tts_model: env::var("SUARA_TTS_MODEL").unwrap_or(defaults.tts_model),
            transform_model: env::var("SUARA_TRANSFORM_MODEL").unwrap_or(defaults.transform_model),
            timeout_ms: env::var("SUARA_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_ms),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// The API key, or `MissingCredentials`
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| SuaraError::MissingCredentials {
                env_var: API_KEY_ENV.to_string(),
            })
    }

    /// Endpoint for `model`'s generateContent call
    pub fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_url.trim_end_matches('/'),
            model
        )
    }
}

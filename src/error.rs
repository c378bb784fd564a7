//! Error handling for Suara
//!
//! Errors are grouped into decode, service, validation and storage kinds.
//! None of them is fatal: the studio keeps its last good buffer and history
//! whenever an operation fails.

use thiserror::Error;

/// Result type alias for Suara operations
pub type Result<T> = std::result::Result<T, SuaraError>;

/// Coarse classification of an error, used by the UI layer to pick a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Service,
    Validation,
    Storage,
}

/// Main error type for Suara operations
#[derive(Error, Debug)]
pub enum SuaraError {
    // Decode Errors
    #[error("Invalid base64 audio payload: {reason}")]
    InvalidBase64 {
        reason: String,
        #[source]
        source: Option<base64::DecodeError>,
    },

    #[error("Invalid PCM data: {reason}")]
    InvalidPcm { reason: String },

    #[error("Unsupported audio: {reason}")]
    UnsupportedAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Service Errors
    #[error("API key is not set (expected in {env_var})")]
    MissingCredentials { env_var: String },

    #[error("No audio data received from the generation service")]
    EmptyResponse,

    #[error("Generation service unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    #[error("Generation service support not compiled. Build with --features gemini")]
    ServiceDisabled,

    // Validation Errors
    #[error("Script is empty")]
    EmptyScript,

    #[error("Lyrics are empty")]
    EmptyLyrics,

    #[error("Transform instruction is empty")]
    EmptyInstruction,

    #[error("No audio loaded")]
    NoAudioLoaded,

    #[error("Invalid parameter '{param}': got {value}, expected {expected}")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // Storage Errors
    #[error("Artifact not found: {id}")]
    ArtifactNotFound { id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SuaraError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            SuaraError::InvalidBase64 { .. } => "INVALID_BASE64",
            SuaraError::InvalidPcm { .. } => "INVALID_PCM",
            SuaraError::UnsupportedAudio { .. } => "UNSUPPORTED_AUDIO",
            SuaraError::MissingCredentials { .. } => "MISSING_CREDENTIALS",
            SuaraError::EmptyResponse => "EMPTY_RESPONSE",
            SuaraError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            SuaraError::ServiceDisabled => "SERVICE_DISABLED",
            SuaraError::EmptyScript => "EMPTY_SCRIPT",
            SuaraError::EmptyLyrics => "EMPTY_LYRICS",
            SuaraError::EmptyInstruction => "EMPTY_INSTRUCTION",
            SuaraError::NoAudioLoaded => "NO_AUDIO_LOADED",
            SuaraError::InvalidParameter { .. } => "INVALID_PARAMETER",
            SuaraError::ArtifactNotFound { .. } => "ARTIFACT_NOT_FOUND",
            SuaraError::Io(_) => "IO_ERROR",
            SuaraError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Get the taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SuaraError::InvalidBase64 { .. }
            | SuaraError::InvalidPcm { .. }
            | SuaraError::UnsupportedAudio { .. } => ErrorKind::Decode,
            SuaraError::MissingCredentials { .. }
            | SuaraError::EmptyResponse
            | SuaraError::ServiceUnavailable { .. }
            | SuaraError::ServiceDisabled => ErrorKind::Service,
            SuaraError::EmptyScript
            | SuaraError::EmptyLyrics
            | SuaraError::EmptyInstruction
            | SuaraError::NoAudioLoaded
            | SuaraError::InvalidParameter { .. } => ErrorKind::Validation,
            SuaraError::ArtifactNotFound { .. }
            | SuaraError::Io(_)
            | SuaraError::Serialization(_) => ErrorKind::Storage,
        }
    }

    /// Returns true if the user can reasonably retry the same operation.
    ///
    /// Nothing is retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SuaraError::EmptyResponse | SuaraError::ServiceUnavailable { .. }
        )
    }

    /// Get a user-facing message for this error
    pub fn friendly_message(&self) -> String {
        match self {
            SuaraError::UnsupportedAudio { .. } => {
                "Could not process the audio file. The format may be unsupported or the file is corrupted."
                    .to_string()
            }
            SuaraError::InvalidBase64 { .. } | SuaraError::InvalidPcm { .. } => {
                "The generated audio could not be decoded. Please try again.".to_string()
            }
            SuaraError::MissingCredentials { .. } => {
                "Audio generation failed. Make sure the API key is valid.".to_string()
            }
            SuaraError::EmptyResponse | SuaraError::ServiceUnavailable { .. } => {
                "Audio generation failed. Please try again.".to_string()
            }
            SuaraError::EmptyScript => "Please fill in the script text first.".to_string(),
            SuaraError::EmptyLyrics => "Please fill in the lyrics or hum first.".to_string(),
            SuaraError::EmptyInstruction => {
                "Please describe how the audio should be changed.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

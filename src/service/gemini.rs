//! HTTP client for the hosted generation model
//!
//! Request bodies and response parsing are plain serde and always compiled;
//! the network call itself needs the `gemini` feature.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::{PcmFormat, MAX_WAV_CHANNELS, MAX_WAV_SAMPLE_RATE, WAV_MIME_TYPE};
use crate::error::{Result, SuaraError};
use crate::service::config::ServiceConfig;
use crate::service::model::{
    GeneratedAudio, GenerationService, MelodyRequest, SpeechRequest, TransformRequest, VoiceName,
};

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_config: Option<VoiceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    multi_speaker_voice_config: Option<MultiSpeakerVoiceConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MultiSpeakerVoiceConfig {
    speaker_voice_configs: Vec<SpeakerVoiceConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeakerVoiceConfig {
    speaker: String,
    voice_config: VoiceConfig,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl VoiceConfig {
    fn prebuilt(voice: VoiceName) -> Self {
        Self {
            prebuilt_voice_config: PrebuiltVoiceConfig {
                voice_name: voice.as_str(),
            },
        }
    }
}

fn text_part(text: String) -> Part {
    Part {
        text: Some(text),
        inline_data: None,
    }
}

// ============================================================================
// Request bodies
// ============================================================================

/// Body for a speech request
///
/// A single distinct speaker is sent as a plain voice config since the
/// multi-speaker form needs at least two.
pub(crate) fn speech_body(request: &SpeechRequest) -> GenerateContentRequest {
    let speech_config = match request.voices.as_slice() {
        [only] => SpeechConfig {
            voice_config: Some(VoiceConfig::prebuilt(only.voice)),
            multi_speaker_voice_config: None,
        },
        voices => SpeechConfig {
            voice_config: None,
            multi_speaker_voice_config: Some(MultiSpeakerVoiceConfig {
                speaker_voice_configs: voices
                    .iter()
                    .map(|v| SpeakerVoiceConfig {
                        speaker: v.speaker.clone(),
                        voice_config: VoiceConfig::prebuilt(v.voice),
                    })
                    .collect(),
            }),
        },
    };

    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![text_part(request.prompt())],
        }],
        generation_config: GenerationConfig {
            response_modalities: vec!["AUDIO"],
            speech_config: Some(speech_config),
        },
    }
}

pub(crate) fn melody_body(request: &MelodyRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![text_part(request.prompt())],
        }],
        generation_config: GenerationConfig {
            response_modalities: vec!["AUDIO"],
            speech_config: Some(SpeechConfig {
                voice_config: Some(VoiceConfig::prebuilt(request.voice())),
                multi_speaker_voice_config: None,
            }),
        },
    }
}

/// Body for a transform request; no speech config so the model is not
/// forced onto a TTS voice
pub(crate) fn transform_body(request: &TransformRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: WAV_MIME_TYPE.to_string(),
                        data: request.audio_base64.clone(),
                    }),
                },
                text_part(request.prompt()),
            ],
        }],
        generation_config: GenerationConfig {
            response_modalities: vec!["AUDIO"],
            speech_config: None,
        },
    }
}

// ============================================================================
// Response parsing
// ============================================================================

/// Pull the first inline audio part out of a response
pub(crate) fn extract_audio(response: GenerateContentResponse) -> Result<GeneratedAudio> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().find_map(|p| p.inline_data))
        .filter(|inline| !inline.data.is_empty())
        .map(|inline| GeneratedAudio::new(inline.data, parse_pcm_mime(&inline.mime_type)))
        .ok_or(SuaraError::EmptyResponse)
}

/// Read `rate=` and `channels=` parameters from a PCM MIME type such as
/// `audio/L16;codec=pcm;rate=24000`, falling back to 24 kHz mono
///
/// Values outside what a WAV header can carry are ignored.
pub fn parse_pcm_mime(mime: &str) -> PcmFormat {
    let mut format = PcmFormat::default();
    for param in mime.split(';').skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "rate" => {
                let rate = value.trim().parse::<u32>().ok();
                if let Some(rate) = rate.filter(|&r| r > 0 && r <= MAX_WAV_SAMPLE_RATE) {
                    format.sample_rate = rate;
                }
            }
            "channels" => {
                let channels = value.trim().parse::<u16>().ok();
                if let Some(channels) =
                    channels.filter(|&c| c > 0 && c as usize <= MAX_WAV_CHANNELS)
                {
                    format.channels = channels;
                }
            }
            _ => {}
        }
    }
    format
}

// ============================================================================
// Client
// ============================================================================

/// Generation service backed by the hosted model's REST API
pub struct GeminiService {
    config: ServiceConfig,
}

impl GeminiService {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    /// Create from environment configuration
    pub fn from_env() -> Self {
        Self::new(ServiceConfig::from_env())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn call(&self, model: &str, body: &GenerateContentRequest) -> Result<GeneratedAudio> {
        let api_key = self.config.require_api_key()?;
        let url = self.config.endpoint(model);
        debug!(%url, "sending generation request");

        let response = self.send(&url, api_key, body)?;
        let audio = extract_audio(response)?;
        info!(
            model,
            sample_rate = audio.format.sample_rate,
            channels = audio.format.channels,
            "generation complete"
        );
        Ok(audio)
    }

    #[cfg(feature = "gemini")]
    fn send(
        &self,
        url: &str,
        api_key: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(self.config.timeout_ms))
            .build()
            .map_err(|e| SuaraError::ServiceUnavailable {
                reason: e.to_string(),
            })?;

        let response = client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    SuaraError::ServiceUnavailable {
                        reason: format!("request timed out after {}ms", self.config.timeout_ms),
                    }
                } else {
                    SuaraError::ServiceUnavailable {
                        reason: e.to_string(),
                    }
                }
            })?;

        if !response.status().is_success() {
            return Err(SuaraError::ServiceUnavailable {
                reason: format!("service returned {}", response.status()),
            });
        }

        response
            .json::<GenerateContentResponse>()
            .map_err(|e| SuaraError::ServiceUnavailable {
                reason: format!("invalid response: {}", e),
            })
    }

    #[cfg(not(feature = "gemini"))]
    fn send(
        &self,
        _url: &str,
        _api_key: &str,
        _body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        Err(SuaraError::ServiceDisabled)
    }
}

impl GenerationService for GeminiService {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_speech(&self, request: &SpeechRequest) -> Result<GeneratedAudio> {
        self.call(&self.config.tts_model, &speech_body(request))
    }

    fn generate_melody(&self, request: &MelodyRequest) -> Result<GeneratedAudio> {
        self.call(&self.config.tts_model, &melody_body(request))
    }

    fn transform_audio(&self, request: &TransformRequest) -> Result<GeneratedAudio> {
        self.call(&self.config.transform_model, &transform_body(request))
    }
}

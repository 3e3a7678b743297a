use crate::config::ElevenLabsConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Maximum text input size for TTS (64 KiB). Prevents resource exhaustion from
/// oversized synthesis requests.
pub const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

const SERVICE: &str = "ElevenLabs";

/// Turns reply text into encoded audio.
#[async_trait]
pub trait SpeechAdapter: Send + Sync {
    /// Synthesizes `text` with the given voice and returns the encoded audio.
    ///
    /// An empty result is not an error at this layer; callers decide whether
    /// silence is acceptable.
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, VoiceError>;
}

pub(crate) fn check_input_size(text: &str) -> Result<(), VoiceError> {
    if text.len() > MAX_TTS_INPUT_BYTES {
        return Err(VoiceError::InputTooLarge {
            len: text.len(),
            limit: MAX_TTS_INPUT_BYTES,
        });
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// ElevenLabs text-to-speech client.
#[derive(Clone)]
pub struct ElevenLabsTts {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
    output_format: Option<String>,
}

impl ElevenLabsTts {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Config`] if no API key is configured.
    pub fn new(http: reqwest::Client, config: &ElevenLabsConfig) -> Result<Self, VoiceError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                VoiceError::Config(
                    "ElevenLabs API key not found; set ELEVENLABS_API_KEY".to_string(),
                )
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model_id: config.model_id.clone(),
            output_format: config.output_format.clone(),
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

impl fmt::Debug for ElevenLabsTts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevenLabsTts")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model_id", &self.model_id)
            .field("output_format", &self.output_format)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SpeechAdapter for ElevenLabsTts {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, VoiceError> {
        check_input_size(text)?;

        let url = format!("{}/v1/text-to-speech/{}", self.base_url, voice_id);
        let mut request = self
            .http
            .post(url)
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: &self.model_id,
            });
        if let Some(format) = &self.output_format {
            request = request.query(&[("output_format", format)]);
        }

        debug!(voice_id, model_id = %self.model_id, chars = text.len(), "requesting speech");

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(VoiceError::from_response(SERVICE, response).await);
        }

        Ok(response.bytes().await?.to_vec())
    }
}

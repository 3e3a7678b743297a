//! Vendor connection settings.
//!
//! Each struct deserializes from its own TOML table. Secrets are never
//! serialized and are redacted from `Debug` output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder used when `OPENAI_API_KEY` is not set. Calls made with it are
/// rejected by the vendor and surface as ordinary adapter failures.
pub const OPENAI_API_KEY_PLACEHOLDER: &str = "clave_por_defecto";

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_GOOGLE_TTS_BASE_URL: &str = "https://texttospeech.googleapis.com";

fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_openai_api_key() -> String {
    OPENAI_API_KEY_PLACEHOLDER.to_string()
}

fn default_openai_model() -> String {
    "gpt-4".to_string()
}

fn default_max_tokens() -> u32 {
    150
}

fn default_temperature() -> f32 {
    0.7
}

fn default_elevenlabs_base_url() -> String {
    DEFAULT_ELEVENLABS_BASE_URL.to_string()
}

fn default_elevenlabs_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_google_base_url() -> String {
    DEFAULT_GOOGLE_TTS_BASE_URL.to_string()
}

fn default_google_credentials_path() -> String {
    "key/clave.json".to_string()
}

fn default_audio_encoding() -> String {
    "MP3".to_string()
}

fn default_convai_llm() -> String {
    "gemini-2.0-flash-001".to_string()
}

fn default_greeting_template() -> String {
    "Hola, mucho gusto soy {name}, tu agente de personalizado ¿En qué te puedo colaborar el día de hoy?"
        .to_string()
}

/// Returns the first characters of a secret followed by a mask, for logging.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(5).collect();
    format!("{}******", visible)
}

/// Chat completion settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_api_key", skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    /// Upper bound on generated tokens per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            api_key: default_openai_api_key(),
            model: default_openai_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// ElevenLabs text-to-speech settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ElevenLabsConfig {
    #[serde(default = "default_elevenlabs_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_elevenlabs_model_id")]
    pub model_id: String,
    /// Optional `output_format` query parameter (e.g. `mp3_44100_128`).
    #[serde(default)]
    pub output_format: Option<String>,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            base_url: default_elevenlabs_base_url(),
            api_key: None,
            model_id: default_elevenlabs_model_id(),
            output_format: None,
        }
    }
}

impl fmt::Debug for ElevenLabsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevenLabsConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model_id", &self.model_id)
            .field("output_format", &self.output_format)
            .finish()
    }
}

/// Google Cloud Text-to-Speech settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct GoogleTtsConfig {
    #[serde(default = "default_google_base_url")]
    pub base_url: String,
    /// Path to a service-account key file.
    #[serde(default = "default_google_credentials_path")]
    pub credentials_path: String,
    /// Pre-issued OAuth access token. Takes precedence over the key file.
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    /// Overrides the language code derived from the voice name.
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default = "default_audio_encoding")]
    pub audio_encoding: String,
}

impl Default for GoogleTtsConfig {
    fn default() -> Self {
        Self {
            base_url: default_google_base_url(),
            credentials_path: default_google_credentials_path(),
            access_token: None,
            language_code: None,
            audio_encoding: default_audio_encoding(),
        }
    }
}

impl fmt::Debug for GoogleTtsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleTtsConfig")
            .field("base_url", &self.base_url)
            .field("credentials_path", &self.credentials_path)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("language_code", &self.language_code)
            .field("audio_encoding", &self.audio_encoding)
            .finish()
    }
}

/// ElevenLabs Conversational AI settings used by the REST pass-throughs.
///
/// Missing identifiers are not a startup error: the endpoints that need
/// them answer 500 instead.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConvaiConfig {
    #[serde(default = "default_elevenlabs_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Agent served by `/api/signed-url` and `/api/getAgentId`.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Agent served by the `-lait` endpoints and reconfigured by
    /// `/api/configurar-agente`.
    #[serde(default)]
    pub lait_agent_id: Option<String>,
    /// Model the hosted agent is switched to on reconfiguration.
    #[serde(default = "default_convai_llm")]
    pub llm: String,
    /// First message of a reconfigured agent; `{name}` is replaced by the
    /// requested agent name.
    #[serde(default = "default_greeting_template")]
    pub greeting_template: String,
}

impl Default for ConvaiConfig {
    fn default() -> Self {
        Self {
            base_url: default_elevenlabs_base_url(),
            api_key: None,
            agent_id: None,
            lait_agent_id: None,
            llm: default_convai_llm(),
            greeting_template: default_greeting_template(),
        }
    }
}

impl fmt::Debug for ConvaiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvaiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("agent_id", &self.agent_id)
            .field("lait_agent_id", &self.lait_agent_id)
            .field("llm", &self.llm)
            .field("greeting_template", &self.greeting_template)
            .finish()
    }
}

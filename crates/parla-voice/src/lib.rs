//! Vendor adapters for the Parla voice relay.
//!
//! The relay treats language generation and speech synthesis as external
//! services behind two traits, [`LanguageAdapter`] and [`SpeechAdapter`].
//! This crate provides the production implementations (OpenAI chat
//! completions, ElevenLabs and Google Cloud text-to-speech) together with
//! the ElevenLabs Conversational AI client used by the REST pass-throughs.
//!
//! All clients share one `reqwest::Client` handed in by the caller and are
//! immutable after construction.

pub mod config;
pub mod convai;
pub mod error;
pub mod google;
pub mod llm;
pub mod tts;

pub use config::{
    mask_secret, ConvaiConfig, ElevenLabsConfig, GoogleTtsConfig, OpenAiConfig,
    OPENAI_API_KEY_PLACEHOLDER,
};
pub use convai::{AgentUpdate, ConvaiClient};
pub use error::VoiceError;
pub use google::GoogleCloudTts;
pub use llm::{LanguageAdapter, OpenAiChatClient};
pub use tts::{ElevenLabsTts, SpeechAdapter, MAX_TTS_INPUT_BYTES};

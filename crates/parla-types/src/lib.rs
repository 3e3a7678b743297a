//! Shared types for the Parla voice relay.
//!
//! This crate holds the values that cross crate boundaries: the agent
//! [`Persona`], the conversation [`Turn`] handed to the language model, and
//! the two envelope shapes written to the caller over the WebSocket.
//!
//! The envelope field names (`texto`, `audio`, `detalle`) are part of the
//! wire contract with the web client and must not change.

pub mod persona;

pub use persona::{Persona, PersonaError, DEFAULT_ERROR_TEXT};

use serde::{Deserialize, Serialize};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The human on the other end of the WebSocket.
    Caller,
    /// The relayed agent.
    Agent,
}

/// A single utterance in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    /// Creates a caller turn.
    pub fn caller(text: impl Into<String>) -> Self {
        Self {
            role: Role::Caller,
            text: text.into(),
        }
    }
}

/// The text + audio unit sent to the caller after every agent turn.
///
/// `audio` carries base64 (standard alphabet) of the synthesized bytes and is
/// never empty: a turn whose synthesis produced no audio is reported with an
/// [`ErrorEnvelope`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "texto")]
    pub text: String,
    pub audio: String,
}

impl ResponseEnvelope {
    pub fn new(text: impl Into<String>, audio_base64: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio: audio_base64.into(),
        }
    }
}

/// Terminal message sent when a turn fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Fixed human-readable message (the persona's `error_text`).
    #[serde(rename = "texto")]
    pub text: String,
    /// Diagnostic detail describing what failed.
    #[serde(rename = "detalle")]
    pub detail: String,
}

impl ErrorEnvelope {
    pub fn new(text: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            detail: detail.into(),
        }
    }
}

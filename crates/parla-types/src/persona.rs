//! Agent persona definitions.
//!
//! A `Persona` bundles everything that distinguishes one deployment of the
//! relay from another: the system prompt sent to the language model, the
//! voice used for synthesis, the fixed greeting and farewell lines, and the
//! keywords that end a conversation. One persona is loaded at startup and
//! shared read-only by every connection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default message shown to the caller when a turn fails.
pub const DEFAULT_ERROR_TEXT: &str = "Ocurrió un error en el servidor.";

const LAIT_SYSTEM_PROMPT: &str = include_str!("prompts/lait.txt");

const LAIT_GREETING: &str = "Hola, soy Natalia, tu agente de ventas digital de LAIT Technology. \
Estoy aquí para ayudarte a descubrir cómo nuestras soluciones avanzadas pueden optimizar tus \
operaciones. ¿Me podrías decir tu nombre, por favor?";

const LAIT_FAREWELL: &str =
    "Gracias por comunicarte con LAIT Technology. ¡Que tengas un excelente día!";

const LAIT_VOICE_ID: &str = "Db2IZsmhaC6whev4HkLm";

const LAIT_FAREWELL_KEYWORDS: [&str; 7] = [
    "adiós",
    "hasta luego",
    "muchas gracias",
    "gracias",
    "eso es todo",
    "terminemos",
    "bye",
];

/// Errors raised when a persona fails validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PersonaError {
    #[error("persona field `{0}` must not be blank")]
    BlankField(&'static str),
}

/// Static configuration for the relayed agent.
///
/// Every field has a default (the LAIT Technology sales agent), so a
/// configuration file only needs to list the fields it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    /// Display name, used in logs.
    pub name: String,
    /// System prompt sent with every language model call.
    pub system_prompt: String,
    /// Voice identifier passed to the speech adapter.
    pub voice_id: String,
    /// Line spoken as soon as a connection is accepted.
    pub greeting_text: String,
    /// Line spoken when the caller says goodbye.
    pub farewell_text: String,
    /// Case-insensitive substrings that end the conversation. Empty disables
    /// farewell detection.
    pub farewell_keywords: Vec<String>,
    /// Fixed `texto` of the error envelope.
    pub error_text: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "Natalia".to_string(),
            system_prompt: LAIT_SYSTEM_PROMPT.to_string(),
            voice_id: LAIT_VOICE_ID.to_string(),
            greeting_text: LAIT_GREETING.to_string(),
            farewell_text: LAIT_FAREWELL.to_string(),
            farewell_keywords: LAIT_FAREWELL_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            error_text: DEFAULT_ERROR_TEXT.to_string(),
        }
    }
}

impl Persona {
    /// Returns true if the utterance contains any farewell keyword.
    ///
    /// Matching is a substring test on the lowercased utterance against the
    /// lowercased keyword. Blank keywords never match.
    pub fn is_farewell(&self, utterance: &str) -> bool {
        let lowered = utterance.to_lowercase();
        self.farewell_keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .any(|k| lowered.contains(&k.to_lowercase()))
    }

    /// Whether this persona ends conversations on farewell keywords at all.
    pub fn detects_farewells(&self) -> bool {
        self.farewell_keywords.iter().any(|k| !k.trim().is_empty())
    }

    /// Checks that every caller-facing field is present.
    ///
    /// # Errors
    ///
    /// Returns [`PersonaError::BlankField`] naming the first blank field.
    pub fn validate(&self) -> Result<(), PersonaError> {
        let fields = [
            ("system_prompt", &self.system_prompt),
            ("voice_id", &self.voice_id),
            ("greeting_text", &self.greeting_text),
            ("farewell_text", &self.farewell_text),
            ("error_text", &self.error_text),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(PersonaError::BlankField(name));
            }
        }
        Ok(())
    }
}

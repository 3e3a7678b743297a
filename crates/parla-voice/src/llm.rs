//! Language model adapter.
//!
//! The relay only needs one operation from a language model: given the
//! persona's system prompt and the latest caller turn(s), produce one reply.
//! [`OpenAiChatClient`] implements it against an OpenAI-compatible
//! `/chat/completions` endpoint.

use crate::config::OpenAiConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use parla_types::{Role, Turn};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SERVICE: &str = "OpenAI";

/// Generates agent replies.
#[async_trait]
pub trait LanguageAdapter: Send + Sync {
    /// Returns one reply to the conversation so far.
    ///
    /// `turns` is ordered oldest first and ends with the caller turn being
    /// answered.
    async fn reply(&self, system_prompt: &str, turns: &[Turn]) -> Result<String, VoiceError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    n: u8,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::Caller => "user",
        Role::Agent => "assistant",
    }
}

/// Chat completion client for OpenAI-compatible APIs.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiChatClient {
    pub fn new(http: reqwest::Client, config: OpenAiConfig) -> Self {
        Self { http, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl LanguageAdapter for OpenAiChatClient {
    async fn reply(&self, system_prompt: &str, turns: &[Turn]) -> Result<String, VoiceError> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: system_prompt,
        });
        messages.extend(turns.iter().map(|turn| ChatMessage {
            role: wire_role(turn.role),
            content: &turn.text,
        }));

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            n: 1,
        };

        debug!(
            model = %self.config.model,
            turns = turns.len(),
            "requesting chat completion"
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VoiceError::from_response(SERVICE, response).await);
        }

        let body: ChatCompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| VoiceError::MalformedResponse {
                service: SERVICE,
                reason: "completion contained no message content".to_string(),
            })
    }
}

//! ElevenLabs Conversational AI REST client.
//!
//! Backs the server's pass-through endpoints: minting signed WebSocket URLs
//! for a hosted agent and patching a hosted agent's prompt and voice. Keys
//! and agent ids are supplied per call because the endpoints report their
//! absence as request errors rather than startup failures.

use crate::error::VoiceError;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SERVICE: &str = "ElevenLabs";

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    signed_url: String,
}

/// Body of `PATCH /v1/convai/agents/{agent_id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub conversation_config: ConversationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationConfig {
    pub agent: AgentSettings,
    pub tts: TtsSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSettings {
    pub first_message: String,
    pub prompt: PromptSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptSettings {
    pub prompt: String,
    pub llm: String,
    pub temperature: f32,
    /// `-1` lets the vendor pick its own limit.
    pub max_tokens: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TtsSettings {
    pub voice_id: String,
}

impl AgentUpdate {
    /// Builds an update that switches the agent to `prompt` and `voice_id`.
    ///
    /// The model runs at temperature 0 with no token limit.
    pub fn new(
        name: Option<String>,
        first_message: String,
        prompt: String,
        llm: String,
        voice_id: String,
    ) -> Self {
        Self {
            name,
            conversation_config: ConversationConfig {
                agent: AgentSettings {
                    first_message,
                    prompt: PromptSettings {
                        prompt,
                        llm,
                        temperature: 0.0,
                        max_tokens: -1,
                    },
                },
                tts: TtsSettings { voice_id },
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConvaiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ConvaiClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Requests a signed conversation URL for `agent_id`.
    pub async fn signed_url(&self, api_key: &str, agent_id: &str) -> Result<String, VoiceError> {
        let url = format!("{}/v1/convai/conversation/get_signed_url", self.base_url);
        debug!(agent_id, "requesting signed conversation url");

        let response = self
            .http
            .get(url)
            .query(&[("agent_id", agent_id)])
            .header("xi-api-key", api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(VoiceError::from_response(SERVICE, response).await);
        }

        let body: SignedUrlResponse = response.json().await?;
        Ok(body.signed_url)
    }

    /// Applies `update` to the hosted agent.
    pub async fn update_agent(
        &self,
        api_key: &str,
        agent_id: &str,
        update: &AgentUpdate,
    ) -> Result<(), VoiceError> {
        let url = format!("{}/v1/convai/agents/{}", self.base_url, agent_id);
        debug!(agent_id, "patching hosted agent configuration");

        let response = self
            .http
            .patch(url)
            .header("xi-api-key", api_key)
            .json(update)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(VoiceError::from_response(SERVICE, response).await);
        }
        Ok(())
    }
}

//! Pass-through endpoints for the hosted conversational agent.
//!
//! The web client uses these to open conversations directly with the vendor
//! (signed URLs), look up agent ids, and reconfigure the secondary agent's
//! prompt and voice. Missing keys or agent ids are reported per request.

use crate::api::ApiError;
use crate::AppState;
use axum::extract::{rejection::JsonRejection, Extension, Json};
use parla_voice::{AgentUpdate, VoiceError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MISSING_ENV: &str = "Missing environment variables";
const SIGNED_URL_FAILED: &str = "Failed to get signed URL";
const AGENT_ID_NOT_FOUND: &str = "Agent ID not found in environment variables";

// The configuration endpoint answers in Spanish; the web client matches on
// these exact strings.
const CONFIGURE_MISSING_ENV: &str = "Faltan variables de entorno";
const MISSING_FIELDS: &str = "Faltan datos: prompt y/o voice_id";
const CONFIGURE_UNEXPECTED: &str = "Error inesperado al configurar el agente";
const CONFIGURED: &str = "Agente configurado correctamente";

/// Placeholder in the greeting template replaced by the agent's name.
const NAME_PLACEHOLDER: &str = "{name}";

/// Response body for the signed URL endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignedUrlResponse {
    #[serde(rename = "signedUrl")]
    pub signed_url: String,
}

/// Response body for the agent id endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct AgentIdResponse {
    #[serde(rename = "agentId")]
    pub agent_id: String,
}

/// Request body for `POST /api/configurar-agente`.
///
/// Every field is optional at the parsing layer so missing fields surface
/// as the endpoint's own 400 rather than a deserialization rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigureAgentRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default, rename = "agentName")]
    pub agent_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigureAgentResponse {
    pub message: String,
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

async fn signed_url_for(
    state: &AppState,
    agent_id: Option<&String>,
) -> Result<Json<SignedUrlResponse>, ApiError> {
    let (Some(agent_id), Some(api_key)) = (
        present(agent_id),
        present(state.convai_config.api_key.as_ref()),
    ) else {
        tracing::warn!("signed url requested without agent id or XI_API_KEY");
        return Err(ApiError::InternalServerError(MISSING_ENV.to_string()));
    };

    match state.convai.signed_url(api_key, agent_id).await {
        Ok(signed_url) => Ok(Json(SignedUrlResponse { signed_url })),
        Err(e) => {
            tracing::error!(agent_id, "failed to get signed url: {}", e);
            Err(ApiError::InternalServerError(SIGNED_URL_FAILED.to_string()))
        }
    }
}

fn agent_id_for(agent_id: Option<&String>) -> Result<Json<AgentIdResponse>, ApiError> {
    present(agent_id)
        .map(|id| {
            Json(AgentIdResponse {
                agent_id: id.to_string(),
            })
        })
        .ok_or_else(|| ApiError::InternalServerError(AGENT_ID_NOT_FOUND.to_string()))
}

/// Handler for `GET /api/signed-url`.
pub async fn signed_url_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<SignedUrlResponse>, ApiError> {
    signed_url_for(&state, state.convai_config.agent_id.as_ref()).await
}

/// Handler for `GET /api/signed-url-lait`.
pub async fn signed_url_lait_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<SignedUrlResponse>, ApiError> {
    signed_url_for(&state, state.convai_config.lait_agent_id.as_ref()).await
}

/// Handler for `GET /api/getAgentId`.
pub async fn agent_id_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<AgentIdResponse>, ApiError> {
    agent_id_for(state.convai_config.agent_id.as_ref())
}

/// Handler for `GET /api/getAgentIdLait`.
pub async fn agent_id_lait_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<AgentIdResponse>, ApiError> {
    agent_id_for(state.convai_config.lait_agent_id.as_ref())
}

/// Handler for `POST /api/configurar-agente`.
///
/// Points the secondary hosted agent at a new prompt and voice. The request
/// is validated before any configuration is consulted, so a bad request
/// never reaches the vendor.
pub async fn configure_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<ConfigureAgentRequest>, JsonRejection>,
) -> Result<Json<ConfigureAgentResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let (Some(prompt), Some(voice_id)) = (
        present(payload.prompt.as_ref()),
        present(payload.voice_id.as_ref()),
    ) else {
        return Err(ApiError::BadRequest(MISSING_FIELDS.to_string()));
    };

    let config = &state.convai_config;
    let (Some(agent_id), Some(api_key)) = (
        present(config.lait_agent_id.as_ref()),
        present(config.api_key.as_ref()),
    ) else {
        tracing::warn!("agent configuration requested without AGENT_ID_LAIT or XI_API_KEY");
        return Err(ApiError::InternalServerError(
            CONFIGURE_MISSING_ENV.to_string(),
        ));
    };

    let agent_name = present(payload.agent_name.as_ref()).unwrap_or(state.persona.name.as_str());
    let first_message = config.greeting_template.replace(NAME_PLACEHOLDER, agent_name);
    let update = AgentUpdate::new(
        payload.agent_name.clone(),
        first_message,
        prompt.to_string(),
        config.llm.clone(),
        voice_id.to_string(),
    );

    match state.convai.update_agent(api_key, agent_id, &update).await {
        Ok(()) => {
            tracing::info!(agent_id, voice_id, "hosted agent reconfigured");
            Ok(Json(ConfigureAgentResponse {
                message: CONFIGURED.to_string(),
            }))
        }
        Err(VoiceError::Upstream { status, body, .. }) => {
            tracing::warn!(agent_id, status, "vendor rejected agent configuration");
            Err(ApiError::InternalServerError(format!(
                "Error de ElevenLabs: {}",
                body
            )))
        }
        Err(e) => {
            tracing::error!(agent_id, "failed to configure hosted agent: {}", e);
            Err(ApiError::InternalServerError(
                CONFIGURE_UNEXPECTED.to_string(),
            ))
        }
    }
}

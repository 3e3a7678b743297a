//! Parla server library logic.
//!
//! Hosts the WebSocket relay at `/ws/conversar` and the REST pass-throughs
//! to the hosted conversational agent.

pub mod api;
pub mod api_agent;
pub mod api_ws;
pub mod config;
pub mod relay;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Extension, Json, Router,
};
use config::{Config, SpeechProvider};
use parla_types::Persona;
use parla_voice::{
    ConvaiClient, ConvaiConfig, ElevenLabsTts, GoogleCloudTts, LanguageAdapter, OpenAiChatClient,
    SpeechAdapter, VoiceError,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Maximum request body size (2 MiB). Protects against OOM from oversized payloads.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Origin entry that allows every origin.
const ANY_ORIGIN: &str = "*";

/// Application state shared across all request handlers.
///
/// Everything here is built once at startup and only read afterwards.
#[derive(Clone)]
pub struct AppState {
    /// The agent relayed on every WebSocket connection.
    pub persona: Arc<Persona>,
    /// Generates agent replies.
    pub language: Arc<dyn LanguageAdapter>,
    /// Synthesizes agent speech.
    pub speech: Arc<dyn SpeechAdapter>,
    /// Hosted agent client for the REST pass-throughs.
    pub convai: Arc<ConvaiClient>,
    /// Keys and agent ids for the REST pass-throughs.
    pub convai_config: Arc<ConvaiConfig>,
    /// Origins allowed to call the server.
    pub allowed_origins: Arc<Vec<String>>,
}

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("failed to initialize speech synthesis: {0}")]
    Speech(#[from] VoiceError),
}

impl AppState {
    /// Builds the vendor clients described by `config`.
    ///
    /// All clients share one HTTP client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `StartupError` if the HTTP client cannot be built or the
    /// selected speech provider is missing credentials.
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .user_agent(concat!("parla-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StartupError::HttpClient)?;

        let speech: Arc<dyn SpeechAdapter> = match config.speech.provider {
            SpeechProvider::ElevenLabs => {
                let tts = ElevenLabsTts::new(http.clone(), &config.speech.elevenlabs)?;
                tracing::info!(model_id = tts.model_id(), "using ElevenLabs speech synthesis");
                Arc::new(tts)
            }
            SpeechProvider::Google => {
                let tts = GoogleCloudTts::new(http.clone(), &config.speech.google).await?;
                tracing::info!("using Google Cloud speech synthesis");
                Arc::new(tts)
            }
        };

        let language: Arc<dyn LanguageAdapter> =
            Arc::new(OpenAiChatClient::new(http.clone(), config.openai.clone()));
        let convai = ConvaiClient::new(http, &config.convai.base_url);

        Ok(Self {
            persona: Arc::new(config.persona.clone()),
            language,
            speech,
            convai: Arc::new(convai),
            convai_config: Arc::new(config.convai.clone()),
            allowed_origins: Arc::new(config.cors.allowed_origins.clone()),
        })
    }

    /// Returns true if `origin` may call the server.
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == ANY_ORIGIN || allowed == origin)
    }
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the CORS layer for the allow-list.
///
/// Listed origins get credentialed access with methods and headers mirrored
/// from the preflight. A `"*"` entry opens the server to every origin, which
/// browsers only honour without credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == ANY_ORIGIN) {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "skipping invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.allowed_origins);

    Router::new()
        .route("/health", get(health))
        .route("/ws/conversar", get(api_ws::ws_handler))
        .route("/api/signed-url", get(api_agent::signed_url_handler))
        .route(
            "/api/signed-url-lait",
            get(api_agent::signed_url_lait_handler),
        )
        .route("/api/getAgentId", get(api_agent::agent_id_handler))
        .route(
            "/api/getAgentIdLait",
            get(api_agent::agent_id_lait_handler),
        )
        .route(
            "/api/configurar-agente",
            post(api_agent::configure_agent_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}

//! Shared helpers for server integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use parla_server::{app, AppState};
use parla_types::{Persona, Turn};
use parla_voice::{ConvaiClient, ConvaiConfig, LanguageAdapter, SpeechAdapter, VoiceError};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const ALLOWED_ORIGIN: &str = "http://localhost:4200";

/// Language model double that answers every turn with the same reply.
pub struct ScriptedLanguage {
    reply: Result<String, String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedLanguage {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(body: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(body.to_string()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The caller text of every turn passed in, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageAdapter for ScriptedLanguage {
    async fn reply(&self, _system_prompt: &str, turns: &[Turn]) -> Result<String, VoiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(turn) = turns.last() {
            self.seen.lock().unwrap().push(turn.text.clone());
        }
        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err(body) => Err(VoiceError::Upstream {
                service: "OpenAI",
                status: 500,
                body: body.clone(),
            }),
        }
    }
}

/// Speech double that returns fixed bytes and records each text spoken.
pub struct FixedSpeech {
    audio: Vec<u8>,
    spoken: Mutex<Vec<String>>,
}

impl FixedSpeech {
    pub fn returning(audio: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            audio: audio.to_vec(),
            spoken: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.spoken.lock().unwrap().len()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechAdapter for FixedSpeech {
    async fn synthesize(&self, text: &str, _voice_id: &str) -> Result<Vec<u8>, VoiceError> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(self.audio.clone())
    }
}

pub fn test_persona() -> Persona {
    Persona {
        name: "Natalia".to_string(),
        greeting_text: "Hola, soy Natalia.".to_string(),
        farewell_text: "Gracias por comunicarte.".to_string(),
        farewell_keywords: vec!["adiós".to_string(), "hasta luego".to_string()],
        ..Persona::default()
    }
}

/// Builds state around the given doubles. The hosted agent client points
/// at `convai_base` (an unroutable address when not exercised).
pub fn test_state(
    language: Arc<dyn LanguageAdapter>,
    speech: Arc<dyn SpeechAdapter>,
    convai: ConvaiConfig,
    origins: &[&str],
) -> AppState {
    AppState {
        persona: Arc::new(test_persona()),
        language,
        speech,
        convai: Arc::new(ConvaiClient::new(reqwest::Client::new(), &convai.base_url)),
        convai_config: Arc::new(convai),
        allowed_origins: Arc::new(origins.iter().map(|o| o.to_string()).collect()),
    }
}

/// State with working doubles and the default origin allow-list.
pub fn default_state() -> AppState {
    test_state(
        ScriptedLanguage::replying("Con gusto."),
        FixedSpeech::returning(b"audio"),
        ConvaiConfig::default(),
        &[ALLOWED_ORIGIN],
    )
}

/// Serves the application on an ephemeral local port.
pub async fn spawn_app(state: AppState) -> SocketAddr {
    serve(app(state)).await
}

/// Serves a mock vendor on an ephemeral local port and returns its base URL.
pub async fn spawn_mock(router: Router) -> String {
    format!("http://{}", serve(router).await)
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

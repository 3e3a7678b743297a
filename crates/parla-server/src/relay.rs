//! The per-connection conversation loop.
//!
//! A [`Relay`] greets the caller, then handles one utterance at a time:
//! farewell phrases end the conversation with the persona's farewell, any
//! other utterance goes to the language model and its reply is spoken back.
//! Every agent turn reaches the caller as a [`ResponseEnvelope`]; the first
//! failure is reported as an [`ErrorEnvelope`] and ends the conversation.

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes};
use base64::Engine;
use futures_util::{FutureExt, Sink, SinkExt};
use parla_types::{ErrorEnvelope, Persona, ResponseEnvelope, Turn};
use parla_voice::{LanguageAdapter, SpeechAdapter, VoiceError};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Maximum accepted utterance size (4 KiB).
pub const MAX_UTTERANCE_BYTES: usize = 4 * 1024;

/// Why a turn failed. The display text becomes the envelope's `detalle`.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("language model failed: {0}")]
    Language(#[source] VoiceError),

    #[error("audio generation returned no data")]
    EmptyAudio,

    #[error("speech synthesis failed: {0}")]
    Speech(#[source] VoiceError),

    #[error("utterance exceeds maximum size: {len} bytes (limit: {limit} bytes)")]
    UtteranceTooLong { len: usize, limit: usize },

    #[error("failed to read message: {0}")]
    Unreadable(String),

    #[error("unexpected error while handling the turn")]
    Unexpected,

    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to send message: {0}")]
    Send(String),
}

/// One item from the caller's side of the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame.
    Utterance(String),
    /// A frame the transport refused to read, such as one over the
    /// socket's message size limit.
    Unreadable(String),
}

/// The agent's answer to one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A normal turn; the conversation continues.
    Answer(ResponseEnvelope),
    /// The caller said goodbye; the conversation ends after this envelope.
    Farewell(ResponseEnvelope),
}

/// How a conversation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The caller said goodbye and got the farewell.
    Farewell,
    /// A turn failed and the caller got an error envelope.
    Failed,
    /// The caller went away first.
    Disconnected,
}

/// Runs conversations for one persona against a pair of adapters.
pub struct Relay<'a> {
    persona: &'a Persona,
    language: &'a dyn LanguageAdapter,
    speech: &'a dyn SpeechAdapter,
}

impl<'a> Relay<'a> {
    pub fn new(
        persona: &'a Persona,
        language: &'a dyn LanguageAdapter,
        speech: &'a dyn SpeechAdapter,
    ) -> Self {
        Self {
            persona,
            language,
            speech,
        }
    }

    /// Speaks the persona's greeting.
    pub async fn greeting(&self) -> Result<ResponseEnvelope, RelayError> {
        self.speak(&self.persona.greeting_text).await
    }

    /// Produces the agent's answer to one utterance.
    ///
    /// Farewells skip the language model entirely. Otherwise the language
    /// model is called once with only this utterance and its reply is
    /// synthesized once.
    pub async fn respond(&self, utterance: &str) -> Result<Reply, RelayError> {
        if utterance.len() > MAX_UTTERANCE_BYTES {
            return Err(RelayError::UtteranceTooLong {
                len: utterance.len(),
                limit: MAX_UTTERANCE_BYTES,
            });
        }

        if self.persona.is_farewell(utterance) {
            info!("caller said goodbye");
            return Ok(Reply::Farewell(
                self.speak(&self.persona.farewell_text).await?,
            ));
        }

        let reply = self
            .language
            .reply(&self.persona.system_prompt, &[Turn::caller(utterance)])
            .await
            .map_err(RelayError::Language)?;
        debug!(chars = reply.len(), "language model replied");

        Ok(Reply::Answer(self.speak(&reply).await?))
    }

    async fn speak(&self, text: &str) -> Result<ResponseEnvelope, RelayError> {
        let audio = self
            .speech
            .synthesize(text, &self.persona.voice_id)
            .await
            .map_err(RelayError::Speech)?;
        if audio.is_empty() {
            return Err(RelayError::EmptyAudio);
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(&audio);
        Ok(ResponseEnvelope::new(text, encoded))
    }

    /// Drives one conversation until farewell, failure or disconnect.
    ///
    /// `inbound` yields the caller's frames in order; an unreadable frame
    /// fails the conversation like any other turn. `closed` resolves once
    /// the caller is gone; an in-flight turn is then dropped without
    /// sending anything.
    pub async fn run<S>(
        &self,
        sink: &mut S,
        mut inbound: mpsc::Receiver<Inbound>,
        mut closed: watch::Receiver<()>,
    ) -> Outcome
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
    {
        let Some(greeting) = until_closed(&mut closed, guarded(self.greeting())).await else {
            return Outcome::Disconnected;
        };
        match greeting {
            Ok(envelope) => {
                if let Err(e) = send_json(sink, &envelope).await {
                    debug!("greeting not delivered: {}", e);
                    return Outcome::Disconnected;
                }
            }
            Err(e) => return self.fail(sink, e).await,
        }

        while let Some(frame) = inbound.recv().await {
            let utterance = match frame {
                Inbound::Utterance(text) => text,
                Inbound::Unreadable(reason) => {
                    return self.fail(sink, RelayError::Unreadable(reason)).await
                }
            };
            if utterance.trim().is_empty() {
                debug!("ignoring blank utterance");
                continue;
            }

            let Some(result) = until_closed(&mut closed, guarded(self.respond(&utterance))).await
            else {
                info!("caller left during a turn");
                return Outcome::Disconnected;
            };

            match result {
                Ok(Reply::Answer(envelope)) => {
                    if let Err(e) = send_json(sink, &envelope).await {
                        debug!("reply not delivered: {}", e);
                        return Outcome::Disconnected;
                    }
                }
                Ok(Reply::Farewell(envelope)) => {
                    if let Err(e) = send_json(sink, &envelope).await {
                        debug!("farewell not delivered: {}", e);
                        return Outcome::Disconnected;
                    }
                    close(sink, close_code::NORMAL).await;
                    return Outcome::Farewell;
                }
                Err(e) => return self.fail(sink, e).await,
            }
        }

        Outcome::Disconnected
    }

    async fn fail<S>(&self, sink: &mut S, error: RelayError) -> Outcome
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
    {
        warn!(error = %error, "turn failed");
        let envelope = ErrorEnvelope::new(self.persona.error_text.as_str(), error.to_string());
        if let Err(e) = send_json(sink, &envelope).await {
            debug!("error envelope not delivered: {}", e);
            return Outcome::Disconnected;
        }
        close(sink, close_code::ERROR).await;
        Outcome::Failed
    }
}

/// Awaits `fut` unless the caller goes away first.
async fn until_closed<F: Future>(closed: &mut watch::Receiver<()>, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = closed.changed() => None,
        output = fut => Some(output),
    }
}

/// Turns a panic inside `fut` into [`RelayError::Unexpected`].
async fn guarded<T, F>(fut: F) -> Result<T, RelayError>
where
    F: Future<Output = Result<T, RelayError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("panic while handling a turn");
            Err(RelayError::Unexpected)
        }
    }
}

async fn send_json<S, T>(sink: &mut S, value: &T) -> Result<(), RelayError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    T: Serialize,
{
    let json = serde_json::to_string(value)?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| RelayError::Send(e.to_string()))
}

async fn close<S>(sink: &mut S, code: u16)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let frame = CloseFrame {
        code,
        reason: Utf8Bytes::from_static(""),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        debug!("close frame not delivered: {}", e);
    }
}

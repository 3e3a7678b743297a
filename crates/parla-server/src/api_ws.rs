//! WebSocket endpoint for voice conversations.

use crate::relay::{Inbound, Relay};
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::Instrument;
use uuid::Uuid;

/// Maximum inbound WebSocket message size (64 KiB). Utterances are far
/// smaller; the relay rejects anything over its own limit. A larger frame
/// fails to read and is reported to the caller as an error envelope.
const MAX_WS_MESSAGE_BYTES: usize = 64 * 1024;

/// Handler for `GET /ws/conversar`.
///
/// Browsers always send `Origin` on a WebSocket handshake, so a present but
/// unlisted origin is refused before upgrading. Non-browser clients that
/// omit the header are accepted.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    if let Some(origin) = headers.get(header::ORIGIN) {
        let allowed = origin
            .to_str()
            .map(|o| state.origin_allowed(o))
            .unwrap_or(false);
        if !allowed {
            tracing::warn!(origin = ?origin, "refusing websocket from unlisted origin");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    ws.max_message_size(MAX_WS_MESSAGE_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let span = tracing::info_span!("conversation", connection_id = %Uuid::new_v4());
    async move {
        tracing::info!("caller connected");

        let (mut sender, mut receiver) = socket.split();
        let (inbound_tx, inbound_rx) = mpsc::channel::<Inbound>(1);
        let (closed_tx, closed_rx) = watch::channel(());

        // Dropping `closed_tx` on exit tells the relay the caller is gone.
        let reader = tokio::spawn(
            async move {
                let _closed = closed_tx;
                while let Some(frame) = receiver.next().await {
                    match frame {
                        Ok(Message::Text(text)) => {
                            let utterance = Inbound::Utterance(text.to_string());
                            if inbound_tx.send(utterance).await.is_err() {
                                break;
                            }
                        }
                        Ok(Message::Binary(bytes)) => {
                            tracing::debug!(len = bytes.len(), "ignoring binary frame");
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            tracing::debug!("websocket read failed: {}", e);
                            let _ = inbound_tx.send(Inbound::Unreadable(e.to_string())).await;
                            break;
                        }
                    }
                }
            }
            .in_current_span(),
        );

        let relay = Relay::new(
            &state.persona,
            state.language.as_ref(),
            state.speech.as_ref(),
        );
        let outcome = relay.run(&mut sender, inbound_rx, closed_rx).await;

        reader.abort();
        let _ = sender.close().await;
        tracing::info!(?outcome, "conversation ended");
    }
    .instrument(span)
    .await
}

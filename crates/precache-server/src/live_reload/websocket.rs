//! WebSocket handler for live reload.
//!
//! Handles WebSocket connections and forwards reload messages to clients.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast;

use super::manager::ReloadMessage;
use crate::state::AppState;

/// Path of the live reload socket.
pub(crate) const WS_PATH: &str = "/__precache/ws";

/// Handle WebSocket upgrade for live reload.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let Some(ref live_reload) = state.live_reload else {
        return;
    };

    let mut receiver: broadcast::Receiver<ReloadMessage> = live_reload.subscribe();
    tracing::debug!("Live reload client connected");

    loop {
        tokio::select! {
            result = receiver.recv() => {
                match result {
                    Ok(message) => {
                        let Ok(text) = serde_json::to_string(&message) else {
                            continue;
                        };
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    // Skipped messages are superseded by later ones
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!("Live reload client disconnected");
}

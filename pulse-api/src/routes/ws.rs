//! WebSocket route handler
//!
//! Streams refresh progress to connected clients as JSON text frames.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use pulse_services::RefreshUpdate;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::AppState;

/// Create WebSocket routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Forward refresh updates and countdown ticks until the client goes away
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.refresh_service.subscribe();
    let mut countdown = state.refresh_service.countdown();

    // Current state first so the client can render immediately
    if let Ok(text) = serde_json::to_string(&state.refresh_service.snapshot()) {
        if sender.send(Message::Text(text.into())).await.is_err() {
            return;
        }
    }

    loop {
        let update = tokio::select! {
            received = updates.recv() => match received {
                Ok(update) => update,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("WebSocket client lagged, skipped {} updates", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            changed = countdown.changed() => {
                if changed.is_err() {
                    break;
                }
                let remaining_secs = *countdown.borrow_and_update();
                RefreshUpdate::Countdown { remaining_secs }
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            },
        };

        let text = match serde_json::to_string(&update) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize refresh update: {}", e);
                continue;
            }
        };

        if sender.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }

    debug!("WebSocket connection closed");
}

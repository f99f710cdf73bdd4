//! Duplex connection handling.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::gateway;
use crate::state::AppState;

const BANNER: &str = "This is the Sauti speech server!";

/// Single entry point for the bound port: WebSocket upgrades enter the
/// duplex protocol, everything else gets the static liveness banner.
pub async fn duplex_or_banner(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(upgrade) => upgrade
            .max_message_size(state.config.max_payload_bytes)
            .on_upgrade(move |socket| handle_socket(socket, state))
            .into_response(),
        Err(_) => BANNER.into_response(),
    }
}

/// Manage one duplex connection after upgrade.
///
/// The socket splits into a sink fed by a per-connection channel (the
/// handle stored in the connection registry) and a receive loop that
/// feeds inbound frames to the gateway. On disconnect every routing entry
/// owned by this connection is swept.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    info!(%connection_id, "accepted incoming connection");

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    let (mut sink, mut stream) = socket.split();

    let sender_connection_id = connection_id;
    let send_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sink.send(message).await.is_err() {
                debug!(connection_id = %sender_connection_id, "outbound sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Binary(bytes)) => {
                gateway::submit_frame(&state, connection_id, &outbound_tx, &bytes);
            }
            Ok(Message::Text(text)) => {
                // The protocol only accepts binary-framed envelopes; a
                // text frame is dropped without closing the connection.
                warn!(%connection_id, "received unexpected text frame: '{}'", text.as_str());
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                warn!(%connection_id, %error, "connection error");
                break;
            }
        }
    }

    state.connections.remove_connection(connection_id);
    send_task.abort();
    info!(%connection_id, "connection closed");
}

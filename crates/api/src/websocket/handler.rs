//! WebSocket handler for Axum
//!
//! Handles WebSocket connections, authentication, and event routing.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{stream::StreamExt, Sink, SinkExt};
use roomcast_shared::UserId;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::auth::bearer_token;
use crate::error::ApiResult;
use crate::state::AppState;

use super::{
    connection::{Connection, Outbound},
    events::{ClientEvent, ServerEvent},
    state::RelayState,
};

/// Upper bound on flushing queued frames after the read side ends
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: Option<String>,
}

/// WebSocket handler - upgrades HTTP connection to WebSocket
///
/// The bearer credential comes from the `Authorization` header, falling back to
/// the `token` query parameter for browser clients. Nothing is registered unless
/// it verifies.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Query(params): Query<WebSocketQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let credential = bearer_token(&headers).or(params.token);
    let user_id = app_state.verifier.authenticate(credential.as_deref())?;

    tracing::info!(user_id = %user_id, "WebSocket connection upgrade requested");

    let relay = app_state.relay.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user_id, relay)))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, user_id: UserId, relay: RelayState) {
    let (mut sender, mut receiver) = socket.split();

    // Create channel for sending events to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let conn = relay.sessions().connect(user_id, tx).await;
    let connection_id = conn.id;

    // Spawn task to send messages to client
    let mut send_task = tokio::spawn(write_outbound(sender, rx));

    // Handle incoming messages
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => handle_client_event(event, &conn, &relay).await,
                Err(e) => {
                    tracing::warn!(
                        error = ?e,
                        connection_id = %connection_id,
                        "Failed to parse client event"
                    );
                    let _ = conn.send(ServerEvent::Error {
                        message: "Invalid event format".to_string(),
                    });
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!(connection_id = %connection_id, "WebSocket close frame received");
                break;
            }
            Ok(_) => {} // Ping/pong handled by axum, binary ignored
            Err(e) => {
                tracing::debug!(error = ?e, connection_id = %connection_id, "WebSocket read error");
                break;
            }
        }
    }

    // Cleanup on disconnect, whatever transition was last in flight
    tracing::info!(connection_id = %connection_id, user_id = %conn.user_id, "WebSocket connection closing");
    relay.sessions().disconnect(connection_id).await;

    // The registry no longer holds the connection; dropping ours ends the
    // writer once it has flushed what is queued
    drop(conn);
    if tokio::time::timeout(WRITER_FLUSH_TIMEOUT, &mut send_task)
        .await
        .is_err()
    {
        tracing::debug!(connection_id = %connection_id, "Writer did not drain in time");
        send_task.abort();
    }
}

/// Forward queued items to the socket until the channel ends or a close is sent
async fn write_outbound<S>(mut sender: S, mut rx: mpsc::UnboundedReceiver<Outbound>)
where
    S: Sink<Message> + Unpin,
{
    while let Some(item) = rx.recv().await {
        let serialized = match item {
            Outbound::Event(event) => serde_json::to_string(&event),
            Outbound::Broadcast(frame) => serde_json::to_string(&*frame),
            Outbound::Close => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        };
        match serialized {
            Ok(json) => {
                if sender.send(Message::Text(json)).await.is_err() {
                    break; // Connection closed
                }
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to serialize WebSocket event");
            }
        }
    }
}

/// Handle client event
async fn handle_client_event(event: ClientEvent, conn: &Connection, relay: &RelayState) {
    match event {
        ClientEvent::JoinRoom(room_id) => {
            if room_id.as_str().trim().is_empty() {
                let _ = conn.send(ServerEvent::Error {
                    message: "Room ID is required".to_string(),
                });
                return;
            }
            relay.sessions().join(conn.id, room_id).await;
        }

        ClientEvent::LeaveRoom(room_id) => {
            relay.sessions().leave(conn.id, &room_id).await;
        }
    }
}

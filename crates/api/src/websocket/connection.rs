//! WebSocket connection handle
//!
//! Represents an authenticated WebSocket connection and its outbound channel.

use std::sync::Arc;

use roomcast_shared::{ConnectionId, UserId};
use tokio::sync::mpsc;

use super::events::{BroadcastFrame, ServerEvent};

/// Items queued for a connection's writer task
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Membership or control event
    Event(ServerEvent),
    /// Room broadcast shared across all recipients
    Broadcast(Arc<BroadcastFrame>),
    /// Ask the writer to send a close frame and stop
    Close,
}

/// The connection's writer has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("connection closed")]
pub struct ConnectionClosed;

/// Represents an active WebSocket connection
#[derive(Debug)]
pub struct Connection {
    /// Unique ID for this transport session
    pub id: ConnectionId,

    /// Authenticated user ID
    pub user_id: UserId,

    /// Channel to the connection's writer task
    sender: mpsc::UnboundedSender<Outbound>,
}

impl Connection {
    /// Create a new connection
    pub fn new(user_id: UserId, sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: ConnectionId::new(),
            user_id,
            sender,
        }
    }

    /// Send an event to this connection
    pub fn send(&self, event: ServerEvent) -> Result<(), ConnectionClosed> {
        self.sender
            .send(Outbound::Event(event))
            .map_err(|_| ConnectionClosed)
    }

    /// Send a room broadcast to this connection
    pub fn send_broadcast(&self, frame: Arc<BroadcastFrame>) -> Result<(), ConnectionClosed> {
        self.sender
            .send(Outbound::Broadcast(frame))
            .map_err(|_| ConnectionClosed)
    }

    /// Request the socket be closed
    pub fn close(&self) {
        if self.sender.send(Outbound::Close).is_err() {
            tracing::debug!(connection_id = %self.id, "Close requested on finished connection");
        }
    }
}

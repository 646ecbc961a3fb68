//! Control bridge
//!
//! Lets actors outside the connection layer (for example the application server)
//! trigger room broadcasts through the same router the sockets use. Success means
//! the router accepted the event, not that any peer received it.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use roomcast_shared::RoomId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::websocket::{BroadcastRouter, FanOutReport};

/// Event kinds the control plane may trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerKind {
    GameUpdate,
    HandStarted,
    PlayerAction,
    HandComplete,
    ChatMessage,
    RoomNotice,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 6] = [
        TriggerKind::GameUpdate,
        TriggerKind::HandStarted,
        TriggerKind::PlayerAction,
        TriggerKind::HandComplete,
        TriggerKind::ChatMessage,
        TriggerKind::RoomNotice,
    ];

    /// Event name delivered to sockets
    pub fn event_name(&self) -> &'static str {
        match self {
            TriggerKind::GameUpdate => "game-update",
            TriggerKind::HandStarted => "hand-started",
            TriggerKind::PlayerAction => "player-action",
            TriggerKind::HandComplete => "hand-complete",
            TriggerKind::ChatMessage => "chat-message",
            TriggerKind::RoomNotice => "room-notice",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

impl FromStr for TriggerKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.event_name() == s)
            .ok_or_else(|| BridgeError::UnknownEvent(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("Broadcast router not initialized")]
    RouterUnavailable,
    #[error("Unknown event kind: {0}")]
    UnknownEvent(String),
    #[error("Room ID is required")]
    MissingRoom,
}

/// Entry point for externally triggered broadcasts
#[derive(Clone, Default)]
pub struct ControlBridge {
    router: Arc<OnceLock<BroadcastRouter>>,
}

impl ControlBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the router reachable. Only the first call takes effect.
    pub fn attach(&self, router: BroadcastRouter) -> bool {
        let attached = self.router.set(router).is_ok();
        if !attached {
            tracing::warn!("Control bridge already attached to a router");
        }
        attached
    }

    pub fn is_ready(&self) -> bool {
        self.router.get().is_some()
    }

    /// Broadcast `payload` to `room_id` as the event for `kind`
    pub async fn trigger(
        &self,
        kind: TriggerKind,
        room_id: RoomId,
        payload: Value,
    ) -> Result<FanOutReport, BridgeError> {
        let router = self.router.get().ok_or(BridgeError::RouterUnavailable)?;
        if room_id.as_str().trim().is_empty() {
            return Err(BridgeError::MissingRoom);
        }

        let report = router.broadcast(&room_id, kind.event_name(), payload).await;
        tracing::info!(
            room_id = %room_id,
            event = %kind,
            recipients = report.delivered,
            "Control bridge broadcast"
        );
        Ok(report)
    }
}

//! WebSocket event types and serialization
//!
//! Every frame is a JSON text message of the form `{"event": <name>, "data": <payload>}`.
//! Event names are part of the wire contract.

use roomcast_shared::{RoomId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Join a room, implicitly leaving the current one
    JoinRoom(RoomId),

    /// Leave a room
    LeaveRoom(RoomId),
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Membership and control events sent from server to client
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Direct confirmation to a joining connection
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_id: RoomId,
        connected_users: Vec<UserId>,
    },

    /// A peer entered the room
    PlayerConnected(PresenceNotice),

    /// A peer left the room
    PlayerDisconnected(PresenceNotice),

    /// Frame could not be handled
    Error { message: String },
}

impl ServerEvent {
    pub fn player_connected(user_id: &UserId) -> Self {
        Self::PlayerConnected(PresenceNotice {
            user_id: user_id.clone(),
            message: format!("{} joined the room", user_id),
            timestamp: OffsetDateTime::now_utc(),
        })
    }

    pub fn player_disconnected(user_id: &UserId) -> Self {
        Self::PlayerDisconnected(PresenceNotice {
            user_id: user_id.clone(),
            message: format!("{} left the room", user_id),
            timestamp: OffsetDateTime::now_utc(),
        })
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::RoomJoined { .. } => "room-joined",
            ServerEvent::PlayerConnected(_) => "player-connected",
            ServerEvent::PlayerDisconnected(_) => "player-disconnected",
            ServerEvent::Error { .. } => "error",
        }
    }
}

// =============================================================================
// Event Data Structures
// =============================================================================

/// Arrival/departure notice data
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PresenceNotice {
    pub user_id: UserId,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// An arbitrary room broadcast, already wrapped in its envelope
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct BroadcastFrame {
    pub event: String,
    pub data: Value,
}

impl BroadcastFrame {
    /// Merge `{roomId, timestamp}` into `payload`.
    ///
    /// Object payloads keep all their fields (envelope fields win on collision).
    /// `null` becomes an empty object, any other value is nested under `data`.
    pub fn new(event: impl Into<String>, room_id: &RoomId, payload: Value) -> Self {
        let mut data = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };

        data.insert("roomId".to_string(), Value::String(room_id.to_string()));
        data.insert("timestamp".to_string(), Value::String(timestamp_now()));

        Self {
            event: event.into(),
            data: Value::Object(data),
        }
    }
}

/// Current time as an RFC 3339 UTC string
pub fn timestamp_now() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_event_deserialization() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"join-room","data":"table-7"}"#).unwrap();
        assert_eq!(event, ClientEvent::JoinRoom(RoomId::from("table-7")));

        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"leave-room","data":"table-7"}"#).unwrap();
        assert_eq!(event, ClientEvent::LeaveRoom(RoomId::from("table-7")));
    }

    #[test]
    fn test_unknown_client_event_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"dance","data":"x"}"#).is_err());
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"join-room"}"#).is_err());
    }

    #[test]
    fn test_room_joined_serialization() {
        let event = ServerEvent::RoomJoined {
            room_id: RoomId::from("table-7"),
            connected_users: vec![UserId::from("alice")],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "room-joined",
                "data": { "roomId": "table-7", "connectedUsers": ["alice"] }
            })
        );
        assert_eq!(event.name(), "room-joined");
    }

    #[test]
    fn test_presence_notice_serialization() {
        let event = ServerEvent::player_connected(&UserId::from("bob"));
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event"], "player-connected");
        assert_eq!(value["data"]["userId"], "bob");
        assert_eq!(value["data"]["message"], "bob joined the room");
        assert!(value["data"]["timestamp"].is_string());

        let event = ServerEvent::player_disconnected(&UserId::from("bob"));
        assert_eq!(serde_json::to_value(&event).unwrap()["event"], "player-disconnected");
    }

    #[test]
    fn test_broadcast_frame_merges_envelope() {
        let frame = BroadcastFrame::new(
            "hand-start",
            &RoomId::from("table-7"),
            json!({ "type": "hand-start", "roomId": "spoofed" }),
        );

        assert_eq!(frame.event, "hand-start");
        assert_eq!(frame.data["type"], "hand-start");
        assert_eq!(frame.data["roomId"], "table-7");
        let timestamp = frame.data["timestamp"].as_str().unwrap();
        assert!(OffsetDateTime::parse(timestamp, &Rfc3339).is_ok());
    }

    #[test]
    fn test_broadcast_frame_wraps_non_objects() {
        let room = RoomId::from("lobby");

        let frame = BroadcastFrame::new("tick", &room, json!([1, 2, 3]));
        assert_eq!(frame.data["data"], json!([1, 2, 3]));
        assert_eq!(frame.data["roomId"], "lobby");

        let frame = BroadcastFrame::new("tick", &room, Value::Null);
        assert_eq!(frame.data.as_object().unwrap().len(), 2);
    }
}

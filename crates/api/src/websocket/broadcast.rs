//! Room fan-out
//!
//! Delivery is fire-and-forget, at most once per member connected at the time of
//! the snapshot. A member whose connection vanished is skipped, never an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use roomcast_shared::{RoomId, UserId};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use super::connection::{Connection, ConnectionClosed};
use super::events::{BroadcastFrame, ServerEvent};
use super::registry::ConnectionRegistry;

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanOutReport {
    /// Queued on a live connection
    pub delivered: usize,
    /// Member without a live connection
    pub skipped: usize,
    /// Connection writer already gone
    pub failed: usize,
}

/// Deliver `send` to every member of `room_id` except `exclude`.
///
/// Runs against a registry the caller has already locked, so the member snapshot
/// and the deliveries observe the same state.
pub(crate) fn fan_out<F>(
    registry: &ConnectionRegistry,
    room_id: &RoomId,
    exclude: Option<&UserId>,
    send: F,
) -> FanOutReport
where
    F: Fn(&Connection) -> Result<(), ConnectionClosed>,
{
    let mut report = FanOutReport::default();

    for user_id in registry.room_members(room_id) {
        if exclude == Some(&user_id) {
            continue;
        }
        match registry.live_connection(&user_id) {
            Some(conn) => match send(conn) {
                Ok(()) => report.delivered += 1,
                Err(_) => {
                    report.failed += 1;
                    tracing::warn!(
                        connection_id = %conn.id,
                        user_id = %user_id,
                        "Failed to send event to connection (likely closed)"
                    );
                }
            },
            None => {
                report.skipped += 1;
                tracing::debug!(
                    room_id = %room_id,
                    user_id = %user_id,
                    "Skipping member without a live connection"
                );
            }
        }
    }

    report
}

/// Notify a room's members of a membership event
pub(crate) fn notify_room(
    registry: &ConnectionRegistry,
    room_id: &RoomId,
    exclude: Option<&UserId>,
    event: &ServerEvent,
) -> FanOutReport {
    let report = fan_out(registry, room_id, exclude, |conn| conn.send(event.clone()));
    tracing::debug!(
        room_id = %room_id,
        event = event.name(),
        recipients = report.delivered,
        "Room notice sent"
    );
    report
}

/// Fans payloads out to every connection in a room
#[derive(Clone)]
pub struct BroadcastRouter {
    registry: Arc<RwLock<ConnectionRegistry>>,
}

impl BroadcastRouter {
    pub fn new(registry: Arc<RwLock<ConnectionRegistry>>) -> Self {
        Self { registry }
    }

    /// Broadcast `payload` as `event_name` to all members of `room_id`.
    ///
    /// The payload is passed through untouched apart from the added `roomId` and
    /// `timestamp` fields.
    pub async fn broadcast(&self, room_id: &RoomId, event_name: &str, payload: Value) -> FanOutReport {
        let frame = Arc::new(BroadcastFrame::new(event_name, room_id, payload));

        let registry = self.registry.read().await;
        let report = fan_out(&registry, room_id, None, |conn| {
            conn.send_broadcast(Arc::clone(&frame))
        });

        if report.delivered == 0 && report.skipped == 0 && report.failed == 0 {
            tracing::debug!(
                room_id = %room_id,
                event = %event_name,
                "No room found - no subscribers"
            );
        } else {
            tracing::debug!(
                room_id = %room_id,
                event = %event_name,
                recipients = report.delivered,
                skipped = report.skipped,
                failed = report.failed,
                "Broadcast event to room"
            );
        }

        report
    }

    /// Statistics computed from a consistent registry snapshot
    pub async fn stats(&self) -> RelayStats {
        let registry = self.registry.read().await;
        RelayStats {
            connected_users: registry.connected_user_count(),
            active_rooms: registry.room_count(),
            rooms: registry
                .room_sizes()
                .into_iter()
                .map(|(room, size)| (room.0, size))
                .collect(),
        }
    }
}

/// Statistics about connections and rooms
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
    /// Number of users with a live connection
    pub connected_users: usize,
    /// Number of non-empty rooms
    pub active_rooms: usize,
    /// Member count per room
    pub rooms: BTreeMap<String, usize>,
}

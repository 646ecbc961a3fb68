//! Room session management
//!
//! Each connection is either `Unjoined` or `Joined(room)`. Transitions update the
//! registry and notify room peers while holding the registry write lock, so peers
//! always see a departure notice before the matching arrival notice.

use std::sync::Arc;

use roomcast_shared::{ConnectionId, RoomId, UserId};
use tokio::sync::{mpsc, RwLock};

use super::broadcast::notify_room;
use super::connection::{Connection, Outbound};
use super::events::ServerEvent;
use super::registry::{ConnectionRegistry, Membership};

/// Enforces one-room-at-a-time membership and emits membership notices
#[derive(Clone)]
pub struct RoomSessionManager {
    registry: Arc<RwLock<ConnectionRegistry>>,
    close_superseded: bool,
}

impl RoomSessionManager {
    pub fn new(registry: Arc<RwLock<ConnectionRegistry>>) -> Self {
        Self {
            registry,
            close_superseded: false,
        }
    }

    /// Close the previous socket when a user reconnects
    pub fn with_close_superseded(mut self, close_superseded: bool) -> Self {
        self.close_superseded = close_superseded;
        self
    }

    /// Register a freshly authenticated connection
    pub async fn connect(
        &self,
        user_id: UserId,
        sender: mpsc::UnboundedSender<Outbound>,
    ) -> Arc<Connection> {
        let conn = Arc::new(Connection::new(user_id, sender));
        let mut registry = self.registry.write().await;

        if let Some(previous) = registry.register(Arc::clone(&conn)) {
            tracing::info!(
                user_id = %conn.user_id,
                connection_id = %conn.id,
                superseded_connection_id = %previous.id,
                close_superseded = self.close_superseded,
                "Connection superseded an existing one for this user"
            );
            if self.close_superseded {
                previous.close();
            }
        }

        tracing::info!(
            connection_id = %conn.id,
            user_id = %conn.user_id,
            connected_users = registry.connected_user_count(),
            "WebSocket connection registered"
        );

        conn
    }

    /// Join `room_id`, leaving the current room first if it differs
    pub async fn join(&self, connection_id: ConnectionId, room_id: RoomId) {
        let mut registry = self.registry.write().await;
        apply_join(&mut registry, connection_id, room_id);
    }

    /// Leave `room_id`; a no-op unless the connection is currently in it
    pub async fn leave(&self, connection_id: ConnectionId, room_id: &RoomId) {
        let mut registry = self.registry.write().await;
        apply_leave(&mut registry, connection_id, room_id);
    }

    /// Leave whatever room the connection is in and drop its record. Idempotent.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut registry = self.registry.write().await;
        apply_disconnect(&mut registry, connection_id);
    }
}

/// Join transition against a locked registry. Returns `false` for unknown connections.
pub(crate) fn apply_join(
    registry: &mut ConnectionRegistry,
    connection_id: ConnectionId,
    room_id: RoomId,
) -> bool {
    let Some(conn) = registry.connection(connection_id).cloned() else {
        tracing::debug!(connection_id = %connection_id, room_id = %room_id, "Join from unknown connection ignored");
        return false;
    };
    let user_id = &conn.user_id;

    if let Some(Membership::Joined(previous)) = registry.membership(connection_id).cloned() {
        if previous != room_id {
            depart(registry, connection_id, user_id, &previous);
        }
    }

    registry.add_member(&room_id, user_id);
    registry.set_membership(connection_id, Membership::Joined(room_id.clone()));

    notify_room(
        registry,
        &room_id,
        Some(user_id),
        &ServerEvent::player_connected(user_id),
    );

    let mut connected_users: Vec<UserId> = registry
        .room_members(&room_id)
        .into_iter()
        .filter(|member| member != user_id)
        .collect();
    connected_users.sort();

    tracing::debug!(
        connection_id = %connection_id,
        user_id = %user_id,
        room_id = %room_id,
        room_size = connected_users.len() + 1,
        "Connection joined room"
    );

    if conn
        .send(ServerEvent::RoomJoined {
            room_id,
            connected_users,
        })
        .is_err()
    {
        tracing::debug!(connection_id = %connection_id, "Joiner closed before confirmation");
    }

    true
}

/// Leave transition against a locked registry. Returns whether anything changed.
pub(crate) fn apply_leave(
    registry: &mut ConnectionRegistry,
    connection_id: ConnectionId,
    room_id: &RoomId,
) -> bool {
    let Some(user_id) = registry.connection(connection_id).map(|c| c.user_id.clone()) else {
        return false;
    };
    if registry.membership(connection_id).and_then(Membership::room) != Some(room_id) {
        tracing::debug!(
            connection_id = %connection_id,
            room_id = %room_id,
            "Leave for a room not currently joined ignored"
        );
        return false;
    }

    depart(registry, connection_id, &user_id, room_id);
    true
}

/// Disconnect against a locked registry. Returns `false` when already gone.
pub(crate) fn apply_disconnect(registry: &mut ConnectionRegistry, connection_id: ConnectionId) -> bool {
    let Some(user_id) = registry.connection(connection_id).map(|c| c.user_id.clone()) else {
        return false;
    };

    if let Some(Membership::Joined(room_id)) = registry.membership(connection_id).cloned() {
        depart(registry, connection_id, &user_id, &room_id);
    }
    registry.unregister(connection_id, &user_id);

    tracing::info!(
        connection_id = %connection_id,
        user_id = %user_id,
        connected_users = registry.connected_user_count(),
        "WebSocket connection removed"
    );
    true
}

fn depart(
    registry: &mut ConnectionRegistry,
    connection_id: ConnectionId,
    user_id: &UserId,
    room_id: &RoomId,
) {
    registry.remove_member(room_id, user_id);
    registry.set_membership(connection_id, Membership::Unjoined);
    notify_room(
        registry,
        room_id,
        Some(user_id),
        &ServerEvent::player_disconnected(user_id),
    );
    tracing::debug!(
        connection_id = %connection_id,
        user_id = %user_id,
        room_id = %room_id,
        "Connection left room"
    );
}

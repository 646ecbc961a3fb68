//! Relay state shared across all connections
//!
//! Owns the single registry lock. The session manager and the broadcast router
//! are two views over the same registry.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::broadcast::{BroadcastRouter, RelayStats};
use super::registry::ConnectionRegistry;
use super::room::RoomSessionManager;

/// Global relay state shared across all connections
#[derive(Clone)]
pub struct RelayState {
    registry: Arc<RwLock<ConnectionRegistry>>,
    sessions: RoomSessionManager,
    router: BroadcastRouter,
}

impl RelayState {
    /// Create new relay state
    pub fn new() -> Self {
        let registry = Arc::new(RwLock::new(ConnectionRegistry::new()));
        Self {
            sessions: RoomSessionManager::new(Arc::clone(&registry)),
            router: BroadcastRouter::new(Arc::clone(&registry)),
            registry,
        }
    }

    /// Close a user's previous socket when they reconnect
    pub fn with_close_superseded(mut self, close_superseded: bool) -> Self {
        self.sessions = self.sessions.with_close_superseded(close_superseded);
        self
    }

    pub fn sessions(&self) -> &RoomSessionManager {
        &self.sessions
    }

    pub fn router(&self) -> &BroadcastRouter {
        &self.router
    }

    /// Get total number of connected users
    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.connected_user_count()
    }

    /// Get statistics about connections and rooms
    pub async fn get_stats(&self) -> RelayStats {
        self.router.stats().await
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomcast_shared::{RoomId, UserId};
    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::websocket::connection::Outbound;

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let state = RelayState::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let conn = state.sessions().connect(UserId::from("alice"), tx).await;
        assert_eq!(state.connection_count().await, 1);

        state.sessions().disconnect(conn.id).await;
        assert_eq!(state.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_sessions_and_router_share_registry() {
        let state = RelayState::new();
        let room = RoomId::from("table-7");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let conn = state.sessions().connect(UserId::from("alice"), tx).await;
        state.sessions().join(conn.id, room.clone()).await;
        let _ = rx.try_recv();

        let report = state.router().broadcast(&room, "hand-start", json!({})).await;
        assert_eq!(report.delivered, 1);
        assert!(matches!(rx.try_recv(), Ok(Outbound::Broadcast(_))));

        let stats = state.get_stats().await;
        assert_eq!(stats.connected_users, 1);
        assert_eq!(stats.active_rooms, 1);
    }
}

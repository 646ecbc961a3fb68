//! Connection and room membership registry
//!
//! Plain in-memory structures with no interior locking. [`super::state::RelayState`]
//! owns the single lock that serializes every mutation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use roomcast_shared::{ConnectionId, RoomId, UserId};

use super::connection::Connection;

/// Per-connection room state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Membership {
    #[default]
    Unjoined,
    Joined(RoomId),
}

impl Membership {
    pub fn room(&self) -> Option<&RoomId> {
        match self {
            Membership::Unjoined => None,
            Membership::Joined(room) => Some(room),
        }
    }
}

#[derive(Debug)]
struct ConnectionRecord {
    connection: Arc<Connection>,
    generation: u64,
    membership: Membership,
}

/// The user's current connection, versioned by registration
#[derive(Debug, Clone, Copy)]
struct UserSlot {
    connection_id: ConnectionId,
    generation: u64,
}

/// Registry of live connections and room memberships
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionRecord>,
    users: HashMap<UserId, UserSlot>,
    rooms: HashMap<RoomId, HashSet<UserId>>,
    next_generation: u64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection as its user's live connection.
    ///
    /// Last write wins: a prior connection for the same user is dropped from the
    /// registry and returned. Its membership moves to the new connection so the
    /// user's room entry stays consistent.
    pub fn register(&mut self, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        self.next_generation += 1;
        let generation = self.next_generation;
        let user_id = connection.user_id.clone();

        let superseded = self
            .users
            .get(&user_id)
            .and_then(|slot| self.connections.remove(&slot.connection_id));
        let membership = superseded
            .as_ref()
            .map(|record| record.membership.clone())
            .unwrap_or_default();

        self.users.insert(
            user_id,
            UserSlot {
                connection_id: connection.id,
                generation,
            },
        );
        self.connections.insert(
            connection.id,
            ConnectionRecord {
                connection,
                generation,
                membership,
            },
        );

        superseded.map(|record| record.connection)
    }

    /// Remove a connection record if it is still the one on file for `user_id`.
    ///
    /// Returns `false` when the connection is unknown or was superseded.
    pub fn unregister(&mut self, connection_id: ConnectionId, user_id: &UserId) -> bool {
        let Some(record) = self.connections.get(&connection_id) else {
            return false;
        };
        let current = self.users.get(user_id).is_some_and(|slot| {
            slot.connection_id == connection_id && slot.generation == record.generation
        });
        if !current {
            return false;
        }

        self.connections.remove(&connection_id);
        self.users.remove(user_id);
        true
    }

    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Arc<Connection>> {
        self.connections.get(&connection_id).map(|r| &r.connection)
    }

    pub fn membership(&self, connection_id: ConnectionId) -> Option<&Membership> {
        self.connections.get(&connection_id).map(|r| &r.membership)
    }

    /// Update a connection's membership state. Unknown connections are ignored.
    pub fn set_membership(&mut self, connection_id: ConnectionId, membership: Membership) {
        if let Some(record) = self.connections.get_mut(&connection_id) {
            record.membership = membership;
        }
    }

    /// The live connection currently on file for a user
    pub fn live_connection(&self, user_id: &UserId) -> Option<&Arc<Connection>> {
        self.users
            .get(user_id)
            .and_then(|slot| self.connections.get(&slot.connection_id))
            .map(|r| &r.connection)
    }

    /// Room of the user's live connection
    pub fn current_room(&self, user_id: &UserId) -> Option<RoomId> {
        let slot = self.users.get(user_id)?;
        self.connections
            .get(&slot.connection_id)
            .and_then(|r| r.membership.room().cloned())
    }

    /// Snapshot of a room's members
    pub fn room_members(&self, room_id: &RoomId) -> HashSet<UserId> {
        self.rooms.get(room_id).cloned().unwrap_or_default()
    }

    pub fn add_member(&mut self, room_id: &RoomId, user_id: &UserId) {
        self.rooms
            .entry(room_id.clone())
            .or_default()
            .insert(user_id.clone());
    }

    /// Remove a member, dropping the room once it is empty.
    ///
    /// Returns whether the user was a member.
    pub fn remove_member(&mut self, room_id: &RoomId, user_id: &UserId) -> bool {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let removed = members.remove(user_id);
        if members.is_empty() {
            self.rooms.remove(room_id);
            tracing::debug!(room_id = %room_id, "Removed empty room");
        }
        removed
    }

    pub fn connected_user_count(&self) -> usize {
        self.users.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Member count per room, ordered by room ID
    pub fn room_sizes(&self) -> BTreeMap<RoomId, usize> {
        self.rooms
            .iter()
            .map(|(room, members)| (room.clone(), members.len()))
            .collect()
    }

    /// Check membership invariants, returning a description of the first violation
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        for (room, members) in &self.rooms {
            if members.is_empty() {
                return Err(format!("room {room} is empty but still registered"));
            }
            for user in members {
                if self.current_room(user).as_ref() != Some(room) {
                    return Err(format!("{user} listed in {room} without being joined to it"));
                }
            }
        }
        for (user, slot) in &self.users {
            let Some(record) = self.connections.get(&slot.connection_id) else {
                return Err(format!("{user} points at a missing connection"));
            };
            if record.generation != slot.generation {
                return Err(format!("{user} slot generation mismatch"));
            }
            if let Membership::Joined(room) = &record.membership {
                if !self.rooms.get(room).is_some_and(|m| m.contains(user)) {
                    return Err(format!("{user} joined to {room} but missing from its members"));
                }
            }
        }
        if self.connections.len() != self.users.len() {
            return Err("orphan connection records".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn connection(user: &str) -> Arc<Connection> {
        let (tx, _rx) = mpsc::unbounded_channel();
        Arc::new(Connection::new(UserId::from(user), tx))
    }

    #[test]
    fn test_register_and_unregister() {
        let mut registry = ConnectionRegistry::new();
        let conn = connection("alice");

        assert!(registry.register(Arc::clone(&conn)).is_none());
        assert_eq!(registry.connected_user_count(), 1);
        assert_eq!(registry.live_connection(&conn.user_id).map(|c| c.id), Some(conn.id));

        assert!(registry.unregister(conn.id, &conn.user_id));
        assert_eq!(registry.connected_user_count(), 0);
        assert!(!registry.unregister(conn.id, &conn.user_id));
    }

    #[test]
    fn test_superseded_unregister_is_ignored() {
        let mut registry = ConnectionRegistry::new();
        let first = connection("alice");
        let second = connection("alice");

        registry.register(Arc::clone(&first));
        let superseded = registry.register(Arc::clone(&second));
        assert_eq!(superseded.map(|c| c.id), Some(first.id));

        // Stale unregister from the first socket must not evict the second
        assert!(!registry.unregister(first.id, &first.user_id));
        assert_eq!(
            registry.live_connection(&second.user_id).map(|c| c.id),
            Some(second.id)
        );
        registry.check_invariants().unwrap();
    }

    #[test]
    fn test_supersession_carries_membership() {
        let mut registry = ConnectionRegistry::new();
        let room = RoomId::from("table-7");
        let first = connection("alice");
        let second = connection("alice");

        registry.register(Arc::clone(&first));
        registry.add_member(&room, &first.user_id);
        registry.set_membership(first.id, Membership::Joined(room.clone()));

        registry.register(Arc::clone(&second));
        assert_eq!(registry.current_room(&second.user_id), Some(room.clone()));
        assert_eq!(registry.membership(second.id), Some(&Membership::Joined(room)));
        assert!(registry.membership(first.id).is_none());
        registry.check_invariants().unwrap();
    }

    #[test]
    fn test_room_members_and_cleanup() {
        let mut registry = ConnectionRegistry::new();
        let room = RoomId::from("lobby");
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        registry.add_member(&room, &alice);
        registry.add_member(&room, &bob);
        registry.add_member(&room, &bob);

        let snapshot = registry.room_members(&room);
        assert_eq!(snapshot.len(), 2);

        assert!(registry.remove_member(&room, &alice));
        assert_eq!(registry.room_count(), 1);
        assert!(registry.remove_member(&room, &bob));
        assert_eq!(registry.room_count(), 0);
        assert!(registry.room_members(&room).is_empty());
        assert!(!registry.remove_member(&room, &bob));

        // The earlier snapshot is unaffected by later mutation
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_room_sizes() {
        let mut registry = ConnectionRegistry::new();
        registry.add_member(&RoomId::from("b"), &UserId::from("u1"));
        registry.add_member(&RoomId::from("a"), &UserId::from("u2"));
        registry.add_member(&RoomId::from("a"), &UserId::from("u3"));

        let sizes: Vec<_> = registry.room_sizes().into_iter().collect();
        assert_eq!(
            sizes,
            vec![(RoomId::from("a"), 2), (RoomId::from("b"), 1)]
        );
    }
}

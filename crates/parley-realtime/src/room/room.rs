//! Single room with its live member connections.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use parley_core::types::{ConnectionId, RoomId, UserId};

use crate::connection::ConnectionRegistry;
use crate::message::types::OutboundMessage;

/// Result of a room broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Connections the event was queued on.
    pub connections: usize,
    /// Distinct users reached, excluding the sender.
    pub recipients: HashSet<UserId>,
}

impl BroadcastOutcome {
    /// Whether at least one user other than the sender got the event live.
    pub fn reached_recipient(&self) -> bool {
        !self.recipients.is_empty()
    }
}

/// A room and its joined connections.
///
/// The member map sits behind the room's own lock. Broadcasts hold it for
/// the whole fan-out so every recipient sees events in acceptance order.
#[derive(Debug)]
pub struct Room {
    /// Room ID.
    pub id: RoomId,
    /// When the room was first joined.
    pub created_at: DateTime<Utc>,
    members: Mutex<HashMap<ConnectionId, UserId>>,
}

impl Room {
    /// Creates a new empty room.
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            members: Mutex::new(HashMap::new()),
        }
    }

    fn members(&self) -> MutexGuard<'_, HashMap<ConnectionId, UserId>> {
        self.members.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a connection. Returns `(inserted, user_was_present)`.
    pub fn add(&self, conn_id: ConnectionId, user_id: UserId) -> (bool, bool) {
        let mut members = self.members();
        let user_was_present = members.values().any(|u| *u == user_id);
        let inserted = members.insert(conn_id, user_id).is_none();
        (inserted, user_was_present)
    }

    /// Removes a connection. Returns the owning user and whether that user
    /// still has another connection in the room.
    pub fn remove(&self, conn_id: &ConnectionId) -> Option<(UserId, bool)> {
        let mut members = self.members();
        let user_id = members.remove(conn_id)?;
        let still_present = members.values().any(|u| *u == user_id);
        Some((user_id, still_present))
    }

    /// Distinct users present, sorted.
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.members().values().copied().collect();
        users.sort();
        users.dedup();
        users
    }

    /// Returns member connection count.
    pub fn len(&self) -> usize {
        self.members().len()
    }

    /// Returns whether the room has any members.
    pub fn is_empty(&self) -> bool {
        self.members().is_empty()
    }

    /// Queue `msg` on every member connection except `except`, under the
    /// room lock.
    pub fn broadcast(
        &self,
        registry: &ConnectionRegistry,
        except: Option<ConnectionId>,
        sender: Option<UserId>,
        msg: &OutboundMessage,
    ) -> BroadcastOutcome {
        let members = self.members();
        let mut outcome = BroadcastOutcome::default();
        for (conn_id, user_id) in members.iter() {
            if Some(*conn_id) == except {
                continue;
            }
            if registry.send_to_connection(conn_id, msg.clone()) {
                outcome.connections += 1;
                if Some(*user_id) != sender {
                    outcome.recipients.insert(*user_id);
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_reports_existing_user() {
        let room = Room::new(RoomId::parse("t1").unwrap());
        let user = UserId::new();
        assert_eq!(room.add(ConnectionId::new(), user), (true, false));
        assert_eq!(room.add(ConnectionId::new(), user), (true, true));
        assert_eq!(room.user_ids(), vec![user]);
        assert_eq!(room.len(), 2);
    }

    #[test]
    fn test_remove_tracks_remaining_devices() {
        let room = Room::new(RoomId::parse("t1").unwrap());
        let user = UserId::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        room.add(a, user);
        room.add(b, user);

        assert_eq!(room.remove(&a), Some((user, true)));
        assert_eq!(room.remove(&b), Some((user, false)));
        assert_eq!(room.remove(&b), None);
        assert!(room.is_empty());
    }
}

//! Room manager — authorized joins, leaves, and broadcast.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use parley_core::config::HubConfig;
use parley_core::traits::{RoomAuthorizer, UserDirectory, UserDisplayInfo};
use parley_core::types::{ConnectionId, RoomId, UserId};
use parley_core::{AppError, AppResult};

use crate::connection::{ConnectionHandle, ConnectionRegistry};
use crate::message::types::OutboundMessage;

use super::LeaveReason;
use super::room::{BroadcastOutcome, Room};

/// Result of a `room:join`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// `false` when the connection had already joined.
    pub fresh: bool,
    /// Users online in the room after the join.
    pub online_user_ids: Vec<UserId>,
}

/// Result of removing a connection from a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub room_id: RoomId,
    /// The user has no other connection left in the room.
    pub user_gone: bool,
}

/// Registry of all live rooms.
///
/// Rooms are created lazily on first join and dropped when their last
/// connection leaves.
#[derive(Debug)]
pub struct RoomManager {
    rooms: DashMap<RoomId, Arc<Room>>,
    registry: Arc<ConnectionRegistry>,
    authorizer: Arc<dyn RoomAuthorizer>,
    directory: Arc<dyn UserDirectory>,
    config: HubConfig,
}

impl RoomManager {
    /// Creates a new room manager.
    pub fn new(
        config: HubConfig,
        registry: Arc<ConnectionRegistry>,
        authorizer: Arc<dyn RoomAuthorizer>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            registry,
            authorizer,
            directory,
            config,
        }
    }

    /// Whether `user_id` may take part in `room_id`, per the authorizer.
    ///
    /// Collaborator failures surface as internal errors.
    pub async fn authorize(&self, user_id: UserId, room_id: &RoomId) -> AppResult<bool> {
        self.authorizer
            .is_room_member(user_id, room_id)
            .await
            .map_err(|e| {
                error!(user_id = %user_id, room_id = %room_id, error = %e, "Room authorization failed");
                AppError::external(format!("Room authorization unavailable: {}", e.message))
            })
    }

    /// Joins a connection to a room.
    ///
    /// Acks `room:joined` to the joiner and, when the user was not already
    /// present, pushes `room:peer_joined` to the other members.
    pub async fn join(
        &self,
        handle: &Arc<ConnectionHandle>,
        room_id: &RoomId,
    ) -> AppResult<JoinOutcome> {
        if handle.in_room(room_id) {
            let online_user_ids = self.online_users(room_id);
            handle.send(OutboundMessage::RoomJoined {
                room_id: room_id.clone(),
                online_user_ids: online_user_ids.clone(),
            });
            return Ok(JoinOutcome {
                fresh: false,
                online_user_ids,
            });
        }

        if handle.room_count() >= self.config.max_rooms_per_connection {
            return Err(AppError::rate_limited(format!(
                "Maximum rooms per connection ({}) reached",
                self.config.max_rooms_per_connection
            )));
        }

        if !self.authorize(handle.user_id, room_id).await? {
            warn!(
                conn_id = %handle.id,
                user_id = %handle.user_id,
                room_id = %room_id,
                "Room join denied"
            );
            return Err(AppError::forbidden(format!(
                "Not a member of room '{room_id}'"
            )));
        }

        let (inserted, user_was_present) = {
            let room = self
                .rooms
                .entry(room_id.clone())
                .or_insert_with(|| Arc::new(Room::new(room_id.clone())));
            room.add(handle.id, handle.user_id)
        };
        handle.join_room(room_id);

        // A disconnect that raced the authorization await has already
        // snapshotted this connection's rooms; undo the insert.
        if !handle.is_alive() {
            handle.leave_room(room_id);
            self.remove_member(room_id, &handle.id);
            return Err(AppError::not_found("Connection is closed"));
        }

        let online_user_ids = self.online_users(room_id);
        handle.send(OutboundMessage::RoomJoined {
            room_id: room_id.clone(),
            online_user_ids: online_user_ids.clone(),
        });

        if inserted && !user_was_present {
            let info = self.display_info(handle.user_id).await;
            self.broadcast(
                room_id,
                Some(handle.id),
                Some(handle.user_id),
                &OutboundMessage::PeerJoined {
                    room_id: room_id.clone(),
                    user_id: handle.user_id,
                    display_name: info.as_ref().map(|i| i.display_name.clone()),
                    avatar_url: info.and_then(|i| i.avatar_url),
                },
            );
        }

        info!(
            conn_id = %handle.id,
            user_id = %handle.user_id,
            room_id = %room_id,
            "Joined room"
        );

        Ok(JoinOutcome {
            fresh: inserted,
            online_user_ids,
        })
    }

    /// Removes a connection from one room, acking `room:left`.
    pub fn leave(&self, handle: &ConnectionHandle, room_id: &RoomId) -> AppResult<LeaveOutcome> {
        if !handle.leave_room(room_id) {
            return Err(AppError::not_found(format!("Not joined to room '{room_id}'")));
        }
        let user_gone = self.depart(handle, room_id, LeaveReason::Left);
        handle.send(OutboundMessage::RoomLeft {
            room_id: room_id.clone(),
        });
        debug!(conn_id = %handle.id, room_id = %room_id, "Left room");
        Ok(LeaveOutcome {
            room_id: room_id.clone(),
            user_gone,
        })
    }

    /// Removes a connection from every room it joined. Used by the
    /// disconnect path; no acks are sent to the departing connection.
    pub fn leave_all(&self, handle: &ConnectionHandle) -> Vec<LeaveOutcome> {
        handle
            .rooms()
            .into_iter()
            .filter(|room_id| handle.leave_room(room_id))
            .map(|room_id| {
                let user_gone = self.depart(handle, &room_id, LeaveReason::Disconnected);
                LeaveOutcome { room_id, user_gone }
            })
            .collect()
    }

    /// Broadcasts to every live connection in the room except `except`.
    pub fn broadcast(
        &self,
        room_id: &RoomId,
        except: Option<ConnectionId>,
        sender: Option<UserId>,
        msg: &OutboundMessage,
    ) -> BroadcastOutcome {
        match self.get(room_id) {
            Some(room) => room.broadcast(&self.registry, except, sender, msg),
            None => BroadcastOutcome::default(),
        }
    }

    /// Looks up a live room.
    pub fn get(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.get(room_id).map(|r| Arc::clone(r.value()))
    }

    /// Users with a live connection in the room.
    pub fn online_users(&self, room_id: &RoomId) -> Vec<UserId> {
        self.get(room_id).map(|r| r.user_ids()).unwrap_or_default()
    }

    /// Returns total number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn depart(&self, handle: &ConnectionHandle, room_id: &RoomId, reason: LeaveReason) -> bool {
        let Some((user_id, still_present)) = self.remove_member(room_id, &handle.id) else {
            return false;
        };
        if still_present {
            return false;
        }
        self.broadcast(
            room_id,
            Some(handle.id),
            Some(user_id),
            &OutboundMessage::PeerLeft {
                room_id: room_id.clone(),
                user_id,
                reason,
            },
        );
        true
    }

    fn remove_member(&self, room_id: &RoomId, conn_id: &ConnectionId) -> Option<(UserId, bool)> {
        let removed = self.get(room_id)?.remove(conn_id);
        if self
            .rooms
            .remove_if(room_id, |_, room| room.is_empty())
            .is_some()
        {
            debug!(room_id = %room_id, "Room emptied and dropped");
        }
        removed
    }

    async fn display_info(&self, user_id: UserId) -> Option<UserDisplayInfo> {
        match self.directory.resolve_display_info(user_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Display info lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{StaticDirectory, StaticMembership};
    use crate::metrics::HubMetrics;
    use parley_core::error::ErrorKind;
    use tokio::sync::mpsc;

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        rooms: RoomManager,
        membership: Arc<StaticMembership>,
    }

    fn fixture() -> Fixture {
        let config = HubConfig {
            max_rooms_per_connection: 2,
            ..HubConfig::default()
        };
        let registry = Arc::new(ConnectionRegistry::new(
            config.clone(),
            Arc::new(HubMetrics::new()),
        ));
        let membership = Arc::new(StaticMembership::new());
        let directory = Arc::new(StaticDirectory::new());
        let rooms = RoomManager::new(
            config,
            Arc::clone(&registry),
            membership.clone(),
            directory,
        );
        Fixture {
            registry,
            rooms,
            membership,
        }
    }

    fn connect(
        f: &Fixture,
        user: UserId,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let reg = f.registry.register(user, "user".into());
        (reg.handle, reg.receiver)
    }

    fn room(id: &str) -> RoomId {
        RoomId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn test_non_member_forbidden() {
        let f = fixture();
        let (handle, _rx) = connect(&f, UserId::new());
        let err = f.rooms.join(&handle, &room("t1")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
        assert_eq!(f.rooms.room_count(), 0);
    }

    #[tokio::test]
    async fn test_join_is_idempotent_and_acks() {
        let f = fixture();
        let user = UserId::new();
        f.membership.grant(room("t1"), user);
        let (handle, mut rx) = connect(&f, user);

        assert!(f.rooms.join(&handle, &room("t1")).await.unwrap().fresh);
        assert!(!f.rooms.join(&handle, &room("t1")).await.unwrap().fresh);
        assert_eq!(rx.recv().await.unwrap().event_name(), "room:joined");
        assert_eq!(rx.recv().await.unwrap().event_name(), "room:joined");
        assert_eq!(f.rooms.get(&room("t1")).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_peer_joined_and_left_pushed() {
        let f = fixture();
        let (a, b) = (UserId::new(), UserId::new());
        f.membership.grant(room("t1"), a);
        f.membership.grant(room("t1"), b);
        let (ha, mut rxa) = connect(&f, a);
        let (hb, _rxb) = connect(&f, b);

        f.rooms.join(&ha, &room("t1")).await.unwrap();
        let _ = rxa.recv().await;
        f.rooms.join(&hb, &room("t1")).await.unwrap();
        match rxa.recv().await.unwrap() {
            OutboundMessage::PeerJoined { user_id, .. } => assert_eq!(user_id, b),
            other => panic!("unexpected {other:?}"),
        }

        let outcome = f.rooms.leave(&hb, &room("t1")).unwrap();
        assert!(outcome.user_gone);
        match rxa.recv().await.unwrap() {
            OutboundMessage::PeerLeft { user_id, reason, .. } => {
                assert_eq!(user_id, b);
                assert_eq!(reason, LeaveReason::Left);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_leave_unknown_room_not_found() {
        let f = fixture();
        let (handle, _rx) = connect(&f, UserId::new());
        let err = f.rooms.leave(&handle, &room("nope")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_room_cap_rate_limited() {
        let f = fixture();
        let user = UserId::new();
        for id in ["r1", "r2", "r3"] {
            f.membership.grant(room(id), user);
        }
        let (handle, _rx) = connect(&f, user);
        f.rooms.join(&handle, &room("r1")).await.unwrap();
        f.rooms.join(&handle, &room("r2")).await.unwrap();
        let err = f.rooms.join(&handle, &room("r3")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender_connection_only() {
        let f = fixture();
        let (a, b) = (UserId::new(), UserId::new());
        f.membership.grant(room("t1"), a);
        f.membership.grant(room("t1"), b);
        let (a1, _rx_a1) = connect(&f, a);
        let (a2, _rx_a2) = connect(&f, a);
        let (b1, _rx_b1) = connect(&f, b);
        for h in [&a1, &a2, &b1] {
            f.rooms.join(h, &room("t1")).await.unwrap();
        }

        let msg = OutboundMessage::TypingChanged {
            room_id: room("t1"),
            user_id: a,
            active: true,
        };
        let outcome = f.rooms.broadcast(&room("t1"), Some(a1.id), Some(a), &msg);
        assert_eq!(outcome.connections, 2);
        assert!(outcome.recipients.contains(&b));
        assert!(!outcome.recipients.contains(&a));
    }

    #[tokio::test]
    async fn test_leave_all_drops_empty_rooms() {
        let f = fixture();
        let user = UserId::new();
        f.membership.grant(room("r1"), user);
        f.membership.grant(room("r2"), user);
        let (handle, _rx) = connect(&f, user);
        f.rooms.join(&handle, &room("r1")).await.unwrap();
        f.rooms.join(&handle, &room("r2")).await.unwrap();

        let left = f.rooms.leave_all(&handle);
        assert_eq!(left.len(), 2);
        assert!(left.iter().all(|l| l.user_gone));
        assert_eq!(f.rooms.room_count(), 0);
        assert_eq!(handle.room_count(), 0);
    }
}

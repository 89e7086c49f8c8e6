//! Static membership, an in-memory persistence sink, and a static directory.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use parley_core::AppResult;
use parley_core::traits::{
    MessagePersister, PersistMessage, RoomAuthorizer, UserDirectory, UserDisplayInfo,
};
use parley_core::types::{RoomId, UserId};

/// Room membership from a fixed table.
#[derive(Debug, Default)]
pub struct StaticMembership {
    rooms: DashMap<RoomId, HashSet<UserId>>,
}

impl StaticMembership {
    /// Creates an empty table; every join is denied until granted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from `[backend.rooms]` configuration.
    pub fn from_config(rooms: &HashMap<String, Vec<Uuid>>) -> AppResult<Self> {
        let membership = Self::new();
        for (room, users) in rooms {
            let room_id = RoomId::parse(room.as_str())?;
            for user in users {
                membership.grant(room_id.clone(), UserId::from_uuid(*user));
            }
        }
        Ok(membership)
    }

    /// Adds a user to a room.
    pub fn grant(&self, room_id: RoomId, user_id: UserId) {
        self.rooms.entry(room_id).or_default().insert(user_id);
    }

    /// Removes a user from a room.
    pub fn revoke(&self, room_id: &RoomId, user_id: &UserId) {
        if let Some(mut members) = self.rooms.get_mut(room_id) {
            members.remove(user_id);
        }
    }
}

#[async_trait]
impl RoomAuthorizer for StaticMembership {
    async fn is_room_member(&self, user_id: UserId, room_id: &RoomId) -> AppResult<bool> {
        Ok(self
            .rooms
            .get(room_id)
            .is_some_and(|members| members.contains(&user_id)))
    }
}

/// Keeps the most recent persisted messages in memory.
#[derive(Debug)]
pub struct InMemoryPersister {
    messages: Mutex<VecDeque<PersistMessage>>,
    capacity: usize,
}

impl InMemoryPersister {
    /// Default number of retained messages.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// Creates a sink with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a sink that keeps at most `capacity` messages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Snapshot of retained messages, oldest first.
    pub fn messages(&self) -> Vec<PersistMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Number of retained messages.
    pub fn len(&self) -> usize {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing has been persisted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryPersister {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePersister for InMemoryPersister {
    async fn persist_message(&self, message: PersistMessage) -> AppResult<()> {
        debug!(message_id = %message.message_id, room_id = %message.room_id, "Persisting message in memory");
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        if messages.len() >= self.capacity {
            messages.pop_front();
        }
        messages.push_back(message);
        Ok(())
    }
}

/// Display info from a fixed table. Unknown users resolve to `None`.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: DashMap<UserId, UserDisplayInfo>,
}

impl StaticDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a user's display info.
    pub fn insert(&self, info: UserDisplayInfo) {
        self.users.insert(info.user_id, info);
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn resolve_display_info(&self, user_id: UserId) -> AppResult<Option<UserDisplayInfo>> {
        Ok(self.users.get(&user_id).map(|info| info.value().clone()))
    }
}

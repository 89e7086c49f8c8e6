//! Typing indicators with auto-expiry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::AbortHandle;
use tracing::debug;

use parley_core::types::{ConnectionId, RoomId, UserId};

use crate::message::types::OutboundMessage;
use crate::metrics::{HubMetrics, messages as msg_metrics};
use crate::room::RoomManager;

#[derive(Debug)]
struct TypingEntry {
    generation: u64,
    expiry: AbortHandle,
}

/// Tracks who is typing where and broadcasts `typing:changed` on every
/// state change, including expiry.
#[derive(Debug)]
pub struct TypingTracker {
    active: DashMap<(RoomId, UserId), TypingEntry>,
    next_generation: AtomicU64,
    timeout: Duration,
    rooms: Arc<RoomManager>,
    metrics: Arc<HubMetrics>,
}

impl TypingTracker {
    /// Creates a tracker whose indicators expire after `timeout`.
    pub fn new(timeout: Duration, rooms: Arc<RoomManager>, metrics: Arc<HubMetrics>) -> Self {
        Self {
            active: DashMap::new(),
            next_generation: AtomicU64::new(0),
            timeout,
            rooms,
            metrics,
        }
    }

    /// Marks the user as typing and (re)arms the expiry timer.
    /// Returns `true` if this changed the state.
    pub fn start(self: &Arc<Self>, room_id: &RoomId, user_id: UserId, origin: ConnectionId) -> bool {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let expiry = self.spawn_expiry(room_id.clone(), user_id, generation);
        let changed = match self.active.entry((room_id.clone(), user_id)) {
            Entry::Occupied(mut slot) => {
                slot.get().expiry.abort();
                slot.insert(TypingEntry { generation, expiry });
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(TypingEntry { generation, expiry });
                true
            }
        };
        if changed {
            self.announce(room_id, user_id, true, Some(origin));
        }
        changed
    }

    /// Clears the indicator and cancels its timer.
    /// Returns `true` if the user was typing.
    pub fn stop(&self, room_id: &RoomId, user_id: UserId, origin: Option<ConnectionId>) -> bool {
        match self.active.remove(&(room_id.clone(), user_id)) {
            Some((_, entry)) => {
                entry.expiry.abort();
                self.announce(room_id, user_id, false, origin);
                true
            }
            None => false,
        }
    }

    /// Whether the user is currently typing in the room.
    pub fn is_typing(&self, room_id: &RoomId, user_id: UserId) -> bool {
        self.active.contains_key(&(room_id.clone(), user_id))
    }

    /// Number of active indicators.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    fn spawn_expiry(self: &Arc<Self>, room_id: RoomId, user_id: UserId, generation: u64) -> AbortHandle {
        let tracker = Arc::downgrade(self);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(tracker) = tracker.upgrade() {
                tracker.expire(&room_id, user_id, generation);
            }
        })
        .abort_handle()
    }

    fn expire(&self, room_id: &RoomId, user_id: UserId, generation: u64) {
        let removed = self
            .active
            .remove_if(&(room_id.clone(), user_id), |_, entry| {
                entry.generation == generation
            })
            .is_some();
        if removed {
            debug!(room_id = %room_id, user_id = %user_id, "Typing indicator expired");
            self.announce(room_id, user_id, false, None);
        }
    }

    fn announce(&self, room_id: &RoomId, user_id: UserId, active: bool, origin: Option<ConnectionId>) {
        msg_metrics::record_typing(&self.metrics);
        self.rooms.broadcast(
            room_id,
            origin,
            Some(user_id),
            &OutboundMessage::TypingChanged {
                room_id: room_id.clone(),
                user_id,
                active,
            },
        );
    }
}

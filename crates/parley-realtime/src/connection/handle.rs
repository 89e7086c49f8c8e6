//! Individual WebSocket connection handle.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use parley_core::types::{ConnectionId, RoomId, UserId};

use crate::message::types::OutboundMessage;

/// Result of pushing an event onto a connection's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Queued for the writer task.
    Queued,
    /// The queue was full; the connection is now marked stalled.
    Stalled,
    /// The connection is already dead or its writer is gone.
    Closed,
}

/// A handle to a single WebSocket connection.
///
/// Holds the sender channel for pushing events to the client plus the
/// per-connection state the hub needs (joined rooms, liveness).
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// User who owns this connection
    pub user_id: UserId,
    /// Username (cached for display)
    pub username: String,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<OutboundMessage>,
    rooms: DashSet<RoomId>,
    last_heartbeat: Mutex<Instant>,
    alive: AtomicBool,
    stalled: AtomicBool,
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// Create a new connection handle
    pub fn new(user_id: UserId, username: String, sender: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            id: ConnectionId::new(),
            user_id,
            username,
            connected_at: Utc::now(),
            sender,
            rooms: DashSet::new(),
            last_heartbeat: Mutex::new(Instant::now()),
            alive: AtomicBool::new(true),
            stalled: AtomicBool::new(false),
            closed: CancellationToken::new(),
        }
    }

    /// Push an outbound event without waiting.
    ///
    /// A full queue marks the connection stalled and closes it; the
    /// transport task and the presence monitor finish the teardown.
    pub fn send(&self, msg: OutboundMessage) -> SendOutcome {
        if !self.is_alive() {
            return SendOutcome::Closed;
        }
        match self.sender.try_send(msg) {
            Ok(()) => SendOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(
                    conn_id = %self.id,
                    user_id = %self.user_id,
                    event = msg.event_name(),
                    "Outbound queue full, marking connection stalled"
                );
                self.stalled.store(true, Ordering::SeqCst);
                self.mark_dead();
                SendOutcome::Stalled
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                SendOutcome::Closed
            }
        }
    }

    /// Check if connection is alive
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Whether the connection was killed for a full outbound queue.
    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::SeqCst)
    }

    /// Mark connection as dead and signal its transport task to close.
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.closed.cancel();
    }

    /// Token cancelled when the hub wants the transport closed.
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Record client liveness (heartbeat event, ping frame, or any inbound frame).
    pub fn record_heartbeat(&self) {
        let mut last = self.last_heartbeat.lock().unwrap_or_else(|e| e.into_inner());
        *last = Instant::now();
    }

    /// Time since the last recorded heartbeat.
    pub fn silence(&self) -> Duration {
        let last = *self.last_heartbeat.lock().unwrap_or_else(|e| e.into_inner());
        last.elapsed()
    }

    /// Track a joined room. Returns `false` if already joined.
    pub fn join_room(&self, room_id: &RoomId) -> bool {
        self.rooms.insert(room_id.clone())
    }

    /// Forget a room. Returns `false` if it was not joined.
    pub fn leave_room(&self, room_id: &RoomId) -> bool {
        self.rooms.remove(room_id).is_some()
    }

    /// Whether this connection has joined the room.
    pub fn in_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains(room_id)
    }

    /// Rooms currently joined.
    pub fn rooms(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of rooms currently joined.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Get a snapshot of connection info
    pub fn info(&self) -> ConnectionInfo {
        let mut rooms = self.rooms();
        rooms.sort();
        ConnectionInfo {
            id: self.id,
            user_id: self.user_id,
            username: self.username.clone(),
            connected_at: self.connected_at,
            idle_seconds: self.silence().as_secs(),
            rooms,
            alive: self.is_alive(),
        }
    }
}

/// Snapshot of connection info (serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub username: String,
    pub connected_at: DateTime<Utc>,
    /// Seconds since the last heartbeat
    pub idle_seconds: u64,
    pub rooms: Vec<RoomId>,
    pub alive: bool,
}

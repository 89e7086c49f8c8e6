//! Conversation rooms — authorized membership and ordered broadcast.

pub mod manager;
pub mod room;

use serde::{Deserialize, Serialize};

pub use manager::{JoinOutcome, LeaveOutcome, RoomManager};
pub use room::{BroadcastOutcome, Room};

/// Why a user disappeared from a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeaveReason {
    /// Explicit `room:leave`.
    Left,
    /// The user's last connection in the room went away.
    Disconnected,
}

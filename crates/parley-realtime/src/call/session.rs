//! Call session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;

use parley_core::AppResult;
use parley_core::types::{CallId, ConnectionId, UserId};

use super::state::{CallEvent, CallState};

/// Unordered user pair; at most one live session per pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey(UserId, UserId);

impl PairKey {
    /// Builds the key with the smaller id first.
    pub fn new(a: UserId, b: UserId) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }
}

/// A call between two users.
#[derive(Debug)]
pub struct CallSession {
    pub id: CallId,
    pub caller_id: UserId,
    /// Connection that placed the call.
    pub caller_conn: ConnectionId,
    pub callee_id: UserId,
    pub state: CallState,
    /// Callee connection that answered.
    pub accepted_conn: Option<ConnectionId>,
    pub created_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
    ring_timer: Option<AbortHandle>,
}

impl CallSession {
    /// New session in `IDLE`.
    pub fn new(caller_id: UserId, caller_conn: ConnectionId, callee_id: UserId) -> Self {
        Self {
            id: CallId::new(),
            caller_id,
            caller_conn,
            callee_id,
            state: CallState::Idle,
            accepted_conn: None,
            created_at: Utc::now(),
            connected_at: None,
            ring_timer: None,
        }
    }

    /// Applies an event to the session state.
    pub fn transition(&mut self, event: CallEvent) -> AppResult<CallState> {
        self.state = self.state.apply(event)?;
        if self.state != CallState::Ringing {
            self.cancel_ring_timer();
        }
        Ok(self.state)
    }

    /// Stores the ring timer so it can be aborted on answer/reject/end.
    pub fn arm_ring_timer(&mut self, timer: AbortHandle) {
        self.cancel_ring_timer();
        self.ring_timer = Some(timer);
    }

    /// Aborts the ring timer, if armed.
    pub fn cancel_ring_timer(&mut self) {
        if let Some(timer) = self.ring_timer.take() {
            timer.abort();
        }
    }

    /// Whether the user is the caller or the callee.
    pub fn is_participant(&self, user_id: &UserId) -> bool {
        self.caller_id == *user_id || self.callee_id == *user_id
    }

    /// Serializable snapshot.
    pub fn info(&self) -> CallInfo {
        CallInfo {
            call_id: self.id,
            caller_id: self.caller_id,
            callee_id: self.callee_id,
            state: self.state,
            created_at: self.created_at,
            connected_at: self.connected_at,
        }
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        self.cancel_ring_timer();
    }
}

/// Snapshot of a live call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallInfo {
    pub call_id: CallId,
    pub caller_id: UserId,
    pub callee_id: UserId,
    pub state: CallState,
    pub created_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
}

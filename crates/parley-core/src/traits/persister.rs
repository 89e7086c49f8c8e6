//! Fire-and-forget message persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::AppResult;
use crate::types::{MessageId, RoomId, UserId};

/// A message accepted by the relay, handed to the history store.
///
/// Delivery is at-least-once; implementations must upsert keyed by
/// `(sender_id, nonce)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistMessage {
    /// Hub-assigned message id.
    pub message_id: MessageId,
    /// Conversation the message belongs to.
    pub room_id: RoomId,
    /// Author.
    pub sender_id: UserId,
    /// Message body.
    pub content: String,
    /// Client idempotency key.
    pub nonce: String,
    /// When the relay accepted the message.
    pub accepted_at: DateTime<Utc>,
}

/// Stores accepted chat messages.
#[async_trait]
pub trait MessagePersister: Send + Sync + std::fmt::Debug + 'static {
    /// Persist one accepted message.
    async fn persist_message(&self, message: PersistMessage) -> AppResult<()>;
}

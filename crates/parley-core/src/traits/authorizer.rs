//! Room membership authorization.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::{RoomId, UserId};

/// Decides whether a user belongs to a conversation.
///
/// Consulted on every room join and read receipt; a `false` answer is
/// surfaced to the client as `FORBIDDEN`, an `Err` as `INTERNAL_ERROR`.
#[async_trait]
pub trait RoomAuthorizer: Send + Sync + std::fmt::Debug + 'static {
    /// Returns whether `user_id` is a member of `room_id`.
    async fn is_room_member(&self, user_id: UserId, room_id: &RoomId) -> AppResult<bool>;
}

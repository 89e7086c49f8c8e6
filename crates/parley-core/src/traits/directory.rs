//! User display information lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;
use crate::types::UserId;

/// Presentation data attached to pushes for UI hydration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDisplayInfo {
    /// User id.
    pub user_id: UserId,
    /// Name to show next to messages and incoming calls.
    pub display_name: String,
    /// Optional avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Resolves display information. Never consulted for protocol decisions.
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug + 'static {
    /// Look up display info; `None` when the user is unknown.
    async fn resolve_display_info(&self, user_id: UserId) -> AppResult<Option<UserDisplayInfo>>;
}

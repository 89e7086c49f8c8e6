//! Presence tracker — online state derived from the connection registry.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use parley_core::types::{ConnectionId, UserId};

use crate::connection::ConnectionRegistry;

/// Why a connection is due for teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryCause {
    /// Outbound queue overflowed.
    Stalled,
    /// Marked dead by the transport or an eviction.
    Closed,
    /// No heartbeat within the miss limit.
    HeartbeatTimeout,
}

/// A connection the monitor should disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredConnection {
    pub conn_id: ConnectionId,
    pub user_id: UserId,
    pub cause: ExpiryCause,
}

/// Point-in-time presence counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub online_users: usize,
    pub connections: usize,
}

/// Answers presence queries. A user is online iff at least one of their
/// connections is alive.
#[derive(Debug)]
pub struct PresenceTracker {
    registry: Arc<ConnectionRegistry>,
    heartbeat_timeout: Duration,
}

impl PresenceTracker {
    /// Creates a tracker over the registry.
    pub fn new(registry: Arc<ConnectionRegistry>, heartbeat_timeout: Duration) -> Self {
        Self {
            registry,
            heartbeat_timeout,
        }
    }

    /// Whether the user has a live connection.
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.registry.is_user_online(user_id)
    }

    /// All online users, sorted.
    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self
            .registry
            .connected_user_ids()
            .into_iter()
            .filter(|user| self.registry.is_user_online(user))
            .collect();
        users.sort();
        users
    }

    /// Counts for the health endpoint.
    pub fn snapshot(&self) -> PresenceSnapshot {
        PresenceSnapshot {
            online_users: self.online_users().len(),
            connections: self.registry.connection_count(),
        }
    }

    /// Connections that are dead, stalled, or silent past the miss limit.
    pub fn expired(&self) -> Vec<ExpiredConnection> {
        self.registry
            .all_connections()
            .into_iter()
            .filter_map(|conn| {
                let cause = if conn.is_stalled() {
                    ExpiryCause::Stalled
                } else if !conn.is_alive() {
                    ExpiryCause::Closed
                } else if conn.silence() > self.heartbeat_timeout {
                    ExpiryCause::HeartbeatTimeout
                } else {
                    return None;
                };
                Some(ExpiredConnection {
                    conn_id: conn.id,
                    user_id: conn.user_id,
                    cause,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::HubMetrics;
    use parley_core::config::HubConfig;

    fn tracker() -> (Arc<ConnectionRegistry>, PresenceTracker) {
        let registry = Arc::new(ConnectionRegistry::new(
            HubConfig::default(),
            Arc::new(HubMetrics::new()),
        ));
        let tracker = PresenceTracker::new(Arc::clone(&registry), Duration::from_secs(60));
        (registry, tracker)
    }

    #[tokio::test]
    async fn test_online_derived_from_connections() {
        let (registry, tracker) = tracker();
        let user = UserId::new();
        assert!(!tracker.is_online(&user));
        let reg = registry.register(user, "alice".into());
        assert!(tracker.is_online(&user));
        assert_eq!(tracker.online_users(), vec![user]);

        reg.handle.mark_dead();
        assert!(!tracker.is_online(&user));
        assert_eq!(tracker.snapshot().online_users, 0);
        assert_eq!(tracker.snapshot().connections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_connection_expires() {
        let (registry, tracker) = tracker();
        let quiet = registry.register(UserId::new(), "quiet".into());
        let chatty = registry.register(UserId::new(), "chatty".into());

        tokio::time::advance(Duration::from_secs(61)).await;
        chatty.handle.record_heartbeat();

        let expired = tracker.expired();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].conn_id, quiet.handle.id);
        assert_eq!(expired[0].cause, ExpiryCause::HeartbeatTimeout);
    }

    #[tokio::test]
    async fn test_dead_connection_expires_immediately() {
        let (registry, tracker) = tracker();
        let reg = registry.register(UserId::new(), "gone".into());
        reg.handle.mark_dead();
        assert_eq!(tracker.expired()[0].cause, ExpiryCause::Closed);
    }
}

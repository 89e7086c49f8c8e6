//! Connection registry — user → live connections, targeted delivery.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use parley_core::config::HubConfig;
use parley_core::types::{ConnectionId, UserId};

use crate::message::types::OutboundMessage;
use crate::metrics::{HubMetrics, connections as conn_metrics};

use super::handle::{ConnectionHandle, SendOutcome};
use super::pool::ConnectionPool;

/// A freshly registered connection.
#[derive(Debug)]
pub struct Registration {
    /// Handle shared with the hub.
    pub handle: Arc<ConnectionHandle>,
    /// Outbound queue drained by the transport writer.
    pub receiver: mpsc::Receiver<OutboundMessage>,
    /// Connections pushed out by the per-user cap. The caller must run
    /// them through the disconnect path.
    pub evicted: Vec<Arc<ConnectionHandle>>,
}

/// Tracks every live connection and delivers events to users or single
/// connections.
#[derive(Debug)]
pub struct ConnectionRegistry {
    pool: ConnectionPool,
    metrics: Arc<HubMetrics>,
    config: HubConfig,
}

impl ConnectionRegistry {
    /// Creates a new registry.
    pub fn new(config: HubConfig, metrics: Arc<HubMetrics>) -> Self {
        Self {
            pool: ConnectionPool::new(),
            metrics,
            config,
        }
    }

    /// Registers a new authenticated connection.
    ///
    /// Beyond `max_connections_per_user` the oldest connections are marked
    /// dead and returned in [`Registration::evicted`].
    pub fn register(&self, user_id: UserId, username: String) -> Registration {
        let (tx, rx) = mpsc::channel(self.config.outbound_buffer_size);
        let handle = Arc::new(ConnectionHandle::new(user_id, username, tx));

        let cap = self.config.max_connections_per_user;
        let evicted = self
            .pool
            .add_capped(Arc::clone(&handle), cap)
            .unwrap_or_default();
        conn_metrics::record_connect(&self.metrics);
        info!(conn_id = %handle.id, user_id = %user_id, "Connection registered");

        for oldest in &evicted {
            warn!(
                conn_id = %oldest.id,
                user_id = %user_id,
                max = cap,
                "User at max connections, evicting oldest"
            );
            conn_metrics::record_evicted(&self.metrics);
        }

        Registration {
            handle,
            receiver: rx,
            evicted,
        }
    }

    /// Adds an existing handle to the registry. Re-attaching a handle that
    /// is already registered is a no-op returning the same id.
    pub fn attach(&self, handle: Arc<ConnectionHandle>) -> ConnectionId {
        let conn_id = handle.id;
        let user_id = handle.user_id;
        if self.pool.add(handle) {
            conn_metrics::record_connect(&self.metrics);
            info!(conn_id = %conn_id, user_id = %user_id, "Connection registered");
        }
        conn_id
    }

    /// Removes a connection from the registry and marks it dead.
    pub fn unregister(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let handle = self.pool.remove(conn_id)?;
        handle.mark_dead();
        conn_metrics::record_disconnect(&self.metrics);
        info!(
            conn_id = %conn_id,
            user_id = %handle.user_id,
            "Connection unregistered"
        );
        Some(handle)
    }

    /// Sends an event to every live connection of a user. Returns the
    /// number of connections it was queued on.
    pub fn send_to_user(&self, user_id: &UserId, msg: &OutboundMessage) -> usize {
        self.send_to_user_except(user_id, None, msg)
    }

    /// Like [`send_to_user`](Self::send_to_user), skipping one connection.
    pub fn send_to_user_except(
        &self,
        user_id: &UserId,
        except: Option<ConnectionId>,
        msg: &OutboundMessage,
    ) -> usize {
        self.pool
            .get_user_connections(user_id)
            .iter()
            .filter(|conn| Some(conn.id) != except)
            .filter(|conn| conn.send(msg.clone()) == SendOutcome::Queued)
            .count()
    }

    /// Sends an event to a single connection.
    pub fn send_to_connection(&self, conn_id: &ConnectionId, msg: OutboundMessage) -> bool {
        match self.pool.get(conn_id) {
            Some(conn) => conn.send(msg) == SendOutcome::Queued,
            None => {
                debug!(conn_id = %conn_id, event = msg.event_name(), "Send to unknown connection dropped");
                false
            }
        }
    }

    /// Looks up a connection.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.pool.get(conn_id)
    }

    /// Live connections of a user, oldest first.
    pub fn user_connections(&self, user_id: &UserId) -> Vec<Arc<ConnectionHandle>> {
        self.pool
            .get_user_connections(user_id)
            .into_iter()
            .filter(|conn| conn.is_alive())
            .collect()
    }

    /// Whether a user has at least one live connection.
    pub fn is_user_online(&self, user_id: &UserId) -> bool {
        self.pool
            .get_user_connections(user_id)
            .iter()
            .any(|conn| conn.is_alive())
    }

    /// All registered connections, including ones awaiting teardown.
    pub fn all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.pool.all_connections()
    }

    /// Users with at least one registered connection.
    pub fn connected_user_ids(&self) -> Vec<UserId> {
        self.pool.connected_user_ids()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.pool.connection_count()
    }

    /// Number of distinct registered users.
    pub fn user_count(&self) -> usize {
        self.pool.user_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn registry(max_per_user: usize) -> ConnectionRegistry {
        let config = HubConfig {
            max_connections_per_user: max_per_user,
            outbound_buffer_size: 8,
            ..HubConfig::default()
        };
        ConnectionRegistry::new(config, Arc::new(HubMetrics::new()))
    }

    fn ack() -> OutboundMessage {
        OutboundMessage::HeartbeatAck {
            server_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_send_to_user_fans_out_to_all_devices() {
        let registry = registry(5);
        let user = UserId::new();
        let mut a = registry.register(user, "alice".into());
        let mut b = registry.register(user, "alice".into());

        assert_eq!(registry.send_to_user(&user, &ack()), 2);
        assert!(a.receiver.recv().await.is_some());
        assert!(b.receiver.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_offline_user_is_noop() {
        let registry = registry(5);
        assert_eq!(registry.send_to_user(&UserId::new(), &ack()), 0);
        assert!(!registry.send_to_connection(&ConnectionId::new(), ack()));
    }

    #[tokio::test]
    async fn test_attach_is_idempotent() {
        let registry = registry(5);
        let reg = registry.register(UserId::new(), "alice".into());
        let id = registry.attach(Arc::clone(&reg.handle));
        assert_eq!(id, reg.handle.id);
        assert_eq!(registry.connection_count(), 1);
        assert_eq!(registry.user_connections(&reg.handle.user_id).len(), 1);
    }

    #[tokio::test]
    async fn test_cap_evicts_oldest() {
        let registry = registry(2);
        let user = UserId::new();
        let first = registry.register(user, "alice".into());
        let _second = registry.register(user, "alice".into());
        let third = registry.register(user, "alice".into());

        assert_eq!(third.evicted.len(), 1);
        assert_eq!(third.evicted[0].id, first.handle.id);
        assert!(!first.handle.is_alive());
        assert!(first.handle.close_token().is_cancelled());
    }

    #[test]
    fn test_concurrent_registrations_respect_cap() {
        let registry = registry(2);
        let user = UserId::new();

        let registrations: Vec<Registration> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let registry = &registry;
                    scope.spawn(move || registry.register(user, "alice".into()))
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        let evicted: usize = registrations.iter().map(|r| r.evicted.len()).sum();
        assert_eq!(registry.user_connections(&user).len(), 2);
        assert_eq!(evicted, 6);
    }

    #[tokio::test]
    async fn test_unregister_marks_dead() {
        let registry = registry(5);
        let user = UserId::new();
        let reg = registry.register(user, "alice".into());
        assert!(registry.is_user_online(&user));

        let removed = registry.unregister(&reg.handle.id).unwrap();
        assert!(!removed.is_alive());
        assert!(!registry.is_user_online(&user));
        assert!(registry.unregister(&reg.handle.id).is_none());
    }
}

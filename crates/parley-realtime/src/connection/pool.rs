//! Connection pool — tracks all active connections indexed by user ID.

use std::sync::Arc;

use dashmap::DashMap;

use parley_core::types::{ConnectionId, UserId};

use super::handle::ConnectionHandle;

/// Thread-safe pool of all active WebSocket connections.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    /// User ID → connection handles in registration order (multi-device).
    by_user: DashMap<UserId, Vec<Arc<ConnectionHandle>>>,
    /// Connection ID → connection handle for direct lookup.
    by_id: DashMap<ConnectionId, Arc<ConnectionHandle>>,
}

impl ConnectionPool {
    /// Creates a new empty connection pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to the pool. Returns `false` if it was already present.
    pub fn add(&self, handle: Arc<ConnectionHandle>) -> bool {
        self.add_capped(handle, 0).is_some()
    }

    /// Adds a connection while keeping at most `cap` live connections for
    /// its user (`0` is unlimited). The oldest live connections past the
    /// cap are marked dead and returned; they stay indexed until removed.
    ///
    /// Counting and inserting happen under the user's entry lock, so
    /// concurrent handshakes cannot overshoot the cap. Returns `None` if
    /// the handle was already present.
    pub fn add_capped(
        &self,
        handle: Arc<ConnectionHandle>,
        cap: usize,
    ) -> Option<Vec<Arc<ConnectionHandle>>> {
        let mut connections = self.by_user.entry(handle.user_id).or_default();
        if connections.iter().any(|c| c.id == handle.id) {
            return None;
        }

        let mut evicted = Vec::new();
        if cap > 0 {
            let live: Vec<&Arc<ConnectionHandle>> =
                connections.iter().filter(|c| c.is_alive()).collect();
            let excess = (live.len() + 1).saturating_sub(cap);
            for oldest in live.into_iter().take(excess) {
                oldest.mark_dead();
                evicted.push(Arc::clone(oldest));
            }
        }

        self.by_id.insert(handle.id, Arc::clone(&handle));
        connections.push(handle);
        Some(evicted)
    }

    /// Removes a connection from the pool.
    pub fn remove(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let (_, handle) = self.by_id.remove(conn_id)?;
        if let Some(mut connections) = self.by_user.get_mut(&handle.user_id) {
            connections.retain(|c| c.id != *conn_id);
        }
        self.by_user
            .remove_if(&handle.user_id, |_, connections| connections.is_empty());
        Some(handle)
    }

    /// Gets all connections for a user, oldest first.
    pub fn get_user_connections(&self, user_id: &UserId) -> Vec<Arc<ConnectionHandle>> {
        self.by_user
            .get(user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Gets a specific connection by ID.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.by_id.get(conn_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns total number of active connections.
    pub fn connection_count(&self) -> usize {
        self.by_id.len()
    }

    /// Returns number of unique connected users.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    /// Returns all connection handles.
    pub fn all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.by_id
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Returns all connected user IDs.
    pub fn connected_user_ids(&self) -> Vec<UserId> {
        self.by_user.iter().map(|entry| *entry.key()).collect()
    }
}

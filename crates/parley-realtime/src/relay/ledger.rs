//! Transient message ledger: nonce idempotency and per-recipient status.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::OnceCell;
use tokio::time::Instant;

use parley_core::types::{ConnectionId, MessageId, RoomId, UserId};

use super::status::DeliveryStatus;

/// The ack returned for a `message:send`, and replayed for duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAck {
    pub message_id: MessageId,
    pub nonce: String,
    pub status: DeliveryStatus,
}

/// An accepted chat message, kept until its TTL runs out.
#[derive(Debug)]
pub struct MessageRecord {
    pub message_id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    /// Connection that posted it; excluded from the broadcast.
    pub origin_conn: ConnectionId,
    pub content: String,
    pub nonce: String,
    pub accepted_at: DateTime<Utc>,
    created: Instant,
    statuses: Mutex<HashMap<UserId, DeliveryStatus>>,
    ack: OnceCell<MessageAck>,
}

impl MessageRecord {
    /// Creates a record for a message that has passed validation.
    pub fn new(
        room_id: RoomId,
        sender_id: UserId,
        origin_conn: ConnectionId,
        content: String,
        nonce: String,
    ) -> Self {
        Self {
            message_id: MessageId::new(),
            room_id,
            sender_id,
            origin_conn,
            content,
            nonce,
            accepted_at: Utc::now(),
            created: Instant::now(),
            statuses: Mutex::new(HashMap::new()),
            ack: OnceCell::new(),
        }
    }

    /// Runs `deliver` exactly once across all callers and returns its ack.
    ///
    /// Concurrent duplicates wait for the first delivery to finish.
    pub async fn accept_once<F, Fut>(&self, deliver: F) -> MessageAck
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MessageAck>,
    {
        self.ack.get_or_init(deliver).await.clone()
    }

    /// Advances a recipient's status. Returns `true` if it changed.
    pub fn advance(&self, user_id: UserId, status: DeliveryStatus) -> bool {
        let mut statuses = self.statuses.lock().unwrap_or_else(|e| e.into_inner());
        let current = statuses.entry(user_id).or_insert(DeliveryStatus::Sent);
        let next = current.advance(status);
        let changed = next != *current;
        *current = next;
        changed
    }

    /// Current status for a recipient, if one was recorded.
    pub fn status_of(&self, user_id: &UserId) -> Option<DeliveryStatus> {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .copied()
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created.elapsed() >= ttl
    }
}

/// Ledger keyed by `(sender, nonce)` with a secondary index by message id.
#[derive(Debug)]
pub struct MessageLedger {
    by_nonce: DashMap<(UserId, String), Arc<MessageRecord>>,
    by_id: DashMap<MessageId, Arc<MessageRecord>>,
    ttl: Duration,
}

impl MessageLedger {
    /// Creates a ledger whose records live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            by_nonce: DashMap::new(),
            by_id: DashMap::new(),
            ttl,
        }
    }

    /// Existing record for a sender's nonce.
    pub fn get(&self, sender_id: UserId, nonce: &str) -> Option<Arc<MessageRecord>> {
        self.by_nonce
            .get(&(sender_id, nonce.to_string()))
            .map(|r| Arc::clone(r.value()))
    }

    /// Returns the record for `(sender, nonce)`, inserting `make()` if none
    /// exists. The flag is `true` when the record was inserted by this call.
    pub fn get_or_insert(
        &self,
        sender_id: UserId,
        nonce: &str,
        make: impl FnOnce() -> MessageRecord,
    ) -> (Arc<MessageRecord>, bool) {
        let (record, fresh) = match self.by_nonce.entry((sender_id, nonce.to_string())) {
            Entry::Occupied(existing) => (Arc::clone(existing.get()), false),
            Entry::Vacant(slot) => {
                let record = Arc::new(make());
                slot.insert(Arc::clone(&record));
                (record, true)
            }
        };
        if fresh {
            self.by_id.insert(record.message_id, Arc::clone(&record));
        }
        (record, fresh)
    }

    /// Looks up a record by hub-assigned id.
    pub fn find(&self, message_id: &MessageId) -> Option<Arc<MessageRecord>> {
        self.by_id.get(message_id).map(|r| Arc::clone(r.value()))
    }

    /// Drops records older than the TTL. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let before = self.by_nonce.len();
        self.by_nonce.retain(|_, record| !record.is_expired(self.ttl));
        self.by_id.retain(|_, record| !record.is_expired(self.ttl));
        before.saturating_sub(self.by_nonce.len())
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.by_nonce.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.by_nonce.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sender: UserId, nonce: &str) -> MessageRecord {
        MessageRecord::new(
            RoomId::parse("t1").unwrap(),
            sender,
            ConnectionId::new(),
            "hi".into(),
            nonce.into(),
        )
    }

    #[test]
    fn test_get_or_insert_returns_existing() {
        let ledger = MessageLedger::new(Duration::from_secs(60));
        let sender = UserId::new();
        let (first, fresh) = ledger.get_or_insert(sender, "n1", || record(sender, "n1"));
        assert!(fresh);
        let (second, fresh) = ledger.get_or_insert(sender, "n1", || record(sender, "n1"));
        assert!(!fresh);
        assert_eq!(first.message_id, second.message_id);
        assert!(ledger.find(&first.message_id).is_some());
    }

    #[test]
    fn test_nonce_scoped_per_sender() {
        let ledger = MessageLedger::new(Duration::from_secs(60));
        let (a, b) = (UserId::new(), UserId::new());
        ledger.get_or_insert(a, "n1", || record(a, "n1"));
        let (_, fresh) = ledger.get_or_insert(b, "n1", || record(b, "n1"));
        assert!(fresh);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_status_is_monotonic() {
        let sender = UserId::new();
        let reader = UserId::new();
        let rec = record(sender, "n1");
        assert!(rec.advance(reader, DeliveryStatus::Delivered));
        assert!(rec.advance(reader, DeliveryStatus::Seen));
        assert!(!rec.advance(reader, DeliveryStatus::Seen));
        assert!(!rec.advance(reader, DeliveryStatus::Delivered));
        assert_eq!(rec.status_of(&reader), Some(DeliveryStatus::Seen));
    }

    #[tokio::test]
    async fn test_accept_once_runs_delivery_once() {
        let sender = UserId::new();
        let rec = record(sender, "n1");
        let mut runs = 0;
        let ack = rec
            .accept_once(|| {
                runs += 1;
                async {
                    MessageAck {
                        message_id: rec.message_id,
                        nonce: "n1".into(),
                        status: DeliveryStatus::Sent,
                    }
                }
            })
            .await;
        let replay = rec
            .accept_once(|| async { panic!("delivered twice") })
            .await;
        assert_eq!(runs, 1);
        assert_eq!(ack, replay);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_expired() {
        let ledger = MessageLedger::new(Duration::from_secs(10));
        let sender = UserId::new();
        let (rec, _) = ledger.get_or_insert(sender, "n1", || record(sender, "n1"));
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(ledger.evict_expired(), 1);
        assert!(ledger.find(&rec.message_id).is_none());
        assert!(ledger.is_empty());
    }
}

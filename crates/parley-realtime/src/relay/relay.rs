//! Message relay — validates chat events, fans them out, tracks status.

use std::sync::Arc;

use tracing::{debug, error, info};

use parley_core::config::HubConfig;
use parley_core::traits::{MessagePersister, PersistMessage};
use parley_core::types::{MessageId, RoomId, UserId};
use parley_core::{AppError, AppResult};

use crate::connection::{ConnectionHandle, ConnectionRegistry};
use crate::message::types::OutboundMessage;
use crate::message::validator::{validate_content, validate_nonce};
use crate::metrics::{HubMetrics, messages as msg_metrics};
use crate::room::RoomManager;

use super::ledger::{MessageAck, MessageLedger, MessageRecord};
use super::rate_limit::RateLimiter;
use super::status::DeliveryStatus;
use super::typing::TypingTracker;

/// Relays chat messages, typing indicators, and read receipts.
#[derive(Debug)]
pub struct MessageRelay {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomManager>,
    ledger: MessageLedger,
    typing: Arc<TypingTracker>,
    message_limiter: RateLimiter,
    typing_limiter: RateLimiter,
    persister: Arc<dyn MessagePersister>,
    metrics: Arc<HubMetrics>,
    max_message_bytes: usize,
}

impl MessageRelay {
    /// Creates a new relay.
    pub fn new(
        config: &HubConfig,
        registry: Arc<ConnectionRegistry>,
        rooms: Arc<RoomManager>,
        persister: Arc<dyn MessagePersister>,
        metrics: Arc<HubMetrics>,
    ) -> Self {
        let typing = Arc::new(TypingTracker::new(
            config.typing_timeout(),
            Arc::clone(&rooms),
            Arc::clone(&metrics),
        ));
        Self {
            registry,
            rooms,
            ledger: MessageLedger::new(config.ledger_ttl()),
            typing,
            message_limiter: RateLimiter::new(config.message_rate),
            typing_limiter: RateLimiter::new(config.typing_rate),
            persister,
            metrics,
            max_message_bytes: config.max_message_bytes,
        }
    }

    /// Accepts a chat message from a connection and fans it out to the room.
    ///
    /// A repeated `(sender, nonce)` returns the first ack without
    /// re-broadcasting or re-persisting.
    pub async fn post_message(
        &self,
        handle: &ConnectionHandle,
        room_id: &RoomId,
        content: String,
        nonce: String,
    ) -> AppResult<MessageAck> {
        validate_nonce(&nonce)?;

        if let Some(existing) = self.ledger.get(handle.user_id, &nonce) {
            return Ok(self.replay(&existing).await);
        }

        validate_content(&content, self.max_message_bytes)?;

        if !handle.in_room(room_id) {
            return Err(AppError::forbidden(format!(
                "Join room '{room_id}' before posting"
            )));
        }

        if !self.message_limiter.check(&handle.id) {
            return Err(AppError::rate_limited("Too many messages"));
        }

        let (record, fresh) = self.ledger.get_or_insert(handle.user_id, &nonce, || {
            MessageRecord::new(room_id.clone(), handle.user_id, handle.id, content, nonce.clone())
        });
        if !fresh {
            return Ok(self.replay(&record).await);
        }

        Ok(record.accept_once(|| async { self.deliver(&record) }).await)
    }

    async fn replay(&self, record: &Arc<MessageRecord>) -> MessageAck {
        msg_metrics::record_deduplicated(&self.metrics);
        debug!(
            message_id = %record.message_id,
            nonce = %record.nonce,
            "Duplicate nonce, replaying ack"
        );
        record.accept_once(|| async { self.deliver(record) }).await
    }

    fn deliver(&self, record: &Arc<MessageRecord>) -> MessageAck {
        let outcome = self.rooms.broadcast(
            &record.room_id,
            Some(record.origin_conn),
            Some(record.sender_id),
            &OutboundMessage::MessageReceived {
                message_id: record.message_id,
                room_id: record.room_id.clone(),
                sender_id: record.sender_id,
                content: record.content.clone(),
                nonce: record.nonce.clone(),
                sent_at: record.accepted_at,
            },
        );

        for user_id in &outcome.recipients {
            record.advance(*user_id, DeliveryStatus::Delivered);
        }
        let status = if outcome.reached_recipient() {
            DeliveryStatus::Delivered
        } else {
            DeliveryStatus::Sent
        };

        msg_metrics::record_relayed(&self.metrics);
        info!(
            message_id = %record.message_id,
            room_id = %record.room_id,
            sender_id = %record.sender_id,
            connections = outcome.connections,
            status = %status,
            "Message relayed"
        );

        self.spawn_persist(record);

        MessageAck {
            message_id: record.message_id,
            nonce: record.nonce.clone(),
            status,
        }
    }

    fn spawn_persist(&self, record: &MessageRecord) {
        let persister = Arc::clone(&self.persister);
        let metrics = Arc::clone(&self.metrics);
        let message = PersistMessage {
            message_id: record.message_id,
            room_id: record.room_id.clone(),
            sender_id: record.sender_id,
            content: record.content.clone(),
            nonce: record.nonce.clone(),
            accepted_at: record.accepted_at,
        };
        tokio::spawn(async move {
            let message_id = message.message_id;
            if let Err(e) = persister.persist_message(message).await {
                msg_metrics::record_persist_failure(&metrics);
                error!(message_id = %message_id, error = %e, "Failed to persist message");
            }
        });
    }

    /// Records a read receipt and notifies every connection of the sender.
    /// Returns `true` if the status advanced.
    pub async fn mark_seen(&self, handle: &ConnectionHandle, message_id: &MessageId) -> AppResult<bool> {
        let record = self
            .ledger
            .find(message_id)
            .ok_or_else(|| AppError::not_found(format!("Message {message_id} not found")))?;

        if record.sender_id == handle.user_id {
            return Err(AppError::forbidden("Cannot mark your own message as seen"));
        }

        if !handle.in_room(&record.room_id)
            && !self.rooms.authorize(handle.user_id, &record.room_id).await?
        {
            return Err(AppError::forbidden(format!(
                "Not a member of room '{}'",
                record.room_id
            )));
        }

        if !record.advance(handle.user_id, DeliveryStatus::Seen) {
            return Ok(false);
        }

        msg_metrics::record_receipt(&self.metrics);
        self.registry.send_to_user(
            &record.sender_id,
            &OutboundMessage::MessageStatus {
                message_id: record.message_id,
                room_id: record.room_id.clone(),
                nonce: record.nonce.clone(),
                user_id: handle.user_id,
                status: DeliveryStatus::Seen,
            },
        );
        debug!(message_id = %message_id, reader = %handle.user_id, "Message seen");
        Ok(true)
    }

    /// Starts or stops the user's typing indicator in a room.
    /// Returns `true` if the state changed.
    pub fn set_typing(&self, handle: &ConnectionHandle, room_id: &RoomId, active: bool) -> AppResult<bool> {
        if !handle.in_room(room_id) {
            return Err(AppError::forbidden(format!(
                "Join room '{room_id}' before typing"
            )));
        }
        if !self.typing_limiter.check(&handle.id) {
            return Err(AppError::rate_limited("Too many typing events"));
        }
        Ok(if active {
            self.typing.start(room_id, handle.user_id, handle.id)
        } else {
            self.typing.stop(room_id, handle.user_id, Some(handle.id))
        })
    }

    /// Clears a typing indicator for a user who left the room.
    pub fn clear_typing(&self, room_id: &RoomId, user_id: UserId) -> bool {
        self.typing.stop(room_id, user_id, None)
    }

    /// Whether the user is currently shown as typing.
    pub fn is_typing(&self, room_id: &RoomId, user_id: UserId) -> bool {
        self.typing.is_typing(room_id, user_id)
    }

    /// Drops per-connection limiter state.
    pub fn forget_connection(&self, handle: &ConnectionHandle) {
        self.message_limiter.forget(&handle.id);
        self.typing_limiter.forget(&handle.id);
    }

    /// Evicts ledger entries older than the TTL.
    pub fn evict_expired(&self) -> usize {
        self.ledger.evict_expired()
    }

    /// Number of messages held for idempotency and receipts.
    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    /// Number of active typing indicators.
    pub fn typing_count(&self) -> usize {
        self.typing.active_count()
    }
}

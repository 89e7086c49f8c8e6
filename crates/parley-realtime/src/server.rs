//! Top-level hub engine that ties together all subsystems.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use parley_core::config::HubConfig;
use parley_core::traits::{MessagePersister, RoomAuthorizer, UserDirectory};
use parley_core::types::{ConnectionId, RoomId, UserId};
use parley_core::{AppError, AppResult};

use crate::call::CallSignaling;
use crate::connection::{ConnectionHandle, ConnectionRegistry, Registration};
use crate::message::serializer::deserialize_inbound;
use crate::message::types::{InboundMessage, OutboundMessage};
use crate::metrics::{HubMetrics, MetricsSnapshot, connections as conn_metrics};
use crate::presence::{ExpiryCause, PresenceTracker, run_monitor};
use crate::relay::MessageRelay;
use crate::room::RoomManager;

/// External collaborators the hub consumes.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub authorizer: Arc<dyn RoomAuthorizer>,
    pub persister: Arc<dyn MessagePersister>,
    pub directory: Arc<dyn UserDirectory>,
}

/// Outcome of one presence sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections disconnected.
    pub reaped: usize,
    /// Ledger entries evicted.
    pub evicted_messages: usize,
}

/// Hub-wide counts for the detailed health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubStats {
    pub connections: usize,
    pub online_users: usize,
    pub rooms: usize,
    pub active_calls: usize,
    pub ledger_messages: usize,
    pub typing_indicators: usize,
    pub counters: MetricsSnapshot,
}

/// Central hub that owns every subsystem and routes inbound events.
pub struct HubEngine {
    /// Connection registry.
    pub connections: Arc<ConnectionRegistry>,
    /// Room manager.
    pub rooms: Arc<RoomManager>,
    /// Chat relay.
    pub relay: Arc<MessageRelay>,
    /// Call signaling table.
    pub calls: Arc<CallSignaling>,
    /// Presence queries.
    pub presence: Arc<PresenceTracker>,
    /// Metrics collector.
    pub metrics: Arc<HubMetrics>,
    config: HubConfig,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for HubEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubEngine")
            .field("connections", &self.connections.connection_count())
            .field("rooms", &self.rooms.room_count())
            .field("calls", &self.calls.call_count())
            .finish_non_exhaustive()
    }
}

impl HubEngine {
    /// Creates a new hub with all subsystems.
    pub fn new(config: HubConfig, collaborators: Collaborators) -> Self {
        let metrics = Arc::new(HubMetrics::new());
        let connections = Arc::new(ConnectionRegistry::new(config.clone(), Arc::clone(&metrics)));
        let rooms = Arc::new(RoomManager::new(
            config.clone(),
            Arc::clone(&connections),
            collaborators.authorizer,
            Arc::clone(&collaborators.directory),
        ));
        let relay = Arc::new(MessageRelay::new(
            &config,
            Arc::clone(&connections),
            Arc::clone(&rooms),
            collaborators.persister,
            Arc::clone(&metrics),
        ));
        let calls = Arc::new(CallSignaling::new(
            config.ring_timeout(),
            Arc::clone(&connections),
            collaborators.directory,
            Arc::clone(&metrics),
        ));
        let presence = Arc::new(PresenceTracker::new(
            Arc::clone(&connections),
            config.heartbeat_timeout(),
        ));

        info!("Hub engine initialized");

        Self {
            connections,
            rooms,
            relay,
            calls,
            presence,
            metrics,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Hub configuration.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Registers an authenticated connection. Connections evicted by the
    /// per-user cap are disconnected before this returns.
    pub fn connect(&self, user_id: UserId, username: String) -> Registration {
        let registration = self.connections.register(user_id, username);
        for evicted in &registration.evicted {
            self.disconnect(&evicted.id);
        }
        registration
    }

    /// Refreshes liveness for transport-level pings.
    pub fn touch(&self, conn_id: &ConnectionId) {
        if let Some(handle) = self.connections.get(conn_id) {
            handle.record_heartbeat();
        }
    }

    /// Processes one inbound text frame. Failures are answered with an
    /// `error` event on the same connection and never end the connection.
    pub async fn dispatch(&self, conn_id: &ConnectionId, raw: &str) {
        let Some(handle) = self.connections.get(conn_id) else {
            warn!(conn_id = %conn_id, "Frame from unknown connection");
            return;
        };

        handle.record_heartbeat();
        self.metrics.inc_received();

        let msg = match deserialize_inbound(raw, self.config.max_frame_bytes) {
            Ok(msg) => msg,
            Err(e) => {
                let event = peek_event_name(raw);
                self.send_error(&handle, &e, event.as_deref());
                return;
            }
        };

        let event = msg.event_name();
        debug!(conn_id = %conn_id, event, "Inbound event");
        if let Err(e) = self.handle_event(&handle, msg).await {
            self.send_error(&handle, &e, Some(event));
        }
    }

    /// Routes a parsed event to its subsystem.
    pub async fn handle_event(&self, handle: &Arc<ConnectionHandle>, msg: InboundMessage) -> AppResult<()> {
        match msg {
            InboundMessage::JoinRoom { room_id } => {
                let room_id = RoomId::parse(room_id)?;
                self.rooms.join(handle, &room_id).await?;
            }
            InboundMessage::LeaveRoom { room_id } => {
                let room_id = RoomId::parse(room_id)?;
                let left = self.rooms.leave(handle, &room_id)?;
                if left.user_gone {
                    self.relay.clear_typing(&left.room_id, handle.user_id);
                }
            }
            InboundMessage::SendMessage {
                room_id,
                content,
                nonce,
            } => {
                let room_id = RoomId::parse(room_id)?;
                let ack = self
                    .relay
                    .post_message(handle, &room_id, content, nonce)
                    .await?;
                handle.send(OutboundMessage::MessageAck {
                    nonce: ack.nonce,
                    message_id: ack.message_id,
                    status: ack.status,
                });
            }
            InboundMessage::MessageSeen { message_id } => {
                self.relay.mark_seen(handle, &message_id).await?;
            }
            InboundMessage::TypingStart { room_id } => {
                self.relay.set_typing(handle, &RoomId::parse(room_id)?, true)?;
            }
            InboundMessage::TypingStop { room_id } => {
                self.relay.set_typing(handle, &RoomId::parse(room_id)?, false)?;
            }
            InboundMessage::CallStart { callee_id, payload } => {
                self.calls.start_call(handle, callee_id, payload).await?;
            }
            InboundMessage::CallAnswer { call_id, payload } => {
                self.calls.answer_call(handle, &call_id, payload)?;
            }
            InboundMessage::CallReject { call_id } => {
                self.calls.reject_call(handle, &call_id)?;
            }
            InboundMessage::CallEnd { call_id } => {
                self.calls.end_call(handle, &call_id)?;
            }
            InboundMessage::CallSignal { call_id, payload } => {
                self.calls.signal(handle, &call_id, payload)?;
            }
            InboundMessage::Heartbeat => {
                handle.send(OutboundMessage::HeartbeatAck {
                    server_time: chrono::Utc::now(),
                });
            }
        }
        Ok(())
    }

    /// Tears a connection down: leaves every room (`room:peer_left`), ends
    /// its calls (`call:ended`), clears typing. Returns `false` if the
    /// connection was already gone.
    pub fn disconnect(&self, conn_id: &ConnectionId) -> bool {
        let Some(handle) = self.connections.unregister(conn_id) else {
            return false;
        };

        let left = self.rooms.leave_all(&handle);
        for outcome in left.iter().filter(|l| l.user_gone) {
            self.relay.clear_typing(&outcome.room_id, handle.user_id);
        }
        let calls_ended = self.calls.on_disconnect(&handle);
        self.relay.forget_connection(&handle);

        info!(
            conn_id = %conn_id,
            user_id = %handle.user_id,
            rooms = left.len(),
            calls_ended,
            "Connection closed"
        );
        true
    }

    /// Disconnects dead, stalled, or silent connections and evicts expired
    /// ledger entries.
    pub fn sweep(&self) -> SweepReport {
        let mut reaped = 0;
        for expired in self.presence.expired() {
            if self.disconnect(&expired.conn_id) {
                conn_metrics::record_reaped(&self.metrics, expired.cause == ExpiryCause::Stalled);
                warn!(
                    conn_id = %expired.conn_id,
                    user_id = %expired.user_id,
                    cause = ?expired.cause,
                    "Reaped connection"
                );
                reaped += 1;
            }
        }
        SweepReport {
            reaped,
            evicted_messages: self.relay.evict_expired(),
        }
    }

    /// Starts the presence monitor.
    pub fn spawn_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(run_monitor(Arc::clone(self), self.shutdown.clone()))
    }

    /// Token cancelled when the hub shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops the monitor and disconnects every connection.
    pub fn shutdown(&self) {
        info!("Shutting down hub engine");
        self.shutdown.cancel();
        let connections = self.connections.all_connections();
        for conn in &connections {
            self.disconnect(&conn.id);
        }
        info!(closed = connections.len(), "Hub engine shut down");
    }

    /// Current hub-wide counts.
    pub fn stats(&self) -> HubStats {
        HubStats {
            connections: self.connections.connection_count(),
            online_users: self.presence.snapshot().online_users,
            rooms: self.rooms.room_count(),
            active_calls: self.calls.call_count(),
            ledger_messages: self.relay.ledger_len(),
            typing_indicators: self.relay.typing_count(),
            counters: self.metrics.snapshot(),
        }
    }

    fn send_error(&self, handle: &ConnectionHandle, err: &AppError, event: Option<&str>) {
        self.metrics.inc_errors();
        if err.kind.is_internal() {
            error!(conn_id = %handle.id, event, error = %err, "Event failed");
        } else {
            debug!(conn_id = %handle.id, event, code = err.code(), error = %err.message, "Event rejected");
        }
        handle.send(OutboundMessage::from_error(err, event));
    }
}

/// Best-effort `type` field of a frame that failed to parse.
fn peek_event_name(raw: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()?
        .get("type")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{InMemoryPersister, StaticDirectory, StaticMembership};
    use tokio::sync::mpsc;

    fn engine() -> (Arc<HubEngine>, Arc<StaticMembership>) {
        let membership = Arc::new(StaticMembership::new());
        let engine = HubEngine::new(
            HubConfig::default(),
            Collaborators {
                authorizer: membership.clone(),
                persister: Arc::new(InMemoryPersister::new()),
                directory: Arc::new(StaticDirectory::new()),
            },
        );
        (Arc::new(engine), membership)
    }

    async fn next(rx: &mut mpsc::Receiver<OutboundMessage>) -> OutboundMessage {
        rx.recv().await.unwrap()
    }

    #[tokio::test]
    async fn test_malformed_frame_returns_invalid_message() {
        let (engine, _) = engine();
        let mut reg = engine.connect(UserId::new(), "alice".into());
        engine.dispatch(&reg.handle.id, "{oops").await;
        match next(&mut reg.receiver).await {
            OutboundMessage::Error { code, event, .. } => {
                assert_eq!(code, "INVALID_MESSAGE");
                assert_eq!(event, None);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(reg.handle.is_alive());
    }

    #[tokio::test]
    async fn test_bad_fields_echo_event_name() {
        let (engine, _) = engine();
        let mut reg = engine.connect(UserId::new(), "alice".into());
        engine
            .dispatch(&reg.handle.id, r#"{"type":"message:send","room_id":"t1"}"#)
            .await;
        match next(&mut reg.receiver).await {
            OutboundMessage::Error { code, event, .. } => {
                assert_eq!(code, "INVALID_MESSAGE");
                assert_eq!(event.as_deref(), Some("message:send"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_heartbeat_acked() {
        let (engine, _) = engine();
        let mut reg = engine.connect(UserId::new(), "alice".into());
        engine.dispatch(&reg.handle.id, r#"{"type":"heartbeat"}"#).await;
        assert_eq!(next(&mut reg.receiver).await.event_name(), "heartbeat:ack");
    }

    #[tokio::test]
    async fn test_invalid_room_id_rejected() {
        let (engine, _) = engine();
        let mut reg = engine.connect(UserId::new(), "alice".into());
        engine
            .dispatch(&reg.handle.id, r#"{"type":"room:join","room_id":"has space"}"#)
            .await;
        match next(&mut reg.receiver).await {
            OutboundMessage::Error { code, .. } => assert_eq!(code, "INVALID_MESSAGE"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (engine, membership) = engine();
        let user = UserId::new();
        membership.grant(RoomId::parse("t1").unwrap(), user);
        let reg = engine.connect(user, "alice".into());
        engine
            .dispatch(&reg.handle.id, r#"{"type":"room:join","room_id":"t1"}"#)
            .await;
        assert_eq!(engine.stats().rooms, 1);

        assert!(engine.disconnect(&reg.handle.id));
        assert!(!engine.disconnect(&reg.handle.id));
        assert_eq!(engine.stats().rooms, 0);
        assert_eq!(engine.stats().connections, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_reaps_silent_connections() {
        let (engine, _) = engine();
        let quiet = engine.connect(UserId::new(), "quiet".into());
        tokio::time::advance(engine.config().heartbeat_timeout() + std::time::Duration::from_secs(1)).await;
        let report = engine.sweep();
        assert_eq!(report.reaped, 1);
        assert!(!quiet.handle.is_alive());
        assert_eq!(engine.stats().counters.connections_reaped, 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let (engine, _) = engine();
        let reg = engine.connect(UserId::new(), "alice".into());
        let monitor = engine.spawn_monitor();
        engine.shutdown();
        assert!(reg.handle.close_token().is_cancelled());
        assert_eq!(engine.stats().connections, 0);
        monitor.await.unwrap();
    }
}

//! Call signaling table — one session per unordered user pair.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use parley_core::traits::UserDirectory;
use parley_core::types::{CallId, ConnectionId, UserId};
use parley_core::{AppError, AppResult};

use crate::connection::{ConnectionHandle, ConnectionRegistry};
use crate::message::types::OutboundMessage;
use crate::metrics::{HubMetrics, calls as call_metrics};

use super::session::{CallInfo, CallSession, PairKey};
use super::state::{CallEndReason, CallEvent, CallState};

/// Result of a `call:answer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// This connection won the call.
    Connected,
    /// Another device already answered; `call:superseded` was sent.
    Superseded,
}

/// Brokers call setup between two users and relays opaque payloads.
///
/// Every transition of a session happens while holding its pair entry,
/// so concurrent answers, rejects, and hangups are serialized.
#[derive(Debug)]
pub struct CallSignaling {
    sessions: DashMap<PairKey, CallSession>,
    calls: DashMap<CallId, PairKey>,
    by_user: DashMap<UserId, HashSet<CallId>>,
    registry: Arc<ConnectionRegistry>,
    directory: Arc<dyn UserDirectory>,
    metrics: Arc<HubMetrics>,
    ring_timeout: Duration,
}

impl CallSignaling {
    /// Creates an empty call table.
    pub fn new(
        ring_timeout: Duration,
        registry: Arc<ConnectionRegistry>,
        directory: Arc<dyn UserDirectory>,
        metrics: Arc<HubMetrics>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            calls: DashMap::new(),
            by_user: DashMap::new(),
            registry,
            directory,
            metrics,
            ring_timeout,
        }
    }

    /// Rings every connection of `callee_id`.
    pub async fn start_call(
        self: &Arc<Self>,
        handle: &ConnectionHandle,
        callee_id: UserId,
        payload: Value,
    ) -> AppResult<CallId> {
        if callee_id == handle.user_id {
            return Err(AppError::invalid_state("Cannot call yourself"));
        }
        if !self.registry.is_user_online(&callee_id) {
            return Err(AppError::not_found(format!("User {callee_id} is not connected")));
        }

        let caller_name = self.display_name(handle).await;
        let key = PairKey::new(handle.user_id, callee_id);

        let call_id = match self.sessions.entry(key) {
            Entry::Occupied(existing) => {
                return Err(AppError::invalid_state(format!(
                    "A call between these users is already {}",
                    existing.get().state
                )));
            }
            Entry::Vacant(slot) => {
                let mut session = CallSession::new(handle.user_id, handle.id, callee_id);
                session.transition(CallEvent::Start)?;
                let call_id = session.id;

                let rung = self.registry.send_to_user(
                    &callee_id,
                    &OutboundMessage::CallIncoming {
                        call_id,
                        caller_id: handle.user_id,
                        caller_name,
                        payload,
                    },
                );
                if rung == 0 {
                    return Err(AppError::not_found(format!("User {callee_id} is not connected")));
                }

                session.arm_ring_timer(self.spawn_ring_timer(call_id));
                self.calls.insert(call_id, key);
                self.index(handle.user_id, call_id);
                self.index(callee_id, call_id);
                self.registry.send_to_connection(
                    &handle.id,
                    OutboundMessage::CallRinging { call_id, callee_id },
                );
                slot.insert(session);
                call_id
            }
        };

        call_metrics::record_started(&self.metrics);
        info!(
            call_id = %call_id,
            caller_id = %handle.user_id,
            callee_id = %callee_id,
            "Call ringing"
        );
        Ok(call_id)
    }

    /// Answers a ringing call from one of the callee's connections.
    pub fn answer_call(
        &self,
        handle: &ConnectionHandle,
        call_id: &CallId,
        payload: Value,
    ) -> AppResult<AnswerOutcome> {
        self.with_session(call_id, |session| {
            if session.callee_id != handle.user_id {
                return Err(Self::not_callee(session, handle, "answer"));
            }
            if session.state == CallState::Connected && session.accepted_conn != Some(handle.id) {
                self.registry.send_to_connection(
                    &handle.id,
                    OutboundMessage::CallSuperseded { call_id: session.id },
                );
                debug!(call_id = %session.id, conn_id = %handle.id, "Late answer superseded");
                return Ok(AnswerOutcome::Superseded);
            }

            session.transition(CallEvent::Answer)?;
            session.accepted_conn = Some(handle.id);
            session.connected_at = Some(Utc::now());

            self.registry.send_to_connection(
                &session.caller_conn,
                OutboundMessage::CallAccepted {
                    call_id: session.id,
                    callee_id: session.callee_id,
                    payload,
                },
            );
            self.registry.send_to_user_except(
                &session.callee_id,
                Some(handle.id),
                &OutboundMessage::CallSuperseded { call_id: session.id },
            );

            call_metrics::record_connected(&self.metrics);
            info!(call_id = %session.id, conn_id = %handle.id, "Call connected");
            Ok(AnswerOutcome::Connected)
        })
    }

    /// Declines a ringing call.
    pub fn reject_call(&self, handle: &ConnectionHandle, call_id: &CallId) -> AppResult<()> {
        self.with_session(call_id, |session| {
            if session.callee_id != handle.user_id {
                return Err(Self::not_callee(session, handle, "reject"));
            }
            session.transition(CallEvent::Reject)?;

            self.registry.send_to_connection(
                &session.caller_conn,
                OutboundMessage::CallRejected {
                    call_id: session.id,
                    callee_id: session.callee_id,
                },
            );
            self.registry.send_to_user_except(
                &session.callee_id,
                Some(handle.id),
                &OutboundMessage::CallEnded {
                    call_id: session.id,
                    reason: CallEndReason::Rejected,
                },
            );
            Ok(())
        })
    }

    /// Hangs up a ringing or connected call from either side.
    pub fn end_call(&self, handle: &ConnectionHandle, call_id: &CallId) -> AppResult<()> {
        self.with_session(call_id, |session| {
            Self::require_participant(session, handle)?;
            let targets = self.engaged_connections(session);
            session.transition(CallEvent::End)?;
            self.notify_ended(session.id, &targets, Some(handle.id), CallEndReason::Hangup);
            Ok(())
        })
    }

    /// Relays an opaque payload to the other party's engaged connection(s).
    /// Returns the number of connections it was queued on.
    pub fn signal(&self, handle: &ConnectionHandle, call_id: &CallId, payload: Value) -> AppResult<usize> {
        self.with_session(call_id, |session| {
            Self::require_participant(session, handle)?;
            session.transition(CallEvent::Signal)?;

            let from_caller = session.caller_id == handle.user_id;
            let engaged_here = if from_caller {
                handle.id == session.caller_conn
            } else {
                session.accepted_conn.is_none_or(|conn| conn == handle.id)
            };
            if !engaged_here {
                return Err(AppError::invalid_state(
                    "Call is engaged on another connection",
                ));
            }

            let targets = if from_caller {
                match session.accepted_conn {
                    Some(conn) => vec![conn],
                    None => self.live_connections(&session.callee_id),
                }
            } else {
                vec![session.caller_conn]
            };

            let msg = OutboundMessage::CallSignal {
                call_id: session.id,
                from_user_id: handle.user_id,
                payload,
            };
            let delivered = targets
                .iter()
                .filter(|conn| self.registry.send_to_connection(conn, msg.clone()))
                .count();
            call_metrics::record_signal(&self.metrics);
            Ok(delivered)
        })
    }

    /// Ends every call the closed connection was engaged in. Must run after
    /// the connection has been unregistered. Returns the number ended.
    pub fn on_disconnect(&self, handle: &ConnectionHandle) -> usize {
        let call_ids: Vec<CallId> = self
            .by_user
            .get(&handle.user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        let user_online = self.registry.is_user_online(&handle.user_id);

        call_ids
            .into_iter()
            .filter(|call_id| {
                let ended = self.with_session(call_id, |session| {
                    let affected = session.caller_conn == handle.id
                        || session.accepted_conn == Some(handle.id)
                        || (session.state == CallState::Ringing
                            && session.callee_id == handle.user_id
                            && !user_online);
                    if !affected {
                        return Ok(false);
                    }
                    let targets = self.engaged_connections(session);
                    session.transition(CallEvent::Disconnect)?;
                    self.notify_ended(
                        session.id,
                        &targets,
                        Some(handle.id),
                        CallEndReason::PeerDisconnected,
                    );
                    Ok(true)
                });
                matches!(ended, Ok(true))
            })
            .count()
    }

    /// Snapshot of a live call.
    pub fn get(&self, call_id: &CallId) -> Option<CallInfo> {
        let key = self.calls.get(call_id).map(|k| *k.value())?;
        self.sessions
            .get(&key)
            .filter(|session| session.id == *call_id)
            .map(|session| session.info())
    }

    /// Snapshots of every live call.
    pub fn active_calls(&self) -> Vec<CallInfo> {
        self.sessions.iter().map(|s| s.info()).collect()
    }

    /// Number of live calls.
    pub fn call_count(&self) -> usize {
        self.sessions.len()
    }

    fn ring_timeout(&self, call_id: &CallId) {
        let result = self.with_session(call_id, |session| {
            if session.state != CallState::Ringing {
                return Ok(());
            }
            let targets = self.engaged_connections(session);
            session.transition(CallEvent::RingTimeout)?;
            self.notify_ended(session.id, &targets, None, CallEndReason::NoAnswer);
            info!(call_id = %session.id, "Call unanswered");
            Ok(())
        });
        if let Err(e) = result {
            debug!(call_id = %call_id, error = %e, "Ring timer fired for finished call");
        }
    }

    fn spawn_ring_timer(self: &Arc<Self>, call_id: CallId) -> AbortHandle {
        let table = Arc::downgrade(self);
        let timeout = self.ring_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(table) = table.upgrade() {
                table.ring_timeout(&call_id);
            }
        })
        .abort_handle()
    }

    /// Runs `f` on the session under its pair lock, dropping the session
    /// (and its indexes) once it reaches a terminal state.
    fn with_session<R>(
        &self,
        call_id: &CallId,
        f: impl FnOnce(&mut CallSession) -> AppResult<R>,
    ) -> AppResult<R> {
        let missing = || AppError::not_found(format!("Call {call_id} not found"));
        let key = self.calls.get(call_id).map(|k| *k.value()).ok_or_else(missing)?;
        let Entry::Occupied(mut slot) = self.sessions.entry(key) else {
            return Err(missing());
        };
        if slot.get().id != *call_id {
            return Err(missing());
        }

        let result = f(slot.get_mut());

        if slot.get().state.is_terminal() {
            let session = slot.remove();
            self.unindex(&session);
            call_metrics::record_finished(&self.metrics);
            info!(call_id = %session.id, state = %session.state, "Call finished");
        }
        result
    }

    fn engaged_connections(&self, session: &CallSession) -> Vec<ConnectionId> {
        let mut targets = vec![session.caller_conn];
        match session.accepted_conn {
            Some(conn) => targets.push(conn),
            None => targets.extend(self.live_connections(&session.callee_id)),
        }
        targets
    }

    fn live_connections(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.registry
            .user_connections(user_id)
            .iter()
            .map(|conn| conn.id)
            .collect()
    }

    fn notify_ended(
        &self,
        call_id: CallId,
        targets: &[ConnectionId],
        except: Option<ConnectionId>,
        reason: CallEndReason,
    ) {
        for conn in targets.iter().filter(|conn| Some(**conn) != except) {
            self.registry
                .send_to_connection(conn, OutboundMessage::CallEnded { call_id, reason });
        }
    }

    fn require_participant(session: &CallSession, handle: &ConnectionHandle) -> AppResult<()> {
        if session.is_participant(&handle.user_id) {
            Ok(())
        } else {
            Err(AppError::forbidden("Not a participant in this call"))
        }
    }

    fn not_callee(session: &CallSession, handle: &ConnectionHandle, action: &str) -> AppError {
        if session.caller_id == handle.user_id {
            AppError::forbidden(format!("Only the callee can {action} a call"))
        } else {
            AppError::forbidden("Not a participant in this call")
        }
    }

    fn index(&self, user_id: UserId, call_id: CallId) {
        self.by_user.entry(user_id).or_default().insert(call_id);
    }

    fn unindex(&self, session: &CallSession) {
        self.calls.remove(&session.id);
        for user_id in [session.caller_id, session.callee_id] {
            if let Some(mut ids) = self.by_user.get_mut(&user_id) {
                ids.remove(&session.id);
            }
            self.by_user.remove_if(&user_id, |_, ids| ids.is_empty());
        }
    }

    async fn display_name(&self, handle: &ConnectionHandle) -> String {
        match self.directory.resolve_display_info(handle.user_id).await {
            Ok(Some(info)) => info.display_name,
            Ok(None) => handle.username.clone(),
            Err(e) => {
                warn!(user_id = %handle.user_id, error = %e, "Display info lookup failed");
                handle.username.clone()
            }
        }
    }
}

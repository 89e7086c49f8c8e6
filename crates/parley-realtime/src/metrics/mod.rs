//! Hub counters exposed on the detailed health endpoint.

pub mod calls;
pub mod connections;
pub mod messages;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Hub-level metrics counters.
#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Total connections established
    pub connections_total: AtomicU64,
    /// Connections currently registered
    pub connections_active: AtomicU64,
    /// Connections torn down by the presence monitor
    pub connections_reaped: AtomicU64,
    /// Connections killed for a full outbound queue
    pub connections_stalled: AtomicU64,
    /// Connections evicted by the per-user cap
    pub connections_evicted: AtomicU64,
    /// Inbound frames processed
    pub events_received: AtomicU64,
    /// Error frames returned to clients
    pub errors_sent: AtomicU64,
    /// Chat messages accepted and fanned out
    pub messages_relayed: AtomicU64,
    /// `message:send` replays answered from the ledger
    pub messages_deduplicated: AtomicU64,
    /// Read receipts that advanced a status
    pub receipts_recorded: AtomicU64,
    /// Persistence calls that failed
    pub persist_failures: AtomicU64,
    /// Typing state changes broadcast
    pub typing_changes: AtomicU64,
    /// Calls started
    pub calls_started: AtomicU64,
    /// Calls answered
    pub calls_connected: AtomicU64,
    /// Calls that reached a terminal state
    pub calls_finished: AtomicU64,
    /// Signaling payloads relayed
    pub signals_relayed: AtomicU64,
}

impl HubMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an inbound frame.
    pub fn inc_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an error frame sent to a client.
    pub fn inc_errors(&self) {
        self.errors_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_reaped: self.connections_reaped.load(Ordering::Relaxed),
            connections_stalled: self.connections_stalled.load(Ordering::Relaxed),
            connections_evicted: self.connections_evicted.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
            errors_sent: self.errors_sent.load(Ordering::Relaxed),
            messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
            messages_deduplicated: self.messages_deduplicated.load(Ordering::Relaxed),
            receipts_recorded: self.receipts_recorded.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            typing_changes: self.typing_changes.load(Ordering::Relaxed),
            calls_started: self.calls_started.load(Ordering::Relaxed),
            calls_connected: self.calls_connected.load(Ordering::Relaxed),
            calls_finished: self.calls_finished.load(Ordering::Relaxed),
            signals_relayed: self.signals_relayed.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub connections_reaped: u64,
    pub connections_stalled: u64,
    pub connections_evicted: u64,
    pub events_received: u64,
    pub errors_sent: u64,
    pub messages_relayed: u64,
    pub messages_deduplicated: u64,
    pub receipts_recorded: u64,
    pub persist_failures: u64,
    pub typing_changes: u64,
    pub calls_started: u64,
    pub calls_connected: u64,
    pub calls_finished: u64,
    pub signals_relayed: u64,
}

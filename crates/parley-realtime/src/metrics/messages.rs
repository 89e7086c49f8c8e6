//! Chat relay metrics helpers.

use std::sync::atomic::Ordering;

use super::HubMetrics;

/// Record an accepted chat message
pub fn record_relayed(metrics: &HubMetrics) {
    metrics.messages_relayed.fetch_add(1, Ordering::Relaxed);
}

/// Record a nonce replay answered from the ledger
pub fn record_deduplicated(metrics: &HubMetrics) {
    metrics.messages_deduplicated.fetch_add(1, Ordering::Relaxed);
}

/// Record a read receipt that advanced a status
pub fn record_receipt(metrics: &HubMetrics) {
    metrics.receipts_recorded.fetch_add(1, Ordering::Relaxed);
}

/// Record a failed persistence call
pub fn record_persist_failure(metrics: &HubMetrics) {
    metrics.persist_failures.fetch_add(1, Ordering::Relaxed);
}

/// Record a typing state change
pub fn record_typing(metrics: &HubMetrics) {
    metrics.typing_changes.fetch_add(1, Ordering::Relaxed);
}

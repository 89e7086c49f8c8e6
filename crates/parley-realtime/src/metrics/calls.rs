//! Call signaling metrics helpers.

use std::sync::atomic::Ordering;

use super::HubMetrics;

/// Record a call entering RINGING
pub fn record_started(metrics: &HubMetrics) {
    metrics.calls_started.fetch_add(1, Ordering::Relaxed);
}

/// Record a call entering CONNECTED
pub fn record_connected(metrics: &HubMetrics) {
    metrics.calls_connected.fetch_add(1, Ordering::Relaxed);
}

/// Record a call reaching ENDED or REJECTED
pub fn record_finished(metrics: &HubMetrics) {
    metrics.calls_finished.fetch_add(1, Ordering::Relaxed);
}

/// Record a relayed signaling payload
pub fn record_signal(metrics: &HubMetrics) {
    metrics.signals_relayed.fetch_add(1, Ordering::Relaxed);
}

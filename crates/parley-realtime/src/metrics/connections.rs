//! Connection metrics helpers.

use std::sync::atomic::Ordering;

use super::HubMetrics;

/// Record a new connection
pub fn record_connect(metrics: &HubMetrics) {
    metrics.connections_total.fetch_add(1, Ordering::Relaxed);
    metrics.connections_active.fetch_add(1, Ordering::Relaxed);
}

/// Record a disconnection
pub fn record_disconnect(metrics: &HubMetrics) {
    metrics.connections_active.fetch_sub(1, Ordering::Relaxed);
}

/// Record a connection torn down by the presence monitor
pub fn record_reaped(metrics: &HubMetrics, stalled: bool) {
    metrics.connections_reaped.fetch_add(1, Ordering::Relaxed);
    if stalled {
        metrics.connections_stalled.fetch_add(1, Ordering::Relaxed);
    }
}

/// Record a connection evicted by the per-user cap
pub fn record_evicted(metrics: &HubMetrics) {
    metrics.connections_evicted.fetch_add(1, Ordering::Relaxed);
}

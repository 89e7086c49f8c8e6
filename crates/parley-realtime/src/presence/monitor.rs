//! Background liveness sweep.

use std::sync::Arc;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::server::HubEngine;

/// Runs the presence sweep every half heartbeat interval until `shutdown`
/// is cancelled.
///
/// Each tick disconnects dead, stalled, or silent connections and evicts
/// expired relay ledger entries.
pub async fn run_monitor(engine: Arc<HubEngine>, shutdown: CancellationToken) {
    let period = (engine.config().heartbeat_interval() / 2).max(time::Duration::from_millis(100));
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    info!(period_ms = period.as_millis() as u64, "Presence monitor started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let report = engine.sweep();
                if report.reaped > 0 || report.evicted_messages > 0 {
                    debug!(
                        reaped = report.reaped,
                        evicted_messages = report.evicted_messages,
                        "Presence sweep"
                    );
                }
            }
        }
    }

    info!("Presence monitor stopped");
}

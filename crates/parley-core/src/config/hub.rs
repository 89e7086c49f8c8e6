//! Real-time hub configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hub engine configuration: connection limits, relay limits, timers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Maximum live connections per user; the oldest is evicted beyond it.
    #[serde(default = "default_max_connections_per_user")]
    pub max_connections_per_user: usize,
    /// Outbound queue capacity per connection. A full queue means the
    /// connection is stalled and gets torn down.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer_size: usize,
    /// Maximum rooms a single connection may join.
    #[serde(default = "default_max_rooms")]
    pub max_rooms_per_connection: usize,
    /// Maximum chat message content size in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Maximum raw inbound frame size in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Hard cap enforced by the WebSocket transport. Frames between
    /// `max_frame_bytes` and this cap are answered with `INVALID_MESSAGE`;
    /// frames beyond it close the connection.
    #[serde(default = "default_max_transport_frame_bytes")]
    pub max_transport_frame_bytes: usize,
    /// Seconds an idempotency record is kept for nonce replay and receipts.
    #[serde(default = "default_ledger_ttl")]
    pub message_ledger_ttl_seconds: u64,
    /// Typing indicator auto-expiry in seconds.
    #[serde(default = "default_typing_timeout")]
    pub typing_timeout_seconds: u64,
    /// Ring timeout for unanswered calls in seconds.
    #[serde(default = "default_ring_timeout")]
    pub ring_timeout_seconds: u64,
    /// Expected client heartbeat interval in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Consecutive missed heartbeats before a connection is reaped.
    #[serde(default = "default_heartbeat_miss_limit")]
    pub heartbeat_miss_limit: u32,
    /// Burst/refill settings for chat messages.
    #[serde(default = "default_message_rate")]
    pub message_rate: RateLimitConfig,
    /// Burst/refill settings for typing events.
    #[serde(default = "default_typing_rate")]
    pub typing_rate: RateLimitConfig,
}

/// Token bucket parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Bucket capacity.
    pub burst: u32,
    /// Tokens refilled per second.
    pub per_second: f64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections_per_user: default_max_connections_per_user(),
            outbound_buffer_size: default_outbound_buffer(),
            max_rooms_per_connection: default_max_rooms(),
            max_message_bytes: default_max_message_bytes(),
            max_frame_bytes: default_max_frame_bytes(),
            max_transport_frame_bytes: default_max_transport_frame_bytes(),
            message_ledger_ttl_seconds: default_ledger_ttl(),
            typing_timeout_seconds: default_typing_timeout(),
            ring_timeout_seconds: default_ring_timeout(),
            heartbeat_interval_seconds: default_heartbeat_interval(),
            heartbeat_miss_limit: default_heartbeat_miss_limit(),
            message_rate: default_message_rate(),
            typing_rate: default_typing_rate(),
        }
    }
}

impl HubConfig {
    /// Ring timeout as a [`Duration`].
    pub fn ring_timeout(&self) -> Duration {
        Duration::from_secs(self.ring_timeout_seconds)
    }

    /// Typing expiry as a [`Duration`].
    pub fn typing_timeout(&self) -> Duration {
        Duration::from_secs(self.typing_timeout_seconds)
    }

    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    /// Silence after which a connection is considered dead.
    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_interval() * self.heartbeat_miss_limit
    }

    /// Idempotency ledger TTL as a [`Duration`].
    pub fn ledger_ttl(&self) -> Duration {
        Duration::from_secs(self.message_ledger_ttl_seconds)
    }
}

fn default_max_connections_per_user() -> usize {
    5
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_max_rooms() -> usize {
    50
}

fn default_max_message_bytes() -> usize {
    10 * 1024
}

fn default_max_frame_bytes() -> usize {
    64 * 1024
}

fn default_max_transport_frame_bytes() -> usize {
    256 * 1024
}

fn default_ledger_ttl() -> u64 {
    600
}

fn default_typing_timeout() -> u64 {
    8
}

fn default_ring_timeout() -> u64 {
    45
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_heartbeat_miss_limit() -> u32 {
    2
}

fn default_message_rate() -> RateLimitConfig {
    RateLimitConfig {
        burst: 20,
        per_second: 5.0,
    }
}

fn default_typing_rate() -> RateLimitConfig {
    RateLimitConfig {
        burst: 10,
        per_second: 2.0,
    }
}

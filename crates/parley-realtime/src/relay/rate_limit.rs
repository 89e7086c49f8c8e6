//! Per-connection token bucket.

use dashmap::DashMap;
use tokio::time::Instant;

use parley_core::config::hub::RateLimitConfig;
use parley_core::types::ConnectionId;

/// In-memory token bucket rate limiter keyed by connection.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<ConnectionId, TokenBucket>,
    max_tokens: u32,
    refill_rate: f64,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Creates a new rate limiter.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            max_tokens: config.burst,
            refill_rate: config.per_second,
        }
    }

    /// Attempts to consume a token for the given connection.
    pub fn check(&self, conn_id: &ConnectionId) -> bool {
        let now = Instant::now();
        let mut bucket = self.buckets.entry(*conn_id).or_insert(TokenBucket {
            tokens: f64::from(self.max_tokens),
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(f64::from(self.max_tokens));
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drops the bucket of a closed connection.
    pub fn forget(&self, conn_id: &ConnectionId) {
        self.buckets.remove(conn_id);
    }
}

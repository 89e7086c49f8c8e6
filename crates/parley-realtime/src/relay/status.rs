//! Per-recipient delivery status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Delivery status of a message for one recipient. Only ever advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    /// Accepted by the hub; no recipient connection got it live.
    Sent,
    /// Queued on at least one recipient connection.
    Delivered,
    /// The recipient sent a read receipt.
    Seen,
}

impl DeliveryStatus {
    /// Returns the later of the two statuses.
    pub fn advance(self, next: Self) -> Self {
        self.max(next)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => write!(f, "SENT"),
            Self::Delivered => write!(f, "DELIVERED"),
            Self::Seen => write!(f, "SEEN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_downgrades() {
        assert_eq!(DeliveryStatus::Seen.advance(DeliveryStatus::Delivered), DeliveryStatus::Seen);
        assert_eq!(DeliveryStatus::Sent.advance(DeliveryStatus::Delivered), DeliveryStatus::Delivered);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&DeliveryStatus::Delivered).unwrap(), "\"DELIVERED\"");
    }
}

//! Shared domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which leg of a binary market a token represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The YES outcome token.
    Yes,
    /// The NO outcome token.
    No,
}

impl Side {
    /// Returns the side as a string for logging and persistence.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::No => "NO",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An eligible binary market as supplied by the external discovery
/// collaborator. Read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketPair {
    /// Exchange market identifier (condition id).
    pub market_id: String,

    /// Token id of the YES leg.
    pub yes_token: String,

    /// Token id of the NO leg.
    pub no_token: String,

    /// Market resolution time, if known.
    pub end_time: Option<DateTime<Utc>>,

    /// Whether the exchange exposes an order book for this market.
    pub enable_order_book: bool,

    /// Human-readable market question, for logs and alerts.
    pub question: String,
}

impl MarketPair {
    /// Returns true if `token_id` is one of this market's legs.
    #[must_use]
    pub fn owns_token(&self, token_id: &str) -> bool {
        self.yes_token == token_id || self.no_token == token_id
    }

    /// Seconds until resolution, negative if already past. `None` when
    /// the end time is unknown.
    #[must_use]
    pub fn seconds_to_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.end_time.map(|end| (end - now).num_seconds())
    }
}

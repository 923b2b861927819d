//! Streaming order-book cache.
//!
//! One entry per instrument, last-write-wins: the upstream feed is not
//! sequence-reconciled, so out-of-order delivery can transiently yield
//! stale readings. Decision latency here is human-scale, which makes
//! that an accepted simplification.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;

use parity_arb_core::events::PriceLevel;

/// Cached top-of-book view of one instrument.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookEntry {
    /// Best ask price, if any has been observed.
    pub best_ask: Option<Decimal>,
    /// Dollar depth within the configured band above the best ask.
    pub depth_usd: Decimal,
}

/// Concurrent cache of best ask and in-band depth per instrument.
///
/// All access is serialized by one mutex scoped to this component;
/// reads return copies so callers never hold the lock implicitly.
#[derive(Debug, Default)]
pub struct BookState {
    entries: Mutex<HashMap<String, BookEntry>>,
}

impl BookState {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the entry for `token_id`. Entries are never deleted.
    pub fn update(&self, token_id: &str, best_ask: Option<Decimal>, depth_usd: Decimal) {
        let mut entries = self.entries.lock();
        entries.insert(
            token_id.to_string(),
            BookEntry {
                best_ask,
                depth_usd,
            },
        );
    }

    /// Returns a copy of the entry for `token_id`; unknown instruments
    /// read as no ask and zero depth.
    #[must_use]
    pub fn read(&self, token_id: &str) -> BookEntry {
        let entries = self.entries.lock();
        entries.get(token_id).copied().unwrap_or_default()
    }
}

/// Sums dollar depth (`price × size`) over ask levels priced within
/// `band_pct` above `best_ask`.
///
/// Returns zero for an empty ladder or a non-positive best ask.
#[must_use]
pub fn depth_within_band(asks: &[PriceLevel], best_ask: Decimal, band_pct: Decimal) -> Decimal {
    if asks.is_empty() || best_ask <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let ceiling = best_ask * (Decimal::ONE + band_pct);
    asks.iter()
        .filter(|level| level.price <= ceiling)
        .map(|level| level.price * level.size)
        .sum()
}

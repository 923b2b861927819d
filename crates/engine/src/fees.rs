//! Per-token fee-rate cache and the dynamic edge threshold.
//!
//! The profitability gate requires the implied-probability sum to
//! undercut 1.0 by more than `min_base_edge + fee + safety_buffer`.
//! The fee term uses the *larger* of the two legs' rates, not the sum:
//! in the worst case only one leg's fee structure needs hedging
//! against.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use parity_arb_core::config::EngineConfig;
use parity_arb_core::traits::FeeRateSource;

/// Computes the dynamic minimum edge from two fee rates.
#[must_use]
pub fn min_edge_dynamic(
    rate_yes: Decimal,
    rate_no: Decimal,
    min_base_edge: Decimal,
    safety_buffer: Decimal,
) -> Decimal {
    min_base_edge + rate_yes.max(rate_no) + safety_buffer
}

/// Caches fee rates per token and exposes the fee-adjusted entry
/// threshold.
pub struct FeeCache {
    source: Arc<dyn FeeRateSource>,
    rates: Mutex<HashMap<String, Decimal>>,
    min_base_edge: Decimal,
    safety_buffer: Decimal,
}

impl std::fmt::Debug for FeeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeeCache")
            .field("cached", &self.rates.lock().len())
            .field("min_base_edge", &self.min_base_edge)
            .field("safety_buffer", &self.safety_buffer)
            .finish()
    }
}

impl FeeCache {
    /// Creates a cache over the injected rate source.
    pub fn new(source: Arc<dyn FeeRateSource>, config: &EngineConfig) -> Self {
        Self {
            source,
            rates: Mutex::new(HashMap::new()),
            min_base_edge: config.min_base_edge,
            safety_buffer: config.safety_buffer,
        }
    }

    /// Returns the fee rate for `token_id`, fetching and caching on a
    /// miss. Fetch failures are absorbed: the miss is logged and
    /// `0.0` returned, never an error.
    pub async fn get_rate(&self, token_id: &str) -> Decimal {
        if let Some(rate) = self.rates.lock().get(token_id).copied() {
            return rate;
        }

        // Fetch outside the lock; a slow collaborator must not stall
        // unrelated lookups.
        let rate = match self.source.fetch_fee_rate(token_id).await {
            Ok(rate) => rate,
            Err(error) => {
                warn!(token_id, %error, "fee rate fetch failed, assuming zero");
                Decimal::ZERO
            }
        };

        self.rates.lock().insert(token_id.to_string(), rate);
        rate
    }

    /// Fee- and safety-adjusted minimum edge for a market pair.
    /// Stable across repeated calls absent [`FeeCache::refresh`].
    pub async fn get_min_edge_dynamic(&self, yes_token: &str, no_token: &str) -> Decimal {
        let rate_yes = self.get_rate(yes_token).await;
        let rate_no = self.get_rate(no_token).await;
        min_edge_dynamic(rate_yes, rate_no, self.min_base_edge, self.safety_buffer)
    }

    /// Evicts both legs' cached rates and recomputes the threshold
    /// from fresh fetches.
    pub async fn refresh(&self, yes_token: &str, no_token: &str) -> Decimal {
        {
            let mut rates = self.rates.lock();
            rates.remove(yes_token);
            rates.remove(no_token);
        }
        self.get_min_edge_dynamic(yes_token, no_token).await
    }
}

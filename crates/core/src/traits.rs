//! Collaborator traits at the engine's seams.
//!
//! Order signing and routing, fee-rate lookups, and alert delivery are
//! external concerns: the engine consumes them behind these traits and
//! never learns the exchange protocol. Implementations must apply
//! their own request timeouts; from the engine's view a timeout is an
//! ordinary failure, not a hang.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::Side;

/// A two-leg entry order: equal shares of YES and NO bought as limit
/// orders at the observed asks.
///
/// The legs are NOT placed atomically. A one-sided fill is an expected
/// outcome the protection machine handles, not an error.
#[derive(Debug, Clone)]
pub struct PairOrder {
    /// Market the legs belong to.
    pub market_id: String,
    /// YES leg token id.
    pub yes_token: String,
    /// NO leg token id.
    pub no_token: String,
    /// Limit price for the YES leg.
    pub price_yes: Decimal,
    /// Limit price for the NO leg.
    pub price_no: Decimal,
    /// Shares per leg.
    pub shares: Decimal,
    /// Notional size in dollars across both legs.
    pub size_usd: Decimal,
}

/// Places and cancels exchange orders on behalf of the engine.
#[async_trait]
pub trait OrderRouter: Send + Sync {
    /// Places both legs of an entry. Returns `Ok(true)` when both
    /// orders were accepted by the exchange, `Ok(false)` or `Err` on
    /// any placement failure (both feed the engine's failure counter).
    async fn place_orders(&self, order: &PairOrder) -> Result<bool>;

    /// Sells the filled leg of a one-sided position. Fire-and-forget
    /// from the protection machine's view.
    async fn place_hedge_sell(
        &self,
        token_id: &str,
        side: Side,
        size: Decimal,
        is_market: bool,
    ) -> Result<()>;

    /// Cancels all resting orders for a market (settlement sweep,
    /// pre-expiry auto-cancel).
    async fn cancel_market_orders(&self, market_id: &str) -> Result<()>;
}

/// Looks up the exchange fee rate for a token.
#[async_trait]
pub trait FeeRateSource: Send + Sync {
    /// Returns the fee rate as a decimal in `[0, 1)`. Callers absorb
    /// failures to `0.0`; implementations should still return `Err`
    /// on transport problems so the miss can be logged.
    async fn fetch_fee_rate(&self, token_id: &str) -> Result<Decimal>;
}

/// Category of an operator alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Circuit breaker tripped; entries paused.
    CircuitBreaker,
    /// A hedge sell fired (or would have, in simulated mode).
    Hedge,
    /// A fill was observed.
    Fill,
    /// Generic error worth an operator's attention.
    Error,
}

impl AlertKind {
    /// Stable string form for audit payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CircuitBreaker => "circuit_breaker",
            Self::Hedge => "hedge",
            Self::Fill => "fill",
            Self::Error => "error",
        }
    }
}

/// Best-effort operator notification. Implementations must never
/// panic or propagate failure into the caller.
pub trait AlertSink: Send + Sync {
    /// Delivers one alert. Delivery problems are the sink's own
    /// concern (log and move on).
    fn notify(&self, kind: AlertKind, detail: &str);
}

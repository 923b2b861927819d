//! One-sided-fill protection.
//!
//! Entry legs are not atomic: one leg can fill while the other rests.
//! That window carries directional exposure this machine bounds with
//! three triggers, checked in strict priority order on every market
//! event for the affected pair:
//!
//! 1. upside lock: the filled leg's fill price is already at or above
//!    the lock threshold, so selling it banks a profit immediately;
//! 2. stop-loss: the filled leg's own ask has dropped below the fill
//!    price by more than the adverse-move fraction;
//! 3. timer: the position has been one-sided longer than the allowed
//!    carry window.
//!
//! The first matching trigger wins even when several hold at once.
//! Every hedge goes out at market: the record is dropped when the
//! trigger fires, so a resting limit sell would leave the exposure
//! untracked.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use parity_arb_core::config::ProtectionConfig;
use parity_arb_core::traits::{AlertKind, AlertSink, OrderRouter};
use parity_arb_core::types::Side;

/// Which rule fired a hedge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HedgeTrigger {
    /// Filled at or above the lock threshold; sell to bank the gain.
    UpsideLock,
    /// Filled leg's ask moved adversely past the stop fraction.
    StopLoss,
    /// One-sided longer than the carry window.
    Timer,
}

impl HedgeTrigger {
    /// Stable string form for logs and audit payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpsideLock => "upside_lock",
            Self::StopLoss => "stop_loss",
            Self::Timer => "timer",
        }
    }
}

/// Snapshot of a partially filled entry, keyed by market.
#[derive(Debug, Clone, Copy)]
struct PartialFillRecord {
    yes_filled: Decimal,
    no_filled: Decimal,
    fill_price_yes: Decimal,
    fill_price_no: Decimal,
    /// When the market FIRST went one-sided. Re-registration replaces
    /// the fill snapshot but keeps this origin, so the timer cannot be
    /// pushed back by a trickle of partial fills.
    start: Instant,
}

/// Decides which trigger (if any) applies to a one-sided position.
///
/// `elapsed` is time since the position first went one-sided and
/// `current_ask` is the filled leg's own best ask, when known.
#[must_use]
pub fn evaluate_triggers(
    fill_price: Decimal,
    current_ask: Option<Decimal>,
    elapsed: Duration,
    config: &ProtectionConfig,
) -> Option<HedgeTrigger> {
    if fill_price >= config.protection_pct {
        return Some(HedgeTrigger::UpsideLock);
    }
    if let Some(ask) = current_ask {
        if ask <= fill_price * (Decimal::ONE - config.adverse_move_pct) {
            return Some(HedgeTrigger::StopLoss);
        }
    }
    if elapsed >= Duration::from_secs(config.protection_timer_secs) {
        return Some(HedgeTrigger::Timer);
    }
    None
}

/// Tracks one-sided positions and fires hedge sells when a trigger
/// matches.
pub struct ProtectionStateMachine {
    config: ProtectionConfig,
    simulated: bool,
    router: Arc<dyn OrderRouter>,
    alerts: Arc<dyn AlertSink>,
    records: Mutex<HashMap<String, PartialFillRecord>>,
}

impl std::fmt::Debug for ProtectionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectionStateMachine")
            .field("pending", &self.records.lock().len())
            .field("simulated", &self.simulated)
            .finish()
    }
}

impl ProtectionStateMachine {
    /// Creates the machine over the injected router and alert sink.
    pub fn new(
        config: ProtectionConfig,
        simulated: bool,
        router: Arc<dyn OrderRouter>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            config,
            simulated,
            router,
            alerts,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Records (or updates) the fill snapshot for a market. The record
    /// is replaced wholesale but the timer origin of an existing record
    /// is preserved.
    pub fn register_partial_fill(
        &self,
        market_id: &str,
        yes_filled: Decimal,
        no_filled: Decimal,
        fill_price_yes: Decimal,
        fill_price_no: Decimal,
    ) {
        let mut records = self.records.lock();
        let start = records
            .get(market_id)
            .map_or_else(Instant::now, |existing| existing.start);
        records.insert(
            market_id.to_string(),
            PartialFillRecord {
                yes_filled,
                no_filled,
                fill_price_yes,
                fill_price_no,
                start,
            },
        );
    }

    /// Whether a market currently has a tracked fill record.
    #[must_use]
    pub fn is_pending(&self, market_id: &str) -> bool {
        self.records.lock().contains_key(market_id)
    }

    /// Drops the record for a market without hedging (settlement,
    /// manual intervention).
    pub fn clear_market(&self, market_id: &str) {
        self.records.lock().remove(market_id);
    }

    /// Evaluates the tracked record for `market_id` against the current
    /// asks of both legs and hedges if a trigger matches. Returns true
    /// when a hedge fired (the record is dropped either way the
    /// exposure ends: hedge fired, or both legs got filled).
    pub async fn check_and_hedge(
        &self,
        market_id: &str,
        yes_token: &str,
        no_token: &str,
        ask_yes: Option<Decimal>,
        ask_no: Option<Decimal>,
    ) -> bool {
        // Copy the record out so no lock is held across the hedge.
        let record = {
            let mut records = self.records.lock();
            let Some(record) = records.get(market_id).copied() else {
                return false;
            };
            // Both legs filled resolves the position: the pair pays
            // out one dollar per matched share, so there is nothing
            // left to hedge.
            if record.yes_filled > Decimal::ZERO && record.no_filled > Decimal::ZERO {
                records.remove(market_id);
                return false;
            }
            if record.yes_filled == Decimal::ZERO && record.no_filled == Decimal::ZERO {
                records.remove(market_id);
                return false;
            }
            record
        };

        let (side, token_id, size, fill_price, current_ask) = if record.yes_filled > Decimal::ZERO
        {
            (
                Side::Yes,
                yes_token,
                record.yes_filled,
                record.fill_price_yes,
                ask_yes,
            )
        } else {
            (
                Side::No,
                no_token,
                record.no_filled,
                record.fill_price_no,
                ask_no,
            )
        };

        let elapsed = record.start.elapsed();
        let Some(trigger) = evaluate_triggers(fill_price, current_ask, elapsed, &self.config)
        else {
            return false;
        };

        info!(
            market_id,
            token_id,
            side = side.as_str(),
            trigger = trigger.as_str(),
            %size,
            %fill_price,
            "protection trigger matched, hedging"
        );
        self.do_hedge(market_id, token_id, side, size, trigger).await;
        self.records.lock().remove(market_id);
        true
    }

    /// Sells the filled leg at market. Fire-and-forget: a routing
    /// failure is logged and alerted but never propagated.
    async fn do_hedge(
        &self,
        market_id: &str,
        token_id: &str,
        side: Side,
        size: Decimal,
        trigger: HedgeTrigger,
    ) {
        let detail = format!(
            "market={market_id} side={} size={size} trigger={}",
            side.as_str(),
            trigger.as_str()
        );

        if self.simulated {
            info!(market_id, "simulated mode, hedge not routed");
            self.alerts.notify(AlertKind::Hedge, &detail);
            return;
        }

        if let Err(error) = self
            .router
            .place_hedge_sell(token_id, side, size, true)
            .await
        {
            warn!(market_id, token_id, %error, "hedge sell failed");
            self.alerts
                .notify(AlertKind::Error, &format!("hedge sell failed: {detail}"));
            return;
        }
        self.alerts.notify(AlertKind::Hedge, &detail);
    }
}

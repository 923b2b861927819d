//! Entry decision pipeline.
//!
//! For every market event the engine refreshes the book cache, then
//! runs the full gate sequence for the owning pair: breaker cooldown,
//! book completeness, price sanity, fee-adjusted edge, in-band depth,
//! the exposure cap, and the one-position-per-market rule. Only a pair
//! that clears every gate gets sized and routed.
//!
//! Placement failures feed one global consecutive-failure counter.
//! Failures on unrelated markets still count: a router that cannot
//! place orders is broken regardless of which market exposed it.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use parity_arb_core::config::EngineConfig;
use parity_arb_core::events::{MarketEvent, MarketEventKind};
use parity_arb_core::traits::{AlertKind, AlertSink, OrderRouter, PairOrder};
use parity_arb_core::types::MarketPair;
use parity_arb_store::PositionStore;

use crate::book::{depth_within_band, BookState};
use crate::fees::FeeCache;

/// Result of one entry evaluation. Every early exit names the gate
/// that stopped it so callers can log the funnel.
#[derive(Debug, Clone)]
pub enum TryArbOutcome {
    /// The circuit breaker's cooldown window is still open.
    CooldownActive,
    /// One or both legs have no observed ask yet.
    BookIncomplete,
    /// An observed ask is outside the open interval (0, 1).
    InvalidPricing,
    /// The implied-probability sum does not clear the dynamic edge.
    EdgeInsufficient {
        /// Sum of both legs' asks.
        sum: Decimal,
        /// Maximum sum that would still qualify.
        threshold: Decimal,
    },
    /// In-band depth on at least one leg is below the floor.
    DepthInsufficient,
    /// Open-market count is at the cap.
    ExposureCapReached,
    /// A position for this market already exists in the ledger.
    AlreadyEntered,
    /// The ledger could not be queried; the cycle was abandoned
    /// without placing anything.
    StoreUnavailable,
    /// Simulated mode: the order that WOULD have been placed.
    Simulated(PairOrder),
    /// Both legs were accepted by the exchange.
    Placed(PairOrder),
    /// Placement failed; the failure counter advanced.
    Rejected(PairOrder),
}

#[derive(Debug, Default)]
struct RiskState {
    consecutive_failures: u32,
    cooldown_until: Option<Instant>,
}

/// Evaluates markets for two-leg parity entries and routes them.
pub struct ArbDecisionEngine {
    config: EngineConfig,
    simulated: bool,
    book: Arc<BookState>,
    fees: Arc<FeeCache>,
    store: PositionStore,
    router: Arc<dyn OrderRouter>,
    alerts: Arc<dyn AlertSink>,
    risk: Mutex<RiskState>,
}

impl std::fmt::Debug for ArbDecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let risk = self.risk.lock();
        f.debug_struct("ArbDecisionEngine")
            .field("simulated", &self.simulated)
            .field("consecutive_failures", &risk.consecutive_failures)
            .field("in_cooldown", &risk.cooldown_until.is_some())
            .finish()
    }
}

impl ArbDecisionEngine {
    /// Wires the engine over its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        simulated: bool,
        book: Arc<BookState>,
        fees: Arc<FeeCache>,
        store: PositionStore,
        router: Arc<dyn OrderRouter>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            config,
            simulated,
            book,
            fees,
            store,
            router,
            alerts,
            risk: Mutex::new(RiskState::default()),
        }
    }

    /// Applies a canonical market event to the book cache.
    ///
    /// Best-ask updates overwrite depth with `price × size` (zero when
    /// the frame carries no size); snapshots recompute in-band depth
    /// over the full ladder. Last write wins in both directions.
    pub fn on_market_event(&self, event: &MarketEvent) {
        match &event.kind {
            MarketEventKind::BestAsk { price, size } => {
                let depth = size.map_or(Decimal::ZERO, |s| *price * s);
                self.book.update(&event.token_id, Some(*price), depth);
            }
            MarketEventKind::BookSnapshot { asks } => {
                // The adapter never emits an empty ladder, but this is
                // public API; an empty snapshot is dropped, not a
                // panic.
                let Some(best) = asks.first().map(|level| level.price) else {
                    return;
                };
                let depth = depth_within_band(asks, best, self.config.depth_band_pct);
                self.book.update(&event.token_id, Some(best), depth);
            }
        }
    }

    /// Whether the breaker's cooldown window is currently open.
    #[must_use]
    pub fn in_cooldown(&self) -> bool {
        self.risk
            .lock()
            .cooldown_until
            .is_some_and(|until| Instant::now() < until)
    }

    /// Runs the full gate sequence for `pair` and places (or simulates)
    /// an entry when every gate clears.
    ///
    /// Gates run cheapest first: cooldown, then the in-memory book,
    /// price, edge, and depth checks, and only then the ledger queries
    /// (exposure cap, one-position-per-market). The breaker advances
    /// when a placement fails, not as a standing gate; an entry is
    /// attempted iff every gate passes regardless of that ordering.
    pub async fn try_arb(&self, pair: &MarketPair) -> TryArbOutcome {
        if self.in_cooldown() {
            return TryArbOutcome::CooldownActive;
        }

        let yes = self.book.read(&pair.yes_token);
        let no = self.book.read(&pair.no_token);
        let (Some(ask_yes), Some(ask_no)) = (yes.best_ask, no.best_ask) else {
            return TryArbOutcome::BookIncomplete;
        };
        if !price_in_range(ask_yes) || !price_in_range(ask_no) {
            return TryArbOutcome::InvalidPricing;
        }

        let min_edge = self
            .fees
            .get_min_edge_dynamic(&pair.yes_token, &pair.no_token)
            .await;
        let sum = ask_yes + ask_no;
        let threshold = Decimal::ONE - min_edge;
        if sum >= threshold {
            return TryArbOutcome::EdgeInsufficient { sum, threshold };
        }

        if yes.depth_usd < self.config.min_depth_usd || no.depth_usd < self.config.min_depth_usd {
            return TryArbOutcome::DepthInsufficient;
        }

        // Ledger gates. A query failure abandons the cycle; the next
        // event retries from scratch.
        let open_markets = match self.store.count_open_markets().await {
            Ok(n) => n,
            Err(error) => {
                warn!(%error, "open-market count failed, skipping cycle");
                return TryArbOutcome::StoreUnavailable;
            }
        };
        if open_markets >= self.config.max_open_markets {
            debug!(
                market_id = %pair.market_id,
                open_markets,
                "exposure cap reached"
            );
            return TryArbOutcome::ExposureCapReached;
        }
        match self.store.position_exists(&pair.market_id).await {
            Ok(true) => return TryArbOutcome::AlreadyEntered,
            Ok(false) => {}
            Err(error) => {
                warn!(%error, "position lookup failed, skipping cycle");
                return TryArbOutcome::StoreUnavailable;
            }
        }

        let depth = yes.depth_usd.min(no.depth_usd);
        let size_usd = self
            .config
            .max_position_usd
            .min(self.config.sizing_fraction * depth);
        let avg_price = sum / Decimal::TWO;
        let shares = size_usd / avg_price;

        let order = PairOrder {
            market_id: pair.market_id.clone(),
            yes_token: pair.yes_token.clone(),
            no_token: pair.no_token.clone(),
            price_yes: ask_yes,
            price_no: ask_no,
            shares,
            size_usd,
        };

        info!(
            market_id = %pair.market_id,
            question = %pair.question,
            %sum,
            %threshold,
            %size_usd,
            %shares,
            simulated = self.simulated,
            "entry qualified"
        );
        self.audit_entry(&order, &pair.question, sum, threshold).await;

        if self.simulated {
            return TryArbOutcome::Simulated(order);
        }

        match self.router.place_orders(&order).await {
            Ok(true) => {
                self.risk.lock().consecutive_failures = 0;
                TryArbOutcome::Placed(order)
            }
            Ok(false) => {
                self.record_placement_failure(&order.market_id, "exchange rejected");
                TryArbOutcome::Rejected(order)
            }
            Err(error) => {
                self.record_placement_failure(&order.market_id, &error.to_string());
                TryArbOutcome::Rejected(order)
            }
        }
    }

    /// Advances the failure counter and trips the breaker at the
    /// threshold. Tripping resets the counter so evaluation resumes
    /// cleanly once the cooldown lapses.
    fn record_placement_failure(&self, market_id: &str, reason: &str) {
        let tripped = {
            let mut risk = self.risk.lock();
            risk.consecutive_failures += 1;
            if risk.consecutive_failures >= self.config.max_consecutive_failures {
                risk.consecutive_failures = 0;
                risk.cooldown_until =
                    Some(Instant::now() + Duration::from_secs(self.config.cooldown_secs));
                true
            } else {
                false
            }
        };

        warn!(market_id, reason, tripped, "order placement failed");
        if tripped {
            self.alerts.notify(
                AlertKind::CircuitBreaker,
                &format!(
                    "placement failures reached {}, pausing entries for {}s",
                    self.config.max_consecutive_failures, self.config.cooldown_secs
                ),
            );
        }
    }

    /// Best-effort audit record for a qualified entry.
    async fn audit_entry(&self, order: &PairOrder, question: &str, sum: Decimal, threshold: Decimal) {
        let payload = json!({
            "market_id": order.market_id,
            "question": question,
            "price_yes": order.price_yes.to_string(),
            "price_no": order.price_no.to_string(),
            "sum": sum.to_string(),
            "threshold": threshold.to_string(),
            "size_usd": order.size_usd.to_string(),
            "shares": order.shares.to_string(),
            "simulated": self.simulated,
        });
        if let Err(error) = self.store.log_event("entry", &payload).await {
            warn!(market_id = %order.market_id, %error, "audit write failed");
        }
    }
}

fn price_in_range(price: Decimal) -> bool {
    price > Decimal::ZERO && price < Decimal::ONE
}

//! Event-loop wiring: feed frames in, decisions out.
//!
//! The runtime owns no strategy logic. It normalizes raw feed frames,
//! routes them through the decision engine and the protection machine
//! for the owning market pair, persists fills, and runs the periodic
//! settlement sweep. Shutdown is cooperative via a watch channel.

use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use parity_arb_core::config::SettlementConfig;
use parity_arb_core::events::normalize;
use parity_arb_core::traits::{AlertKind, AlertSink, OrderRouter};
use parity_arb_core::types::MarketPair;
use parity_arb_store::{PositionStatus, PositionStore};

use crate::book::BookState;
use crate::engine::ArbDecisionEngine;
use crate::protection::ProtectionStateMachine;

/// Tradable pairs as last published by the discovery collaborator.
#[derive(Debug, Default)]
pub struct MarketRegistry {
    pairs: RwLock<Vec<MarketPair>>,
}

impl MarketRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the tradable set wholesale.
    pub fn update(&self, pairs: Vec<MarketPair>) {
        *self.pairs.write() = pairs;
    }

    /// The pair one of whose legs is `token_id`, if tracked.
    #[must_use]
    pub fn pair_for_token(&self, token_id: &str) -> Option<MarketPair> {
        self.pairs
            .read()
            .iter()
            .find(|p| p.owns_token(token_id))
            .cloned()
    }

    /// The pair for `market_id`, if tracked.
    #[must_use]
    pub fn pair_for_market(&self, market_id: &str) -> Option<MarketPair> {
        self.pairs
            .read()
            .iter()
            .find(|p| p.market_id == market_id)
            .cloned()
    }
}

/// Cumulative fill totals for one market, as reported by the exchange
/// user channel. Totals, not deltas.
#[derive(Debug, Clone)]
pub struct FillUpdate {
    /// Market the fills belong to.
    pub market_id: String,
    /// YES leg token id.
    pub yes_token: String,
    /// NO leg token id.
    pub no_token: String,
    /// Total filled YES shares.
    pub yes_filled: Decimal,
    /// Total filled NO shares.
    pub no_filled: Decimal,
    /// Average YES fill price.
    pub fill_price_yes: Decimal,
    /// Average NO fill price.
    pub fill_price_no: Decimal,
}

/// Wires feed frames and fill reports through the decision pipeline.
pub struct ArbRuntime {
    settlement: SettlementConfig,
    simulated: bool,
    registry: Arc<MarketRegistry>,
    book: Arc<BookState>,
    engine: Arc<ArbDecisionEngine>,
    protection: Arc<ProtectionStateMachine>,
    store: PositionStore,
    router: Arc<dyn OrderRouter>,
    alerts: Arc<dyn AlertSink>,
}

impl ArbRuntime {
    /// Wires the runtime over its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settlement: SettlementConfig,
        simulated: bool,
        registry: Arc<MarketRegistry>,
        book: Arc<BookState>,
        engine: Arc<ArbDecisionEngine>,
        protection: Arc<ProtectionStateMachine>,
        store: PositionStore,
        router: Arc<dyn OrderRouter>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            settlement,
            simulated,
            registry,
            book,
            engine,
            protection,
            store,
            router,
            alerts,
        }
    }

    /// Consumes frames and fills until the stop signal flips true or
    /// both senders hang up. The settlement sweep runs on its own
    /// interval inside the same loop.
    pub async fn run(
        self: Arc<Self>,
        mut frames: mpsc::Receiver<serde_json::Value>,
        mut fills: mpsc::Receiver<FillUpdate>,
        mut stop: watch::Receiver<bool>,
    ) {
        let mut sweep =
            tokio::time::interval(Duration::from_secs(self.settlement.check_interval_secs.max(1)));
        // The first tick is immediate; skip it so startup is quiet.
        sweep.tick().await;

        info!(simulated = self.simulated, "runtime started");
        loop {
            tokio::select! {
                frame = frames.recv() => {
                    match frame {
                        Some(frame) => self.handle_frame(&frame).await,
                        None => break,
                    }
                }
                fill = fills.recv() => {
                    match fill {
                        Some(fill) => self.on_fill_update(&fill).await,
                        None => break,
                    }
                }
                _ = sweep.tick() => {
                    self.settlement_sweep().await;
                }
                changed = stop.changed() => {
                    // A dropped sender counts as a stop request.
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        info!("runtime stopped");
    }

    /// Normalizes one raw frame and runs the decision cycle for the
    /// owning pair. Unknown frames and untracked tokens are dropped.
    pub async fn handle_frame(&self, frame: &serde_json::Value) {
        let Some(event) = normalize(frame) else {
            return;
        };
        self.engine.on_market_event(&event);

        let Some(pair) = self.registry.pair_for_token(&event.token_id) else {
            debug!(token_id = %event.token_id, "event for untracked token");
            return;
        };
        if !pair.enable_order_book {
            debug!(market_id = %pair.market_id, "market has no order book, skipping");
            return;
        }

        // A pending one-sided position takes priority over new entries
        // for its market.
        if self.protection.is_pending(&pair.market_id) {
            let ask_yes = self.book.read(&pair.yes_token).best_ask;
            let ask_no = self.book.read(&pair.no_token).best_ask;
            self.protection
                .check_and_hedge(&pair.market_id, &pair.yes_token, &pair.no_token, ask_yes, ask_no)
                .await;
            return;
        }

        let outcome = self.engine.try_arb(&pair).await;
        debug!(market_id = %pair.market_id, ?outcome, "decision cycle");
    }

    /// Persists a fill report and hands the exposure to the protection
    /// machine. Ledger failures are logged; in-memory tracking still
    /// proceeds so protection never depends on the disk.
    pub async fn on_fill_update(&self, fill: &FillUpdate) {
        let cost_yes = fill.yes_filled * fill.fill_price_yes;
        let cost_no = fill.no_filled * fill.fill_price_no;

        let persisted = match self.store.position_exists(&fill.market_id).await {
            Ok(true) => {
                self.store
                    .update_fills(
                        &fill.market_id,
                        fill.yes_filled,
                        fill.no_filled,
                        cost_yes,
                        cost_no,
                    )
                    .await
            }
            Ok(false) => {
                self.store
                    .open_position(
                        &fill.market_id,
                        &fill.yes_token,
                        &fill.no_token,
                        fill.yes_filled,
                        fill.no_filled,
                        cost_yes,
                        cost_no,
                    )
                    .await
            }
            Err(error) => Err(error),
        };
        if let Err(error) = persisted {
            warn!(market_id = %fill.market_id, %error, "fill persistence failed");
        }

        self.alerts.notify(
            AlertKind::Fill,
            &format!(
                "market={} yes={} no={}",
                fill.market_id, fill.yes_filled, fill.no_filled
            ),
        );

        self.protection.register_partial_fill(
            &fill.market_id,
            fill.yes_filled,
            fill.no_filled,
            fill.fill_price_yes,
            fill.fill_price_no,
        );
        let ask_yes = self.book.read(&fill.yes_token).best_ask;
        let ask_no = self.book.read(&fill.no_token).best_ask;
        self.protection
            .check_and_hedge(&fill.market_id, &fill.yes_token, &fill.no_token, ask_yes, ask_no)
            .await;
    }

    /// One pass over open positions: settle expired markets, cancel
    /// resting orders near expiry. Each failure is logged and the scan
    /// continues with the next position.
    pub async fn settlement_sweep(&self) {
        let open = match self.store.get_open_positions().await {
            Ok(open) => open,
            Err(error) => {
                warn!(%error, "settlement sweep cannot read the ledger");
                return;
            }
        };

        let now = Utc::now();
        for position in open {
            let Some(pair) = self.registry.pair_for_market(&position.market_id) else {
                continue;
            };
            let Some(secs) = pair.seconds_to_expiry(now) else {
                continue;
            };

            if secs <= 0 {
                info!(market_id = %position.market_id, "market expired, settling");
                if let Err(error) = self
                    .store
                    .update_status(&position.market_id, PositionStatus::Settled)
                    .await
                {
                    warn!(market_id = %position.market_id, %error, "settle update failed");
                    continue;
                }
                self.protection.clear_market(&position.market_id);
                self.audit("settlement", &position.market_id, secs).await;
            } else if secs <= i64::try_from(self.settlement.auto_cancel_before_expiry_secs)
                .unwrap_or(i64::MAX)
            {
                info!(
                    market_id = %position.market_id,
                    secs,
                    "expiry imminent, cancelling resting orders"
                );
                if !self.simulated {
                    if let Err(error) =
                        self.router.cancel_market_orders(&position.market_id).await
                    {
                        warn!(market_id = %position.market_id, %error, "auto-cancel failed");
                        continue;
                    }
                }
                self.audit("auto_cancel", &position.market_id, secs).await;
            }
        }
    }

    async fn audit(&self, event_type: &str, market_id: &str, secs_to_expiry: i64) {
        let payload = json!({
            "market_id": market_id,
            "secs_to_expiry": secs_to_expiry,
        });
        if let Err(error) = self.store.log_event(event_type, &payload).await {
            warn!(market_id, %error, "audit write failed");
        }
    }
}

//! End-to-end pipeline scenarios over real wire frames and a real
//! on-disk ledger. Routing and alerting use in-test doubles.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

use parity_arb_core::config::ArbConfig;
use parity_arb_core::traits::{AlertKind, AlertSink, FeeRateSource, OrderRouter, PairOrder};
use parity_arb_core::types::{MarketPair, Side};
use parity_arb_engine::{
    ArbDecisionEngine, ArbRuntime, BookState, FeeCache, FillUpdate, MarketRegistry,
    ProtectionStateMachine,
};
use parity_arb_store::PositionStore;

#[derive(Default)]
struct RecordingRouter {
    accept: Mutex<bool>,
    placed: Mutex<Vec<PairOrder>>,
    hedged: Mutex<Vec<(String, Side, Decimal, bool)>>,
}

impl RecordingRouter {
    fn accepting() -> Self {
        Self {
            accept: Mutex::new(true),
            ..Self::default()
        }
    }
}

#[async_trait]
impl OrderRouter for RecordingRouter {
    async fn place_orders(&self, order: &PairOrder) -> Result<bool> {
        if *self.accept.lock() {
            self.placed.lock().push(order.clone());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn place_hedge_sell(
        &self,
        token_id: &str,
        side: Side,
        size: Decimal,
        is_market: bool,
    ) -> Result<()> {
        self.hedged
            .lock()
            .push((token_id.to_string(), side, size, is_market));
        Ok(())
    }

    async fn cancel_market_orders(&self, _market_id: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSink {
    alerts: Mutex<Vec<(AlertKind, String)>>,
}

impl AlertSink for RecordingSink {
    fn notify(&self, kind: AlertKind, detail: &str) {
        self.alerts.lock().push((kind, detail.to_string()));
    }
}

struct SmallFees;

#[async_trait]
impl FeeRateSource for SmallFees {
    async fn fetch_fee_rate(&self, _token_id: &str) -> Result<Decimal> {
        Ok(dec!(0.001))
    }
}

struct Stack {
    _dir: TempDir,
    runtime: Arc<ArbRuntime>,
    registry: Arc<MarketRegistry>,
    store: PositionStore,
    router: Arc<RecordingRouter>,
    sink: Arc<RecordingSink>,
}

async fn stack(simulated: bool) -> Stack {
    let dir = TempDir::new().unwrap();
    let store = PositionStore::open(dir.path().join("ledger.db"))
        .await
        .unwrap();
    let config = ArbConfig {
        simulated,
        ..ArbConfig::default()
    };
    let book = Arc::new(BookState::new());
    let fees = Arc::new(FeeCache::new(Arc::new(SmallFees), &config.engine));
    let router = Arc::new(RecordingRouter::accepting());
    let sink = Arc::new(RecordingSink::default());
    let alerts: Arc<dyn AlertSink> = sink.clone();
    let engine = Arc::new(ArbDecisionEngine::new(
        config.engine.clone(),
        config.simulated,
        book.clone(),
        fees,
        store.clone(),
        router.clone(),
        alerts.clone(),
    ));
    let protection = Arc::new(ProtectionStateMachine::new(
        config.protection.clone(),
        config.simulated,
        router.clone(),
        alerts.clone(),
    ));
    let registry = Arc::new(MarketRegistry::new());
    registry.update(vec![MarketPair {
        market_id: "0xmarket".to_string(),
        yes_token: "yes-tok".to_string(),
        no_token: "no-tok".to_string(),
        end_time: None,
        enable_order_book: true,
        question: "pipeline scenario".to_string(),
    }]);
    let runtime = Arc::new(ArbRuntime::new(
        config.settlement,
        config.simulated,
        registry.clone(),
        book,
        engine,
        protection,
        store.clone(),
        router.clone(),
        alerts,
    ));

    Stack {
        _dir: dir,
        runtime,
        registry,
        store,
        router,
        sink,
    }
}

fn best_ask_frame(token: &str, price: &str, size: &str) -> serde_json::Value {
    json!({
        "event_type": "best_bid_ask",
        "asset_id": token,
        "ask_price": price,
        "ask_size": size,
    })
}

#[tokio::test]
async fn profitable_book_places_a_sized_entry() {
    let s = stack(false).await;

    // Depth arrives as price × size: 1000 and 500 dollars.
    s.runtime
        .handle_frame(&best_ask_frame("yes-tok", "0.46", "2173.92"))
        .await;
    s.runtime
        .handle_frame(&best_ask_frame("no-tok", "0.50", "1000"))
        .await;

    let placed = s.router.placed.lock();
    assert_eq!(placed.len(), 1);
    let order = &placed[0];
    assert_eq!(order.market_id, "0xmarket");
    // min(400, 0.40 × min(~1000, 500)) = 200.
    assert_eq!(order.size_usd, dec!(200));
    assert_eq!(order.price_yes, dec!(0.46));
    assert_eq!(order.price_no, dec!(0.50));
}

#[tokio::test]
async fn one_sided_fill_then_stop_loss_hedge() {
    let s = stack(false).await;

    // YES fills at 0.50, then its own ask drops to 0.48, a 4% adverse
    // move past the 3% stop.
    s.runtime
        .handle_frame(&best_ask_frame("yes-tok", "0.50", "1000"))
        .await;
    s.runtime
        .on_fill_update(&FillUpdate {
            market_id: "0xmarket".to_string(),
            yes_token: "yes-tok".to_string(),
            no_token: "no-tok".to_string(),
            yes_filled: dec!(100),
            no_filled: dec!(0),
            fill_price_yes: dec!(0.50),
            fill_price_no: dec!(0.50),
        })
        .await;

    // Position persisted and protection armed; nothing hedged yet.
    assert_eq!(s.store.get_open_positions().await.unwrap().len(), 1);
    assert!(s.router.hedged.lock().is_empty());

    // Adverse move on the filled leg's own book.
    s.runtime
        .handle_frame(&best_ask_frame("yes-tok", "0.48", "1000"))
        .await;

    let hedged = s.router.hedged.lock();
    assert_eq!(hedged.len(), 1);
    let (token, side, size, is_market) = &hedged[0];
    assert_eq!(token, "yes-tok");
    assert_eq!(*side, Side::Yes);
    assert_eq!(*size, dec!(100));
    // Every hedge goes out at market; the record is already cleared.
    assert!(*is_market);

    let kinds: Vec<AlertKind> = s.sink.alerts.lock().iter().map(|(k, _)| *k).collect();
    assert!(kinds.contains(&AlertKind::Fill));
    assert!(kinds.contains(&AlertKind::Hedge));
}

#[tokio::test]
async fn breaker_alerts_once_and_pauses_entries() {
    let s = stack(false).await;
    *s.router.accept.lock() = false;

    s.runtime
        .handle_frame(&best_ask_frame("yes-tok", "0.46", "5000"))
        .await;
    // Each NO frame completes the book again and re-triggers the
    // evaluation; three rejections trip the breaker.
    for _ in 0..3 {
        s.runtime
            .handle_frame(&best_ask_frame("no-tok", "0.50", "5000"))
            .await;
    }

    let breaker_alerts = s
        .sink
        .alerts
        .lock()
        .iter()
        .filter(|(k, _)| *k == AlertKind::CircuitBreaker)
        .count();
    assert_eq!(breaker_alerts, 1);

    // With the cooldown open, a now-accepting router still gets
    // nothing.
    *s.router.accept.lock() = true;
    s.runtime
        .handle_frame(&best_ask_frame("no-tok", "0.50", "5000"))
        .await;
    assert!(s.router.placed.lock().is_empty());
}

#[tokio::test]
async fn simulated_stack_never_touches_the_router() {
    let s = stack(true).await;

    s.runtime
        .handle_frame(&best_ask_frame("yes-tok", "0.46", "5000"))
        .await;
    s.runtime
        .handle_frame(&best_ask_frame("no-tok", "0.50", "5000"))
        .await;
    s.runtime
        .on_fill_update(&FillUpdate {
            market_id: "0xmarket".to_string(),
            yes_token: "yes-tok".to_string(),
            no_token: "no-tok".to_string(),
            yes_filled: dec!(10),
            no_filled: dec!(0),
            fill_price_yes: dec!(0.80),
            fill_price_no: dec!(0.20),
        })
        .await;

    assert!(s.router.placed.lock().is_empty());
    assert!(s.router.hedged.lock().is_empty());
    // The would-be entry and the simulated hedge are still audited and
    // alerted.
    assert!(s.store.count_events().await.unwrap() >= 1);
    let kinds: Vec<AlertKind> = s.sink.alerts.lock().iter().map(|(k, _)| *k).collect();
    assert!(kinds.contains(&AlertKind::Hedge));
}

#[tokio::test]
async fn ledger_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.db");

    {
        let store = PositionStore::open(&path).await.unwrap();
        store
            .open_position("0xmarket", "yes-tok", "no-tok", dec!(10), dec!(10), dec!(4.6), dec!(5))
            .await
            .unwrap();
    }

    let store = PositionStore::open(&path).await.unwrap();
    assert_eq!(store.count_open_markets().await.unwrap(), 1);
    let open = store.get_open_positions().await.unwrap();
    assert_eq!(open[0].market_id, "0xmarket");
    assert_eq!(open[0].yes_filled, dec!(10));

    // An untracked market in the registry does not block the count;
    // the exposure cap keys off the ledger alone.
    let registry = MarketRegistry::new();
    assert!(registry.pair_for_market("0xmarket").is_none());
}

//! Core types, canonical events, and collaborator traits for the
//! parity arbitrage engine.
//!
//! Binary-outcome prediction markets quote a YES token and a NO token
//! that should jointly price near $1.00. When the two best asks sum to
//! less than $1.00 minus fees, buying both legs locks in the gap:
//!
//! ```text
//! YES ask: $0.46
//! NO ask:  $0.50
//! Cost:    $0.96  →  payout $1.00  →  gross edge $0.04
//! ```
//!
//! This crate holds everything the decision engine and the position
//! store share: the [`MarketPair`] descriptor supplied by discovery,
//! the canonical [`events::MarketEvent`] that the wire adapter
//! produces, the collaborator traits in [`traits`] (order routing, fee
//! lookup, alerting), and the [`config`] structs with their figment
//! loader.
//!
//! The engine never sees a raw wire frame: every upstream payload is
//! normalized through [`events::normalize`] before it reaches the
//! decision pipeline, and unknown frame kinds are dropped there.

pub mod alerts;
pub mod config;
pub mod config_loader;
pub mod events;
pub mod traits;
pub mod types;

pub use alerts::TracingAlertSink;
pub use config::{
    ArbConfig, EngineConfig, ProtectionConfig, SettlementConfig, StoreConfig,
};
pub use config_loader::{ConfigError, ConfigLoader};
pub use events::{normalize, MarketEvent, MarketEventKind, PriceLevel};
pub use traits::{AlertKind, AlertSink, FeeRateSource, OrderRouter, PairOrder};
pub use types::{MarketPair, Side};

//! Real-time decision pipeline for binary-market parity arbitrage.
//!
//! A binary market's YES and NO tokens settle to exactly one dollar
//! combined. When the two asks sum below one dollar by more than the
//! fee-adjusted edge, buying equal shares of both legs locks the
//! difference. This crate turns a market-event stream into those
//! entries and guards the one-sided window between the two fills:
//!
//! - [`book::BookState`] caches best ask and in-band depth per token;
//! - [`fees::FeeCache`] prices the dynamic entry threshold;
//! - [`engine::ArbDecisionEngine`] runs the gate sequence and routes
//!   qualified entries, with a global circuit breaker on placement
//!   failures;
//! - [`protection::ProtectionStateMachine`] hedges one-sided fills by
//!   upside lock, stop-loss, or timer, in that priority;
//! - [`runtime::ArbRuntime`] wires the stream, the ledger, and the
//!   periodic settlement sweep together.

pub mod book;
pub mod engine;
pub mod fees;
pub mod protection;
pub mod runtime;

pub use book::{BookEntry, BookState};
pub use engine::{ArbDecisionEngine, TryArbOutcome};
pub use fees::FeeCache;
pub use protection::{HedgeTrigger, ProtectionStateMachine};
pub use runtime::{ArbRuntime, FillUpdate, MarketRegistry};

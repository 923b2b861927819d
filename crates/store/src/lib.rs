//! Durable position ledger and append-only audit log.
//!
//! Positions and events live in a single SQLite file so the engine's
//! exposure cap and the settlement sweep survive restarts. SQLite has
//! no `DECIMAL` affinity, so monetary columns are stored as exact
//! decimal strings and parsed back on read.
//!
//! Persistence is best-effort from the decision pipeline's view:
//! callers log write failures and keep going with in-memory state.

pub mod store;

pub use store::{PositionRow, PositionStatus, PositionStore};

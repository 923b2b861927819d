//! Default alert sink backed by `tracing`.
//!
//! Alert transport (Telegram, pager, ...) is an external collaborator;
//! this sink keeps the engine observable when none is wired in.

use tracing::{error, warn};

use crate::traits::{AlertKind, AlertSink};

/// Alert sink that writes structured log records instead of delivering
/// anywhere. Safe default for simulated runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn notify(&self, kind: AlertKind, detail: &str) {
        match kind {
            AlertKind::Error => error!(kind = kind.as_str(), detail, "operator alert"),
            _ => warn!(kind = kind.as_str(), detail, "operator alert"),
        }
    }
}

//! Configuration for the arbitrage core.
//!
//! Every tunable has a coded default matching the values the strategy
//! was tuned with; the loader only overrides what the operator sets.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbConfig {
    /// When true, no order ever reaches the exchange: entries and
    /// hedges are logged/alerted instead. Safe default.
    pub simulated: bool,
    /// Entry-gate and sizing parameters.
    pub engine: EngineConfig,
    /// One-sided-exposure guard parameters.
    pub protection: ProtectionConfig,
    /// Position ledger parameters.
    pub store: StoreConfig,
    /// Settlement sweep parameters.
    pub settlement: SettlementConfig,
}

impl Default for ArbConfig {
    fn default() -> Self {
        Self {
            simulated: true,
            engine: EngineConfig::default(),
            protection: ProtectionConfig::default(),
            store: StoreConfig::default(),
            settlement: SettlementConfig::default(),
        }
    }
}

/// Entry gating, profitability threshold, and sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base profitability edge required before fees (decimal).
    pub min_base_edge: Decimal,

    /// Conservative buffer added on top of the fee rate (decimal).
    pub safety_buffer: Decimal,

    /// Hard cap on notional per entry, in dollars.
    pub max_position_usd: Decimal,

    /// Minimum in-band depth required on BOTH legs, in dollars.
    pub min_depth_usd: Decimal,

    /// Ask levels priced within this fraction above the best ask count
    /// toward depth.
    pub depth_band_pct: Decimal,

    /// Fraction of the thinner leg's depth the entry may consume.
    pub sizing_fraction: Decimal,

    /// Maximum number of concurrently open markets.
    pub max_open_markets: u32,

    /// Consecutive placement failures that trip the circuit breaker.
    pub max_consecutive_failures: u32,

    /// Cooldown after the breaker trips, in seconds.
    pub cooldown_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_base_edge: dec!(0.025),
            safety_buffer: dec!(0.005),
            max_position_usd: dec!(400),
            min_depth_usd: dec!(300),
            depth_band_pct: dec!(0.005),
            sizing_fraction: dec!(0.40),
            max_open_markets: 15,
            max_consecutive_failures: 3,
            cooldown_secs: 300,
        }
    }
}

/// One-sided-exposure guard thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Filled-leg fill price at or above which the upside lock sells
    /// immediately.
    pub protection_pct: Decimal,

    /// Relative drop of the filled leg's ask below its fill price that
    /// triggers the stop-loss.
    pub adverse_move_pct: Decimal,

    /// Maximum seconds a one-sided position may be carried before the
    /// timer forces a market-style sell.
    pub protection_timer_secs: u64,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            protection_pct: dec!(0.72),
            adverse_move_pct: dec!(0.03),
            protection_timer_secs: 30,
        }
    }
}

/// Position ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "parity_arb.db".to_string(),
        }
    }
}

/// Settlement sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Sweep interval in seconds.
    pub check_interval_secs: u64,

    /// Open orders are cancelled this many seconds before expiry.
    pub auto_cancel_before_expiry_secs: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
            auto_cancel_before_expiry_secs: 90,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tuned_values() {
        let config = ArbConfig::default();
        assert!(config.simulated);
        assert_eq!(config.engine.min_base_edge, dec!(0.025));
        assert_eq!(config.engine.safety_buffer, dec!(0.005));
        assert_eq!(config.engine.max_position_usd, dec!(400));
        assert_eq!(config.engine.min_depth_usd, dec!(300));
        assert_eq!(config.engine.sizing_fraction, dec!(0.40));
        assert_eq!(config.engine.max_open_markets, 15);
        assert_eq!(config.engine.max_consecutive_failures, 3);
        assert_eq!(config.engine.cooldown_secs, 300);
        assert_eq!(config.protection.protection_pct, dec!(0.72));
        assert_eq!(config.protection.protection_timer_secs, 30);
        assert_eq!(config.protection.adverse_move_pct, dec!(0.03));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: ArbConfig = toml::from_str(
            r#"
            simulated = false

            [engine]
            max_position_usd = "250"
            "#,
        )
        .unwrap();

        assert!(!config.simulated);
        assert_eq!(config.engine.max_position_usd, dec!(250));
        // Untouched fields keep their defaults.
        assert_eq!(config.engine.min_depth_usd, dec!(300));
        assert_eq!(config.protection.protection_pct, dec!(0.72));
    }
}

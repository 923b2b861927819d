//! Layered configuration loading.
//!
//! Precedence, lowest to highest: coded defaults, `config/Config.toml`,
//! an optional profile overlay, then `PARITY_`-prefixed environment
//! variables (double underscore for nesting).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use thiserror::Error;

use crate::config::ArbConfig;

/// Configuration could not be assembled.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A present file failed to parse or a value failed to coerce.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] figment::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by merging `config/Config.toml` with
    /// `PARITY_`-prefixed environment variables. Missing files fall
    /// back to coded defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a present configuration file cannot be
    /// parsed.
    pub fn load() -> Result<ArbConfig, ConfigError> {
        let config: ArbConfig = Figment::from(Serialized::defaults(ArbConfig::default()))
            .merge(Toml::file("config/Config.toml"))
            .merge(Env::prefixed("PARITY_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Loads configuration with a named profile overlay
    /// (`config/Config.<profile>.toml`).
    ///
    /// # Errors
    ///
    /// Returns an error if a present configuration file cannot be
    /// parsed.
    pub fn load_with_profile(profile: &str) -> Result<ArbConfig, ConfigError> {
        let config: ArbConfig = Figment::from(Serialized::defaults(ArbConfig::default()))
            .merge(Toml::file("config/Config.toml"))
            .merge(Toml::file(format!("config/Config.{profile}.toml")))
            .merge(Env::prefixed("PARITY_").split("__"))
            .extract()?;

        Ok(config)
    }
}

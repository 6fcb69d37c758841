//! TOML configuration for a quotegrid installation.
//!
//! ```toml
//! [store]
//! prices = "data/prices.csv"
//! daily = "data/daily.csv"
//!
//! [refresh]
//! symbols = ["SPY", "VWRL.L"]
//! lookback_days = 730
//!
//! [fetch]
//! max_chunk_symbols = 10
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::{FetchConfig, ProviderConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteGridConfig {
    pub store: StoreConfig,
    pub refresh: RefreshConfig,
    pub fetch: FetchConfig,
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Sparse price store.
    pub prices: PathBuf,
    /// Dense daily output, one row per calendar day.
    pub daily: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            prices: PathBuf::from("data/prices.csv"),
            daily: PathBuf::from("data/daily.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub symbols: Vec<String>,
    /// Default refresh window, counted back from today.
    pub lookback_days: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            lookback_days: 730,
        }
    }
}

impl QuoteGridConfig {
    /// Load and validate. Relative store paths resolve against the file's
    /// directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.store.prices = base.join(&config.store.prices);
            config.store.daily = base.join(&config.store.daily);
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fetch.validate()?;
        self.provider.validate()?;
        if self.refresh.lookback_days == 0 {
            return Err(ConfigError::Invalid("refresh.lookback_days must be > 0".into()));
        }
        if let Some(bad) = self.refresh.symbols.iter().find(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("refresh.symbols has a blank entry {bad:?}")));
        }
        Ok(())
    }
}

//! Tuning for chunked fetches and the HTTP quote provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Chunking and retry policy, handed to the orchestrator at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Most symbols one provider request may carry.
    pub max_chunk_symbols: usize,
    /// Longest date span, in days, one request may cover.
    pub max_chunk_interval_days: u32,
    /// Attempts per chunk, including the first.
    pub retries: u32,
    /// Fixed delay between attempts of one chunk.
    pub backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_chunk_symbols: 10,
            max_chunk_interval_days: 365,
            retries: 3,
            backoff_ms: 2000,
        }
    }
}

impl FetchConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chunk_symbols == 0 {
            return Err(ConfigError::Invalid("fetch.max_chunk_symbols must be > 0".into()));
        }
        if self.max_chunk_interval_days == 0 {
            return Err(ConfigError::Invalid(
                "fetch.max_chunk_interval_days must be > 0".into(),
            ));
        }
        if self.retries == 0 {
            return Err(ConfigError::Invalid("fetch.retries must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub timeout_secs: u64,
    /// HTTP-level retries for transient failures within one request.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub breaker_cooldown_secs: u64,
    pub breaker_failure_threshold: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 500,
            breaker_cooldown_secs: 30 * 60,
            breaker_failure_threshold: 3,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("provider.timeout_secs must be > 0".into()));
        }
        if self.breaker_failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "provider.breaker_failure_threshold must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(FetchConfig::default().validate().is_ok());
        assert!(ProviderConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_retries_rejected() {
        let cfg = FetchConfig {
            retries: 0,
            ..FetchConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: FetchConfig = toml::from_str("max_chunk_symbols = 4").unwrap();
        assert_eq!(cfg.max_chunk_symbols, 4);
        assert_eq!(cfg.max_chunk_interval_days, 365);
        assert_eq!(cfg.retries, 3);
    }
}

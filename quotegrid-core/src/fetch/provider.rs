//! Quote provider trait and its per-request error type.
//!
//! A provider answers one symbol at a time. Batching, retries across
//! attempts and result bookkeeping live above it in the orchestrator.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One close price as reported by the provider, stamped at market close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: NaiveDateTime,
    pub close: f64,
}

/// Why a single provider request produced no data.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("provider is refusing requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("provider error: {0}")]
    Other(String),
}

pub trait QuoteProvider {
    fn name(&self) -> &str;

    /// Close prices over `[start, end)`, ascending.
    fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, ProviderError>;

    fn live_price(&self, symbol: &str) -> Result<f64, ProviderError>;

    /// ISO currency code the symbol is quoted in.
    fn currency(&self, symbol: &str) -> Result<String, ProviderError>;

    /// False while the provider is known to refuse requests.
    fn is_available(&self) -> bool;
}

//! Yahoo Finance quote provider over the v8 chart API.
//!
//! One chart request answers all three query kinds: the close series for
//! history, `meta.currency` for currency lookups and
//! `meta.regularMarketPrice` for live prices.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::config::ProviderConfig;
use super::provider::{PricePoint, ProviderError, QuoteProvider};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    currency: Option<String>,
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(config: &ProviderConfig, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
        })
    }

    /// Chart URL for `[start, end)`. `period2` is exclusive upstream too.
    fn history_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d"
        )
    }

    fn snapshot_url(symbol: &str) -> String {
        format!("https://query2.finance.yahoo.com/v8/finance/chart/{symbol}?range=1d&interval=1d")
    }

    fn first_result(symbol: &str, resp: ChartResponse) -> Result<ChartData, ProviderError> {
        let results = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => ProviderError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                ProviderError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => ProviderError::ResponseFormatChanged("empty result with no error".into()),
        })?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ResponseFormatChanged("result array is empty".into()))
    }

    fn parse_history(symbol: &str, data: ChartData) -> Result<Vec<PricePoint>, ProviderError> {
        let timestamps = data.timestamp.unwrap_or_default();
        let closes = data
            .indicators
            .and_then(|i| i.quote.into_iter().next())
            .map(|q| q.close)
            .unwrap_or_default();

        let mut points = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            // Holidays come back as null closes.
            let Some(close) = closes.get(i).copied().flatten() else {
                continue;
            };
            let timestamp = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| ProviderError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;
            points.push(PricePoint { timestamp, close });
        }

        if points.is_empty() {
            return Err(ProviderError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(points)
    }

    /// One chart request with transient-failure retry and breaker checks.
    fn get_chart(&self, symbol: &str, url: &str) -> Result<ChartData, ProviderError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(symbol, attempt, delay_ms = delay.as_millis() as u64, "retrying chart request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(ProviderError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(ProviderError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(ProviderError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(ProviderError::CircuitBreakerTripped);
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!(symbol, retry_after, "rate limited");
                last_error = Some(ProviderError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ProviderError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(ProviderError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                ProviderError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
            })?;
            let data = Self::first_result(symbol, chart)?;
            self.circuit_breaker.record_success();
            return Ok(data);
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Other("max retries exceeded".into())))
    }
}

impl QuoteProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, ProviderError> {
        let data = self.get_chart(symbol, &Self::history_url(symbol, start, end))?;
        Self::parse_history(symbol, data)
    }

    fn live_price(&self, symbol: &str) -> Result<f64, ProviderError> {
        let data = self.get_chart(symbol, &Self::snapshot_url(symbol))?;
        data.meta
            .regular_market_price
            .ok_or_else(|| ProviderError::ResponseFormatChanged("no regularMarketPrice".into()))
    }

    fn currency(&self, symbol: &str) -> Result<String, ProviderError> {
        let data = self.get_chart(symbol, &Self::snapshot_url(symbol))?;
        data.meta
            .currency
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::ResponseFormatChanged("no currency in meta".into()))
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

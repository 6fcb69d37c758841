//! Chunked, retried multi-symbol fetches.
//!
//! A job is cut into chunks of at most `max_chunk_symbols` symbols by
//! `max_chunk_interval_days` days. Each chunk runs against the backend up to
//! `retries` times, retrying only the symbols that failed, and the attempts
//! and chunks are then folded back into one job over the full range.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::backend::{QuoteBackend, QuoteRequest};
use super::config::FetchConfig;
use super::error::FetchError;
use super::job::{parse_rows, split_interval, FetchJob, QUERY_STRIDE};
use super::reporter::{StatusReporter, TracingReporter};
use super::state::Outcome;
use crate::grid::Grid;

/// Counters for one orchestrated fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchSummary {
    pub chunks: usize,
    /// Chunks with no eligible symbols; no request was issued for them.
    pub skipped_chunks: usize,
    pub requests: usize,
    pub retries: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Symbols marked do-not-attempt.
    pub skipped: usize,
}

pub struct FetchOrchestrator<B> {
    config: FetchConfig,
    backend: B,
    reporter: Box<dyn StatusReporter>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<B: QuoteBackend> FetchOrchestrator<B> {
    pub fn new(config: FetchConfig, backend: B) -> Self {
        Self {
            config,
            backend,
            reporter: Box::new(TracingReporter),
            cancel: None,
        }
    }

    pub fn with_reporter(mut self, reporter: impl StatusReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Checked before each chunk starts; a chunk in flight always finishes.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Cross product of symbol groups and date sub-ranges, symbol group
    /// major. Each chunk inherits eligibility and known currencies.
    pub fn create_chunk_jobs(&self, job: &FetchJob) -> Result<Vec<FetchJob>, FetchError> {
        let spans = split_interval(job.start(), job.end(), self.config.max_chunk_interval_days);
        let mut chunks = Vec::new();
        for group in job.symbols().all().chunks(self.config.max_chunk_symbols.max(1)) {
            for &(start, end) in &spans {
                chunks.push(job.sub_job(group.iter().map(String::as_str), start, end)?);
            }
        }
        Ok(chunks)
    }

    /// Fetch every eligible symbol of `job` over its range.
    pub fn fetch(&mut self, mut job: FetchJob) -> Result<(FetchJob, FetchSummary), FetchError> {
        let chunks = self.create_chunk_jobs(&job)?;
        let total = chunks.len();
        let mut summary = FetchSummary {
            chunks: total,
            skipped: job.symbols().do_not_attempt_fetch().len(),
            ..FetchSummary::default()
        };
        info!(
            symbols = job.symbols().len(),
            start = %job.start(),
            end = %job.end(),
            chunks = total,
            "starting price fetch"
        );

        let mut results = Vec::with_capacity(total);
        for (i, chunk) in chunks.into_iter().enumerate() {
            if self.cancelled() {
                self.reporter.clear();
                info!(chunk = i + 1, total, "fetch cancelled");
                return Err(FetchError::Cancelled);
            }
            self.reporter.set_status(&format!(
                "Fetching prices {}/{total}: {} symbols, {} to {}",
                i + 1,
                chunk.symbols().len(),
                chunk.start(),
                chunk.end()
            ));
            results.push(self.fetch_chunk(chunk, &mut summary)?);
        }
        self.reporter.clear();

        merge_chunk_jobs(&mut job, &results)?;
        summary.succeeded = job.symbols().succeeded().len();
        summary.failed = job.symbols().failed().len();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            requests = summary.requests,
            retries = summary.retries,
            "price fetch finished"
        );
        Ok((job, summary))
    }

    /// Run one chunk with bounded retries over its failing symbols.
    pub fn fetch_chunk(
        &mut self,
        chunk: FetchJob,
        summary: &mut FetchSummary,
    ) -> Result<FetchJob, FetchError> {
        if chunk.symbols().attempt_fetch().is_empty() {
            debug!(start = %chunk.start(), end = %chunk.end(), "chunk has no eligible symbols, skipping");
            summary.skipped_chunks += 1;
            return Ok(chunk);
        }

        let retries = self.config.retries.max(1);
        let base = self.attempt(chunk, summary)?;
        let mut pending = base.retry_job()?;
        let mut later = Vec::new();
        let mut attempt = 1;
        while !pending.is_empty() {
            if attempt >= retries {
                warn!(
                    symbols = ?pending.symbols().all(),
                    attempts = attempt,
                    start = %pending.start(),
                    "retries exhausted"
                );
                break;
            }
            debug!(
                symbols = pending.symbols().len(),
                attempt,
                backoff_ms = self.config.backoff_ms,
                "retrying failed symbols"
            );
            summary.retries += 1;
            thread::sleep(self.config.backoff());
            attempt += 1;
            let done = self.attempt(pending, summary)?;
            pending = done.retry_job()?;
            later.push(done);
        }
        merge_retry_jobs(base, later)
    }

    /// One request/response cycle over the eligible symbols of `job`.
    fn attempt(&mut self, mut job: FetchJob, summary: &mut FetchSummary) -> Result<FetchJob, FetchError> {
        let requests: Vec<Option<QuoteRequest>> = job
            .symbols()
            .all()
            .iter()
            .map(|symbol| {
                job.symbols().is_eligible(symbol).then(|| QuoteRequest::History {
                    symbol: symbol.clone(),
                    start: job.start(),
                    end: job.end(),
                })
            })
            .collect();
        summary.requests += requests.iter().flatten().count();
        let results = self.run_batch(&requests)?;
        self.classify(&mut job, &results)?;
        Ok(job)
    }

    /// Mark each attempted symbol and copy its rows into `job`.
    fn classify(&self, job: &mut FetchJob, results: &Grid) -> Result<(), FetchError> {
        let symbols: Vec<String> = job.symbols().attempt_fetch().into_iter().map(String::from).collect();
        for symbol in symbols {
            let col = job.column_of(&symbol)?;
            if self.backend.is_unavailable(results.get(0, col)) {
                debug!(symbol = %symbol, start = %job.start(), "no data");
                job.update(&symbol, false)?;
                continue;
            }
            match parse_rows(&symbol, results, col) {
                Ok(rows) => {
                    job.write_rows(&symbol, 0, &rows)?;
                    let (start, end) = (job.start(), job.end());
                    job.record_coverage(&symbol, start, end);
                    job.update(&symbol, true)?;
                }
                Err(e) => {
                    warn!(symbol = %e.symbol, row = e.row, record = %e.record, "{e}");
                    job.update(&symbol, false)?;
                }
            }
        }
        Ok(())
    }

    /// Look up currencies for eligible symbols with none known, filling
    /// `unknown_currency_map`.
    pub fn fetch_currencies(&mut self, job: &mut FetchJob) -> Result<(), FetchError> {
        let mut pending: Vec<String> = job
            .symbols()
            .attempt_fetch()
            .into_iter()
            .filter(|s| job.currency(s).is_none())
            .map(String::from)
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        info!(symbols = pending.len(), "looking up currencies");

        let retries = self.config.retries.max(1);
        for attempt in 1..=retries {
            let mut failed = Vec::new();
            for batch in pending.chunks(self.config.max_chunk_symbols.max(1)) {
                if self.cancelled() {
                    return Err(FetchError::Cancelled);
                }
                let requests: Vec<Option<QuoteRequest>> = batch
                    .iter()
                    .map(|s| Some(QuoteRequest::Currency { symbol: s.clone() }))
                    .collect();
                let results = self.run_batch(&requests)?;
                for (i, symbol) in batch.iter().enumerate() {
                    let first = results.get(0, i * QUERY_STRIDE);
                    match first {
                        Some(cell) if !self.backend.is_unavailable(Some(cell)) => {
                            let code = cell.to_string().trim().to_string();
                            job.unknown_currency_map.insert(symbol.clone(), code);
                        }
                        _ => failed.push(symbol.clone()),
                    }
                }
            }
            if failed.is_empty() || attempt == retries {
                if !failed.is_empty() {
                    warn!(symbols = ?failed, "currency lookup failed");
                }
                break;
            }
            thread::sleep(self.config.backoff());
            pending = failed;
        }
        Ok(())
    }

    /// One-shot current price per symbol; `None` where unavailable.
    pub fn live_prices(&mut self, symbols: &[String]) -> Result<BTreeMap<String, Option<f64>>, FetchError> {
        let mut prices = BTreeMap::new();
        for batch in symbols.chunks(self.config.max_chunk_symbols.max(1)) {
            let requests: Vec<Option<QuoteRequest>> = batch
                .iter()
                .map(|s| Some(QuoteRequest::LivePrice { symbol: s.clone() }))
                .collect();
            let results = self.run_batch(&requests)?;
            for (i, symbol) in batch.iter().enumerate() {
                let first = results.get(0, i * QUERY_STRIDE);
                let price = if self.backend.is_unavailable(first) {
                    None
                } else {
                    first.and_then(|c| c.as_number())
                };
                prices.insert(symbol.clone(), price);
            }
        }
        Ok(prices)
    }

    fn run_batch(&mut self, requests: &[Option<QuoteRequest>]) -> Result<Grid, FetchError> {
        self.backend.clear_scratch()?;
        self.backend.submit(requests)?;
        self.backend.read_results()
    }
}

/// Fold retry attempts of one chunk into the first attempt. Later attempts
/// only contribute the symbols they fetched successfully.
pub fn merge_retry_jobs<I>(mut base: FetchJob, retries: I) -> Result<FetchJob, FetchError>
where
    I: IntoIterator<Item = FetchJob>,
{
    for retry in retries {
        for symbol in retry.symbols().succeeded() {
            base.copy_symbol_from(&retry, symbol, 0)?;
            base.absorb_coverage(&retry, symbol);
            base.update(symbol, true)?;
        }
        for symbol in retry.symbols().failed() {
            base.update(symbol, false)?;
        }
    }
    Ok(base)
}

/// Fold chunk results into `target`, which spans the full symbol list and
/// date range. Each symbol has its own write cursor: the first row not yet
/// filled for it.
pub fn merge_chunk_jobs(target: &mut FetchJob, chunks: &[FetchJob]) -> Result<(), FetchError> {
    for chunk in chunks {
        for symbol in chunk.symbols().all() {
            match chunk.outcome(symbol) {
                Outcome::Succeeded => {
                    let cursor = target.filled_rows(symbol)?;
                    target.copy_symbol_from(chunk, symbol, cursor)?;
                    target.absorb_coverage(chunk, symbol);
                    target.update(symbol, true)?;
                }
                Outcome::Failed => target.update(symbol, false)?,
                Outcome::NotAttempted => {}
            }
        }
    }
    Ok(())
}

//! Refresh a sparse price store from the quote provider.
//!
//! Store errors abort the refresh. Fetch failures never do; they only move a
//! symbol's persisted status.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::{GroupKind, Metadata};
use crate::cell::Cell;
use crate::error::StoreError;
use crate::fetch::{
    price_fetch_status, FetchError, FetchJob, FetchOrchestrator, FetchSummary, Outcome,
    PriceFetchStatus, QuoteBackend, SymbolFetchState,
};
use crate::key::CompoundKey;
use crate::store::{ColumnStore, DenseStore, SparseStore};

pub const STATUS_FIELD: &str = "status";
pub const CURRENCY_FIELD: &str = "currency";

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Debug)]
pub struct RefreshOutcome {
    /// Updated sparse price store, including groups that were not refreshed.
    pub prices: SparseStore,
    /// `prices` materialized over the refresh range.
    pub daily: DenseStore,
    /// New status of every requested symbol.
    pub statuses: BTreeMap<String, PriceFetchStatus>,
    pub summary: FetchSummary,
    /// Succeeded symbols with uncovered sub-ranges.
    pub partially_covered: Vec<String>,
}

struct Prior {
    status: PriceFetchStatus,
    currency: Option<String>,
}

fn prior_state(store: &SparseStore, key: &CompoundKey) -> Prior {
    match store.catalog().get(key) {
        Some(group) => Prior {
            status: PriceFetchStatus::from_cell(group.meta(STATUS_FIELD)),
            currency: group.meta_text(CURRENCY_FIELD),
        },
        None => Prior {
            status: PriceFetchStatus::Unknown,
            currency: None,
        },
    }
}

/// Fetch `symbols` over `[start, end)` and fold the results into a copy of
/// `existing`.
pub fn refresh_prices<B: QuoteBackend>(
    orchestrator: &mut FetchOrchestrator<B>,
    existing: &SparseStore,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<RefreshOutcome, RefreshError> {
    if end < start {
        return Err(StoreError::InvalidRange { start, end }.into());
    }

    let mut priors = HashMap::with_capacity(symbols.len());
    for symbol in symbols {
        let key = CompoundKey::single(symbol)?;
        priors.insert(symbol.as_str(), prior_state(existing, &key));
    }

    let do_not_attempt: Vec<&str> = symbols
        .iter()
        .map(String::as_str)
        .filter(|s| !priors[s].status.is_fetchable())
        .collect();
    let known_currencies = priors
        .iter()
        .filter_map(|(s, p)| p.currency.clone().map(|c| (s.to_string(), c)))
        .collect();

    let state = SymbolFetchState::new(symbols.iter().cloned(), &do_not_attempt);
    let mut job = FetchJob::new(state, start, end)?.with_currencies(known_currencies);
    orchestrator.fetch_currencies(&mut job)?;
    let (job, summary) = orchestrator.fetch(job)?;
    let fetched = job.to_sparse_store()?;

    let mut statuses = BTreeMap::new();
    let mut updated_metadata = |symbol: &str, base: Metadata| {
        let prior = &priors[symbol];
        let status = match job.outcome(symbol) {
            Outcome::NotAttempted => prior.status.clone(),
            outcome => price_fetch_status(&prior.status, outcome == Outcome::Succeeded),
        };
        let mut metadata = base;
        metadata.insert(STATUS_FIELD.into(), status.to_cell());
        if let Some(currency) = job.currency(symbol) {
            metadata.insert(CURRENCY_FIELD.into(), Cell::text(currency));
        }
        statuses.insert(symbol.to_string(), status);
        metadata
    };

    let mut prices = SparseStore::new(existing.layout().clone());
    for group in existing.catalog().groups() {
        let key = group.key();
        let metadata = key
            .part(0)
            .filter(|s| key.len() == 1 && priors.contains_key(s))
            .map(|symbol| updated_metadata(symbol, group.metadata().clone()));
        prices.copy_column_group(existing, key, metadata)?;
    }
    for symbol in symbols {
        let key = CompoundKey::single(symbol)?;
        if !prices.catalog().contains(&key) {
            let metadata = updated_metadata(symbol, Metadata::new());
            prices.add_column_group(key, GroupKind::Price, metadata)?;
        }
    }

    let mut inserted = 0usize;
    for group in fetched.catalog().groups() {
        let key = group.key();
        for (date, values) in fetched.entries(key)? {
            prices.insert_at_date(key, date, values)?;
            inserted += 1;
        }
    }

    let partially_covered: Vec<String> = job
        .partially_covered()
        .into_iter()
        .map(String::from)
        .collect();
    for symbol in &partially_covered {
        warn!(symbol = %symbol, gaps = ?job.missing_intervals(symbol), "price history has gaps");
    }

    let daily = prices.materialize(start, end)?;
    info!(
        groups = prices.catalog().len(),
        inserted,
        days = daily.row_count(),
        "refresh complete"
    );

    Ok(RefreshOutcome {
        prices,
        daily,
        statuses,
        summary,
        partially_covered,
    })
}

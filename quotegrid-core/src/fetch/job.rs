//! One unit of fetch work: symbols x `[start, end)` plus its result grid.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};

use super::error::{FetchError, RecordError};
use super::state::{Outcome, SymbolFetchState};
use crate::catalog::{GroupKind, Layout, Metadata};
use crate::cell::Cell;
use crate::error::StoreError;
use crate::grid::Grid;
use crate::key::CompoundKey;
use crate::store::{ColumnStore, SparseStore};

/// Result columns per symbol: date, price.
pub const QUERY_STRIDE: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchJob {
    symbols: SymbolFetchState,
    start: NaiveDate,
    end: NaiveDate,
    values: Grid,
    /// Currencies already known for these symbols.
    pub currencies: HashMap<String, String>,
    /// Currencies looked up during this job.
    pub unknown_currency_map: HashMap<String, String>,
    coverage: HashMap<String, Vec<(NaiveDate, NaiveDate)>>,
}

impl FetchJob {
    /// `end` is exclusive.
    pub fn new(symbols: SymbolFetchState, start: NaiveDate, end: NaiveDate) -> Result<Self, FetchError> {
        if end < start {
            return Err(FetchError::InvalidRange { start, end });
        }
        let width = symbols.len() * QUERY_STRIDE;
        Ok(Self {
            symbols,
            start,
            end,
            values: Grid::new(width),
            currencies: HashMap::new(),
            unknown_currency_map: HashMap::new(),
            coverage: HashMap::new(),
        })
    }

    pub fn with_currencies(mut self, currencies: HashMap<String, String>) -> Self {
        self.currencies = currencies;
        self
    }

    /// A job over a subset of this job's symbols and a sub-range, inheriting
    /// eligibility and known currencies.
    pub fn sub_job<'a, I>(&self, symbols: I, start: NaiveDate, end: NaiveDate) -> Result<Self, FetchError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let state = self.symbols.subset(symbols)?;
        let currencies = state
            .all()
            .iter()
            .filter_map(|s| self.currencies.get(s).map(|c| (s.clone(), c.clone())))
            .collect();
        Ok(Self::new(state, start, end)?.with_currencies(currencies))
    }

    /// Same range, only the symbols that failed in this job.
    pub fn retry_job(&self) -> Result<Self, FetchError> {
        let failed = self.symbols.failed();
        self.sub_job(failed, self.start, self.end)
    }

    pub fn symbols(&self) -> &SymbolFetchState {
        &self.symbols
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn values(&self) -> &Grid {
        &self.values
    }

    /// Nothing was requested of this job: no symbols at all.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn update(&mut self, symbol: &str, success: bool) -> Result<(), FetchError> {
        self.symbols.update(symbol, success)
    }

    pub fn column_of(&self, symbol: &str) -> Result<usize, FetchError> {
        Ok(self.symbols.position(symbol)? * QUERY_STRIDE)
    }

    /// Currency for `symbol`, known or looked up.
    pub fn currency(&self, symbol: &str) -> Option<&str> {
        self.currencies
            .get(symbol)
            .or_else(|| self.unknown_currency_map.get(symbol))
            .map(String::as_str)
    }

    /// Rows holding data for `symbol`: the length of its dated prefix.
    pub fn filled_rows(&self, symbol: &str) -> Result<usize, FetchError> {
        let col = self.column_of(symbol)?;
        Ok((0..self.values.rows())
            .take_while(|&r| !self.values[(r, col)].is_blank())
            .count())
    }

    /// Write one symbol's `(date, price)` rows starting at `row`, growing
    /// the grid as needed.
    pub fn write_rows(
        &mut self,
        symbol: &str,
        row: usize,
        rows: &[(NaiveDate, f64)],
    ) -> Result<(), FetchError> {
        let col = self.column_of(symbol)?;
        self.values.ensure_rows(row + rows.len());
        for (i, &(date, price)) in rows.iter().enumerate() {
            self.values
                .write_slot(row + i, col, &[Cell::Date(date), Cell::Number(price)]);
        }
        Ok(())
    }

    /// Copy `symbol`'s filled rows from `src` to this job starting at `row`.
    pub fn copy_symbol_from(&mut self, src: &FetchJob, symbol: &str, row: usize) -> Result<usize, FetchError> {
        let src_col = src.column_of(symbol)?;
        let dst_col = self.column_of(symbol)?;
        let count = src.filled_rows(symbol)?;
        self.values.ensure_rows(row + count);
        for i in 0..count {
            let values = src.values.slot(i, src_col, QUERY_STRIDE);
            self.values.write_slot(row + i, dst_col, values);
        }
        Ok(count)
    }

    pub fn record_coverage(&mut self, symbol: &str, start: NaiveDate, end: NaiveDate) {
        if start < end {
            self.coverage
                .entry(symbol.to_string())
                .or_default()
                .push((start, end));
        }
    }

    /// Fold `other`'s covered intervals for `symbol` into this job.
    pub fn absorb_coverage(&mut self, other: &FetchJob, symbol: &str) {
        if let Some(intervals) = other.coverage.get(symbol) {
            for &(start, end) in intervals {
                self.record_coverage(symbol, start, end);
            }
        }
    }

    /// Parts of `[start, end)` for which `symbol` has no successful fetch.
    pub fn missing_intervals(&self, symbol: &str) -> Vec<(NaiveDate, NaiveDate)> {
        let mut covered = self.coverage.get(symbol).cloned().unwrap_or_default();
        covered.sort();
        let mut missing = Vec::new();
        let mut cursor = self.start;
        for (start, end) in covered {
            if start > cursor {
                missing.push((cursor, start.min(self.end)));
            }
            cursor = cursor.max(end);
            if cursor >= self.end {
                break;
            }
        }
        if cursor < self.end {
            missing.push((cursor, self.end));
        }
        missing.retain(|(s, e)| s < e);
        missing
    }

    /// Symbols that succeeded somewhere but left gaps in the range.
    pub fn partially_covered(&self) -> Vec<&str> {
        self.symbols
            .succeeded()
            .into_iter()
            .filter(|s| !self.missing_intervals(s).is_empty())
            .collect()
    }

    /// Build a price store from the succeeded symbols. Each group carries the
    /// symbol's currency in its metadata.
    pub fn to_sparse_store(&self) -> Result<SparseStore, StoreError> {
        let mut store = SparseStore::new(Layout::prices());
        for (i, symbol) in self.symbols.all().iter().enumerate() {
            if self.outcome(symbol) != Outcome::Succeeded {
                continue;
            }
            let key = CompoundKey::single(symbol)?;
            let mut metadata = Metadata::new();
            if let Some(currency) = self.currency(symbol) {
                metadata.insert("currency".into(), Cell::text(currency));
            }
            store.add_column_group(key.clone(), GroupKind::Price, metadata)?;

            let col = i * QUERY_STRIDE;
            for row in 0..self.values.rows() {
                let date_cell = &self.values[(row, col)];
                if date_cell.is_blank() {
                    break;
                }
                let date = date_cell.as_date().ok_or_else(|| StoreError::InvalidDate {
                    key: key.clone(),
                    row,
                    found: date_cell.to_string(),
                })?;
                let price = self.values[(row, col + 1)].clone();
                store.insert_at_date(&key, date, &[price])?;
            }
        }
        Ok(store)
    }

    pub fn outcome(&self, symbol: &str) -> Outcome {
        self.symbols.outcome(symbol).unwrap_or_default()
    }
}

/// Read one result slot as `(date, price)` rows, stopping at the first blank
/// date. Timestamps are normalized to midnight.
pub(crate) fn parse_rows(
    symbol: &str,
    grid: &Grid,
    col: usize,
) -> Result<Vec<(NaiveDate, f64)>, RecordError> {
    let mut rows = Vec::new();
    for row in 0..grid.rows() {
        let slot = grid.slot(row, col, QUERY_STRIDE);
        if slot[0].is_blank() {
            break;
        }
        let malformed = |reason| RecordError {
            symbol: symbol.to_string(),
            row,
            record: slot
                .iter()
                .map(Cell::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            reason,
        };
        let date = slot[0]
            .as_date()
            .ok_or_else(|| malformed("invalid date"))?;
        let price = slot[1]
            .as_number()
            .ok_or_else(|| malformed("missing or invalid price"))?;
        rows.push((date, price));
    }
    Ok(rows)
}

/// Split `[start, end)` into consecutive spans of at most `days` days.
pub fn split_interval(start: NaiveDate, end: NaiveDate, days: u32) -> Vec<(NaiveDate, NaiveDate)> {
    let step = Duration::days(i64::from(days.max(1)));
    let mut spans = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next = (cursor + step).min(end);
        spans.push((cursor, next));
        cursor = next;
    }
    spans
}

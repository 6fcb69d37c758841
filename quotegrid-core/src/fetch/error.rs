use chrono::NaiveDate;
use thiserror::Error;

use crate::grid::RaggedRows;
use crate::sheet::SheetError;

/// Failures that abort a fetch. Per-symbol provider trouble is never one of
/// these; it becomes a `failed` outcome instead.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("scratch request area failed: {0}")]
    Scratch(#[from] SheetError),

    #[error("scratch results are ragged: {0}")]
    RaggedResults(#[from] RaggedRows),

    #[error("symbol '{0}' is not part of this fetch job")]
    UnknownSymbol(String),

    #[error("invalid fetch range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("fetch cancelled")]
    Cancelled,
}

/// A result row that cannot be read as a (date, price) pair.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("malformed record for {symbol} at row {row}: {reason} in [{record}]")]
pub struct RecordError {
    pub symbol: String,
    pub row: usize,
    pub record: String,
    pub reason: &'static str,
}

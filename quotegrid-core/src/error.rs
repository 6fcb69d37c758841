//! Schema and temporal-invariant errors raised by the column-group stores.
//!
//! Every variant is fatal to the operation that raised it: a store that
//! produces one of these is corrupted or mismatched with its caller, so
//! nothing here is retried or silently recovered.

use chrono::NaiveDate;
use thiserror::Error;

use crate::key::CompoundKey;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("duplicate column group key '{0}'")]
    DuplicateKey(CompoundKey),

    #[error("unknown column group key '{0}'")]
    UnknownKey(CompoundKey),

    #[error("unknown column group type '{0}'")]
    UnknownGroupType(String),

    #[error("column group type '{kind}' has no field '{field}'")]
    UnknownField { kind: &'static str, field: String },

    #[error("metadata field '{0}' is not part of the store layout")]
    UnknownMetadataField(String),

    #[error("key part '{part}' contains the reserved delimiter '{delimiter}'")]
    InvalidKeyPart { part: String, delimiter: char },

    #[error("key '{key}' has {found} parts, layout expects {expected}")]
    KeyArity {
        key: CompoundKey,
        expected: usize,
        found: usize,
    },

    #[error("malformed headers: {0}")]
    MalformedHeaders(String),

    #[error("cannot merge stores: {0}")]
    IncompatibleMerge(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("non-adjacent date range: expected store starting {expected}, found {found}")]
    NonAdjacentRange { expected: NaiveDate, found: NaiveDate },

    #[error("date gap at data row {row}: expected {expected}, found '{found}'")]
    DateGap {
        row: usize,
        expected: NaiveDate,
        found: String,
    },

    #[error("group '{key}' takes {expected} values per row, got {found}")]
    ArityMismatch {
        key: CompoundKey,
        expected: usize,
        found: usize,
    },

    #[error("unsorted insertion into '{key}': {date} does not fit at row {row}")]
    UnsortedInsertion {
        key: CompoundKey,
        date: NaiveDate,
        row: usize,
    },

    #[error("group '{key}' holds a non-date value '{found}' in its date column at row {row}")]
    InvalidDate {
        key: CompoundKey,
        row: usize,
        found: String,
    },

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("sparse stores cannot be merged; materialize them first")]
    MergeUnsupported,
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

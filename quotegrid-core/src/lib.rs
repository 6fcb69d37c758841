//! Quotegrid Core: column-group time-series stores and chunked price fetching.
//!
//! This crate contains:
//! - Compound keys, cells and the flat grid arena
//! - The column-group catalog with header encode/decode
//! - Dense (one row per day) and sparse (per-group dates) stores
//! - Sheet backends and store I/O
//! - The fetch orchestrator, symbol fetch state and quote providers
//! - The refresh pipeline tying fetches back into the price store

pub mod catalog;
pub mod cell;
pub mod config;
pub mod error;
pub mod fetch;
pub mod grid;
pub mod key;
pub mod refresh;
pub mod sheet;
pub mod store;

pub use catalog::{Catalog, ColumnGroup, GroupKind, Layout, Metadata};
pub use cell::{Cell, DateKey};
pub use config::{ConfigError, QuoteGridConfig};
pub use error::StoreError;
pub use grid::Grid;
pub use key::CompoundKey;
pub use refresh::{refresh_prices, RefreshError, RefreshOutcome};
pub use store::{ColumnStore, DateColumn, DenseStore, SparseStore};

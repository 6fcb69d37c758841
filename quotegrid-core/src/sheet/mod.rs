//! Backing tabular stores: rectangular read, write and clear over cells.
//!
//! The stores never touch a sheet directly; [`io`] moves a whole store to
//! and from any [`TabularStore`] as a header block followed by data rows.

pub mod csv_sheet;
pub mod io;
pub mod memory;

pub use csv_sheet::CsvSheet;
pub use io::{read_dense, read_sparse, write_dense, write_sparse, SheetIoError};
pub use memory::MemorySheet;

use thiserror::Error;

use crate::cell::Cell;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("sheet I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("range {range} exceeds sheet limits of {max_rows} rows x {max_columns} columns")]
    OutOfBounds {
        range: Range,
        max_rows: usize,
        max_columns: usize,
    },
}

/// Zero-based rectangular block of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub row: usize,
    pub column: usize,
    pub rows: usize,
    pub columns: usize,
}

impl Range {
    pub fn new(row: usize, column: usize, rows: usize, columns: usize) -> Self {
        Self {
            row,
            column,
            rows,
            columns,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.columns == 0
    }

    pub fn end_row(&self) -> usize {
        self.row + self.rows
    }

    pub fn end_column(&self) -> usize {
        self.column + self.columns
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}..{}, {}..{}]",
            self.row,
            self.end_row(),
            self.column,
            self.end_column()
        )
    }
}

/// The primitives a store needs from its backing sheet.
///
/// Reads beyond the written extent return blank cells, like a spreadsheet.
pub trait TabularStore {
    fn get_values(&self, range: Range) -> Result<Vec<Vec<Cell>>, SheetError>;

    /// Write `values` with its top-left corner at `(row, column)`. Rows may
    /// be ragged; each is written from `column` rightwards.
    fn set_values(&mut self, row: usize, column: usize, values: &[Vec<Cell>])
        -> Result<(), SheetError>;

    fn clear(&mut self, range: Range) -> Result<(), SheetError>;

    /// Number of rows up to and including the last non-blank one.
    fn last_row(&self) -> usize;

    /// Number of columns up to and including the last non-blank one.
    fn last_column(&self) -> usize;

    /// The full used extent.
    fn data_range(&self) -> Range {
        Range::new(0, 0, self.last_row(), self.last_column())
    }

    fn get_all(&self) -> Result<Vec<Vec<Cell>>, SheetError> {
        self.get_values(self.data_range())
    }

    fn clear_all(&mut self) -> Result<(), SheetError> {
        let range = self.data_range();
        self.clear(range)
    }
}

//! In-memory sheet. Also serves as the scratch request area for quote
//! backends.

use super::{Range, SheetError, TabularStore};
use crate::cell::Cell;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySheet {
    rows: Vec<Vec<Cell>>,
    limits: Option<(usize, usize)>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sheet that refuses writes beyond `max_rows` x `max_columns`.
    pub fn with_limits(max_rows: usize, max_columns: usize) -> Self {
        Self {
            rows: Vec::new(),
            limits: Some((max_rows, max_columns)),
        }
    }

    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows, limits: None }
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    fn check_limits(&self, range: Range) -> Result<(), SheetError> {
        match self.limits {
            Some((max_rows, max_columns))
                if range.end_row() > max_rows || range.end_column() > max_columns =>
            {
                Err(SheetError::OutOfBounds {
                    range,
                    max_rows,
                    max_columns,
                })
            }
            _ => Ok(()),
        }
    }

    fn cell(&self, row: usize, column: usize) -> Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .cloned()
            .unwrap_or_default()
    }
}

impl TabularStore for MemorySheet {
    fn get_values(&self, range: Range) -> Result<Vec<Vec<Cell>>, SheetError> {
        self.check_limits(range)?;
        Ok((range.row..range.end_row())
            .map(|r| {
                (range.column..range.end_column())
                    .map(|c| self.cell(r, c))
                    .collect()
            })
            .collect())
    }

    fn set_values(
        &mut self,
        row: usize,
        column: usize,
        values: &[Vec<Cell>],
    ) -> Result<(), SheetError> {
        let columns = values.iter().map(Vec::len).max().unwrap_or(0);
        self.check_limits(Range::new(row, column, values.len(), columns))?;

        if self.rows.len() < row + values.len() {
            self.rows.resize_with(row + values.len(), Vec::new);
        }
        for (offset, src) in values.iter().enumerate() {
            let dst = &mut self.rows[row + offset];
            if dst.len() < column + src.len() {
                dst.resize(column + src.len(), Cell::Empty);
            }
            dst[column..column + src.len()].clone_from_slice(src);
        }
        Ok(())
    }

    fn clear(&mut self, range: Range) -> Result<(), SheetError> {
        for r in range.row..range.end_row().min(self.rows.len()) {
            let row = &mut self.rows[r];
            for c in range.column..range.end_column().min(row.len()) {
                row[c] = Cell::Empty;
            }
        }
        Ok(())
    }

    fn last_row(&self) -> usize {
        self.rows
            .iter()
            .rposition(|r| r.iter().any(|c| !c.is_blank()))
            .map_or(0, |i| i + 1)
    }

    fn last_column(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|r| r.iter().rposition(|c| !c.is_blank()))
            .max()
            .map_or(0, |i| i + 1)
    }
}

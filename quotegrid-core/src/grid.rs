//! Flat row-major arena for value grids.
//!
//! Stores address cells by `(row, column)`; column groups resolve to a
//! contiguous span of one row via [`Grid::slot`]. Every row has the same
//! width, so widening or appending never produces ragged data.

use std::ops::{Index, IndexMut};

use crate::cell::Cell;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    width: usize,
    rows: usize,
    cells: Vec<Cell>,
}

/// Returned when rows of unequal length are turned into a grid.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("row {row} has {found} cells, expected {expected}")]
pub struct RaggedRows {
    pub row: usize,
    pub expected: usize,
    pub found: usize,
}

impl Grid {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            rows: 0,
            cells: Vec::new(),
        }
    }

    pub fn blank(rows: usize, width: usize) -> Self {
        Self {
            width,
            rows,
            cells: vec![Cell::Empty; rows * width],
        }
    }

    /// Build from nested rows. An empty input yields a zero-width grid.
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Result<Self, RaggedRows> {
        let width = rows.first().map_or(0, Vec::len);
        let count = rows.len();
        let mut cells = Vec::with_capacity(rows.len() * width);
        for (row, r) in rows.into_iter().enumerate() {
            if r.len() != width {
                return Err(RaggedRows {
                    row,
                    expected: width,
                    found: r.len(),
                });
            }
            cells.extend(r);
        }
        Ok(Self {
            width,
            rows: count,
            cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn get(&self, row: usize, column: usize) -> Option<&Cell> {
        if column >= self.width || row >= self.rows {
            return None;
        }
        self.cells.get(row * self.width + column)
    }

    pub fn get_mut(&mut self, row: usize, column: usize) -> Option<&mut Cell> {
        if column >= self.width || row >= self.rows {
            return None;
        }
        self.cells.get_mut(row * self.width + column)
    }

    pub fn row(&self, row: usize) -> &[Cell] {
        let start = row * self.width;
        &self.cells[start..start + self.width]
    }

    /// The `len` cells starting at `column` in `row`.
    pub fn slot(&self, row: usize, column: usize, len: usize) -> &[Cell] {
        debug_assert!(column + len <= self.width);
        let start = row * self.width + column;
        &self.cells[start..start + len]
    }

    pub fn slot_mut(&mut self, row: usize, column: usize, len: usize) -> &mut [Cell] {
        debug_assert!(column + len <= self.width);
        let start = row * self.width + column;
        &mut self.cells[start..start + len]
    }

    pub fn write_slot(&mut self, row: usize, column: usize, values: &[Cell]) {
        self.slot_mut(row, column, values.len()).clone_from_slice(values);
    }

    /// Copy a slot from `from` to `to` within the same column span.
    pub fn copy_slot(&mut self, from: usize, to: usize, column: usize, len: usize) {
        if from == to {
            return;
        }
        let src = self.slot(from, column, len).to_vec();
        self.write_slot(to, column, &src);
    }

    pub fn clear_slot(&mut self, row: usize, column: usize, len: usize) {
        for cell in self.slot_mut(row, column, len) {
            *cell = Cell::Empty;
        }
    }

    pub fn push_blank_row(&mut self) -> usize {
        let row = self.rows;
        self.cells
            .extend(std::iter::repeat(Cell::Empty).take(self.width));
        self.rows += 1;
        row
    }

    /// Grow to at least `rows` rows with blank padding.
    pub fn ensure_rows(&mut self, rows: usize) {
        while self.rows() < rows {
            self.push_blank_row();
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<usize, RaggedRows> {
        if row.len() != self.width {
            return Err(RaggedRows {
                row: self.rows(),
                expected: self.width,
                found: row.len(),
            });
        }
        let index = self.rows;
        self.cells.extend(row);
        self.rows += 1;
        Ok(index)
    }

    /// Append `extra` blank columns to the right of every row.
    pub fn widen(&mut self, extra: usize) {
        if extra == 0 {
            return;
        }
        let rows = self.rows;
        let new_width = self.width + extra;
        let mut cells = Vec::with_capacity(rows * new_width);
        let mut old = std::mem::take(&mut self.cells).into_iter();
        for _ in 0..rows {
            cells.extend(old.by_ref().take(self.width));
            cells.extend(std::iter::repeat(Cell::Empty).take(extra));
        }
        self.width = new_width;
        self.cells = cells;
    }

    /// Append all rows of `other`. Widths must match.
    pub fn append_rows(&mut self, other: &Grid) -> Result<(), RaggedRows> {
        if other.width != self.width && !other.is_empty() {
            return Err(RaggedRows {
                row: self.rows,
                expected: self.width,
                found: other.width,
            });
        }
        self.cells.extend_from_slice(&other.cells);
        self.rows += other.rows;
        Ok(())
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[Cell]> {
        (0..self.rows()).map(move |r| self.row(r))
    }

    pub fn to_rows(&self) -> Vec<Vec<Cell>> {
        self.iter_rows().map(<[Cell]>::to_vec).collect()
    }
}

impl Index<(usize, usize)> for Grid {
    type Output = Cell;

    fn index(&self, (row, column): (usize, usize)) -> &Cell {
        assert!(column < self.width, "column {column} out of bounds");
        assert!(row < self.rows, "row {row} out of bounds");
        &self.cells[row * self.width + column]
    }
}

impl IndexMut<(usize, usize)> for Grid {
    fn index_mut(&mut self, (row, column): (usize, usize)) -> &mut Cell {
        assert!(column < self.width, "column {column} out of bounds");
        assert!(row < self.rows, "row {row} out of bounds");
        &mut self.cells[row * self.width + column]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: f64) -> Cell {
        Cell::Number(v)
    }

    #[test]
    fn widen_keeps_existing_cells_in_place() {
        let mut g = Grid::from_rows(vec![vec![n(1.0), n(2.0)], vec![n(3.0), n(4.0)]]).unwrap();
        g.widen(1);
        assert_eq!(g.width(), 3);
        assert_eq!(g.row(0), &[n(1.0), n(2.0), Cell::Empty]);
        assert_eq!(g.row(1), &[n(3.0), n(4.0), Cell::Empty]);
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = Grid::from_rows(vec![vec![n(1.0)], vec![n(1.0), n(2.0)]]).unwrap_err();
        assert_eq!(err.row, 1);
    }

    #[test]
    fn get_is_bounds_checked() {
        let g = Grid::blank(2, 2);
        assert!(g.get(1, 1).is_some());
        assert!(g.get(2, 0).is_none());
        assert!(g.get(0, 2).is_none());
    }

    #[test]
    fn zero_width_grid_still_counts_rows() {
        let mut g = Grid::blank(4, 0);
        assert_eq!(g.rows(), 4);
        g.widen(2);
        assert_eq!(g.rows(), 4);
        assert_eq!(g.row(3), &[Cell::Empty, Cell::Empty]);
    }

    #[test]
    fn copy_slot_moves_a_span() {
        let mut g = Grid::blank(3, 3);
        g.write_slot(0, 1, &[n(7.0), n(8.0)]);
        g.copy_slot(0, 2, 1, 2);
        assert_eq!(g.slot(2, 1, 2), &[n(7.0), n(8.0)]);
        assert_eq!(g[(2, 0)], Cell::Empty);
    }
}

//! Keyed, typed, header-serializable column-group stores.
//!
//! Two layouts share one catalog type:
//! - [`DenseStore`]: one row per calendar day, all groups date-aligned.
//! - [`SparseStore`]: every group carries its own date column, rows are
//!   independent per group.
//!
//! Neither store is thread-safe; callers serialize access to an instance.

pub mod dense;
pub mod sparse;

pub use dense::{DateColumn, DenseStore};
pub use sparse::SparseStore;

use crate::catalog::{Catalog, ColumnGroup, GroupKind, Layout, Metadata};
use crate::cell::Cell;
use crate::error::Result;
use crate::grid::Grid;
use crate::key::CompoundKey;

/// Behaviour shared by the dense and sparse layouts.
pub trait ColumnStore: Sized {
    /// Date cells each group carries in its own slot (0 dense, 1 sparse).
    const DATE_COLUMNS: usize;

    fn catalog(&self) -> &Catalog;

    fn grid(&self) -> &Grid;

    /// Mutable access to both halves at once; they must change together.
    fn parts_mut(&mut self) -> (&mut Catalog, &mut Grid);

    /// Combine other stores into this one.
    fn merge(&mut self, others: &[&Self]) -> Result<()>;

    /// Cells a group of `kind` occupies per data row.
    fn slot_width(kind: GroupKind) -> usize {
        Self::DATE_COLUMNS + kind.stride()
    }

    fn layout(&self) -> &Layout {
        self.catalog().layout()
    }

    fn row_count(&self) -> usize {
        self.grid().rows()
    }

    fn group(&self, key: &CompoundKey) -> Result<&ColumnGroup> {
        self.catalog().require(key)
    }

    /// Append a group at the current width and backfill every existing row
    /// with blank placeholders. Fails with `DuplicateKey` if present.
    fn add_column_group(
        &mut self,
        key: CompoundKey,
        kind: GroupKind,
        metadata: Metadata,
    ) -> Result<&ColumnGroup> {
        let width = Self::slot_width(kind);
        let (catalog, grid) = self.parts_mut();
        debug_assert_eq!(catalog.width(), grid.width());
        let group = catalog.add(key, kind, metadata, width)?;
        grid.widen(width);
        Ok(group)
    }

    /// Copy a group definition and its values from `source`. `metadata`
    /// replaces the source metadata when given. Rows beyond this store's
    /// current height are appended.
    fn copy_column_group(
        &mut self,
        source: &Self,
        key: &CompoundKey,
        metadata: Option<Metadata>,
    ) -> Result<()> {
        let src = source.group(key)?;
        let kind = src.kind();
        let src_col = src.column();
        let metadata = metadata.unwrap_or_else(|| src.metadata().clone());
        let width = Self::slot_width(kind);

        let dst_col = self.add_column_group(key.clone(), kind, metadata)?.column();
        let (_, grid) = self.parts_mut();
        grid.ensure_rows(source.row_count());
        for row in 0..source.row_count() {
            let values = source.grid().slot(row, src_col, width);
            grid.write_slot(row, dst_col, values);
        }
        Ok(())
    }

    fn encode_headers(&self) -> Vec<Vec<Cell>> {
        self.catalog().encode_headers()
    }

    /// Replace the catalog with one decoded from `headers`. Existing values
    /// are discarded; the store keeps its row count with blank cells.
    fn decode_headers(&mut self, headers: &[Vec<Cell>]) -> Result<()> {
        let layout = self.layout().clone();
        let decoded = Catalog::decode_headers(layout, headers, Self::slot_width)?;
        let (catalog, grid) = self.parts_mut();
        *grid = Grid::blank(grid.rows(), decoded.width());
        *catalog = decoded;
        Ok(())
    }

    /// Values of one group in one row. Panics if `row` is out of range.
    fn slot(&self, key: &CompoundKey, row: usize) -> Result<&[Cell]> {
        let group = self.group(key)?;
        Ok(self
            .grid()
            .slot(row, group.column(), Self::slot_width(group.kind())))
    }
}

//! Move whole stores to and from a [`TabularStore`].

use thiserror::Error;
use tracing::debug;

use super::{SheetError, TabularStore};
use crate::catalog::Layout;
use crate::error::StoreError;
use crate::store::{ColumnStore, DateColumn, DenseStore, SparseStore};

#[derive(Debug, Error)]
pub enum SheetIoError {
    #[error(transparent)]
    Sheet(#[from] SheetError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Replace the sheet contents with `store`, optionally prefixed by the
/// shared date column.
pub fn write_dense<T: TabularStore>(
    sheet: &mut T,
    store: &DenseStore,
    dates: bool,
) -> Result<(), SheetError> {
    sheet.clear_all()?;
    sheet.set_values(0, 0, &store.to_rows(dates))?;
    debug!(
        groups = store.catalog().len(),
        rows = store.row_count(),
        start = %store.start_date(),
        "wrote dense store"
    );
    Ok(())
}

pub fn read_dense<T: TabularStore>(
    sheet: &T,
    layout: Layout,
    dates: DateColumn,
) -> Result<DenseStore, SheetIoError> {
    let store = DenseStore::from_rows(layout, sheet.get_all()?, dates)?;
    debug!(
        groups = store.catalog().len(),
        rows = store.row_count(),
        "read dense store"
    );
    Ok(store)
}

pub fn write_sparse<T: TabularStore>(sheet: &mut T, store: &SparseStore) -> Result<(), SheetError> {
    sheet.clear_all()?;
    sheet.set_values(0, 0, &store.to_rows())?;
    debug!(
        groups = store.catalog().len(),
        rows = store.row_count(),
        "wrote sparse store"
    );
    Ok(())
}

/// Read a sparse store. An empty sheet yields an empty store.
pub fn read_sparse<T: TabularStore>(
    sheet: &T,
    layout: Layout,
) -> Result<SparseStore, SheetIoError> {
    let rows = sheet.get_all()?;
    if rows.is_empty() {
        return Ok(SparseStore::new(layout));
    }
    let store = SparseStore::from_rows(layout, rows)?;
    debug!(
        groups = store.catalog().len(),
        rows = store.row_count(),
        "read sparse store"
    );
    Ok(store)
}

//! Dense store: one row per calendar day starting at `start_date`.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};

use super::ColumnStore;
use crate::catalog::{Catalog, Layout};
use crate::cell::Cell;
use crate::error::{Result, StoreError};
use crate::grid::Grid;
use crate::key::CompoundKey;

/// Whether serialized rows carry a shared leading date column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateColumn {
    /// Column 0 holds the row date; header row 0 of that column holds the
    /// start date so stores without data rows still round-trip.
    Leading,
    /// No date column; row 0 is `start`.
    Absent { start: NaiveDate },
}

/// Row `i` holds calendar day `start_date + i`, with no gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseStore {
    catalog: Catalog,
    grid: Grid,
    start_date: NaiveDate,
}

impl DenseStore {
    pub fn new(layout: Layout, start_date: NaiveDate) -> Self {
        Self {
            catalog: Catalog::new(layout),
            grid: Grid::new(0),
            start_date,
        }
    }

    /// A store with one blank row per day in `[start, end)`.
    pub fn with_days(layout: Layout, start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let days = days_between(start, end)?;
        Ok(Self {
            catalog: Catalog::new(layout),
            grid: Grid::blank(days, 0),
            start_date: start,
        })
    }

    pub(crate) fn from_parts(catalog: Catalog, grid: Grid, start_date: NaiveDate) -> Self {
        debug_assert_eq!(catalog.width(), grid.width());
        Self {
            catalog,
            grid,
            start_date,
        }
    }

    /// Merge `stores` into a fresh store with their shared start and height.
    pub fn merged(layout: Layout, stores: &[&DenseStore]) -> Result<Self> {
        let first = stores
            .first()
            .ok_or_else(|| StoreError::IncompatibleMerge("no stores to merge".into()))?;
        let mut target = Self {
            catalog: Catalog::new(layout),
            grid: Grid::blank(first.row_count(), 0),
            start_date: first.start_date,
        };
        target.merge(stores)?;
        Ok(target)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// First day past the last row.
    pub fn end_date(&self) -> NaiveDate {
        self.date_at(self.row_count())
    }

    pub fn date_at(&self, row: usize) -> NaiveDate {
        self.start_date + Duration::days(row as i64)
    }

    pub fn row_for_date(&self, date: NaiveDate) -> Option<usize> {
        let offset = (date - self.start_date).num_days();
        if offset < 0 || offset as usize >= self.row_count() {
            None
        } else {
            Some(offset as usize)
        }
    }

    /// Grow with blank rows until `end` (exclusive) is covered.
    pub fn extend_to(&mut self, end: NaiveDate) {
        let days = (end - self.start_date).num_days().max(0) as usize;
        self.grid.ensure_rows(days);
    }

    /// Value of `field` for `key` on `date`; `None` when the date is outside
    /// the store.
    pub fn value(&self, key: &CompoundKey, field: &str, date: NaiveDate) -> Result<Option<&Cell>> {
        let group = self.group(key)?;
        let offset = group.kind().field_offset(field)?;
        Ok(self
            .row_for_date(date)
            .and_then(|row| self.grid.get(row, group.column() + offset)))
    }

    /// Write one field, growing the store forward if `date` is past the end.
    pub fn set_value(
        &mut self,
        key: &CompoundKey,
        field: &str,
        date: NaiveDate,
        value: Cell,
    ) -> Result<()> {
        if date < self.start_date {
            return Err(StoreError::InvalidRange {
                start: self.start_date,
                end: date,
            });
        }
        let group = self.catalog.require(key)?;
        let column = group.column() + group.kind().field_offset(field)?;
        self.extend_to(date + Duration::days(1));
        let row = (date - self.start_date).num_days() as usize;
        self.grid[(row, column)] = value;
        Ok(())
    }

    /// All `(date, value)` pairs of one field in row order.
    pub fn series(&self, key: &CompoundKey, field: &str) -> Result<Vec<(NaiveDate, &Cell)>> {
        let group = self.group(key)?;
        let column = group.column() + group.kind().field_offset(field)?;
        Ok((0..self.row_count())
            .map(|row| (self.date_at(row), &self.grid[(row, column)]))
            .collect())
    }

    /// Concatenate rows of stores covering the calendar days directly after
    /// this one. Catalogs must match in keys, types and column order.
    pub fn append(&mut self, others: &[&DenseStore]) -> Result<()> {
        let mut expected = self.end_date();
        for other in others {
            if !self.catalog.same_schema(&other.catalog) {
                return Err(StoreError::SchemaMismatch(format!(
                    "store starting {} has a different column catalog",
                    other.start_date
                )));
            }
            if other.start_date != expected {
                return Err(StoreError::NonAdjacentRange {
                    expected,
                    found: other.start_date,
                });
            }
            expected = other.end_date();
        }
        for other in others {
            self.grid
                .append_rows(&other.grid)
                .map_err(|e| StoreError::SchemaMismatch(e.to_string()))?;
        }
        Ok(())
    }

    /// Header block followed by one row per day.
    pub fn to_rows(&self, dates: bool) -> Vec<Vec<Cell>> {
        let mut rows = Vec::with_capacity(self.layout().header_rows() + self.row_count());
        for (i, header) in self.encode_headers().into_iter().enumerate() {
            if dates {
                let lead = if i == 0 {
                    Cell::Date(self.start_date)
                } else {
                    Cell::Empty
                };
                rows.push(std::iter::once(lead).chain(header).collect());
            } else {
                rows.push(header);
            }
        }
        for (i, row) in self.grid.iter_rows().enumerate() {
            if dates {
                let lead = Cell::Date(self.date_at(i));
                rows.push(std::iter::once(lead).chain(row.iter().cloned()).collect());
            } else {
                rows.push(row.to_vec());
            }
        }
        rows
    }

    /// Inverse of [`DenseStore::to_rows`].
    pub fn from_rows(layout: Layout, rows: Vec<Vec<Cell>>, dates: DateColumn) -> Result<Self> {
        let header_count = layout.header_rows();
        if rows.len() < header_count {
            return Err(StoreError::MalformedHeaders(format!(
                "expected at least {header_count} rows, found {}",
                rows.len()
            )));
        }

        let mut rows = rows.into_iter();
        let mut header_dates = Vec::with_capacity(header_count);
        let mut headers = Vec::with_capacity(header_count);
        for mut row in rows.by_ref().take(header_count) {
            if dates == DateColumn::Leading {
                header_dates.push(take_lead(&mut row));
            }
            headers.push(row);
        }
        let catalog = Catalog::decode_headers(layout, &headers, Self::slot_width)?;
        let width = catalog.width();

        let mut leading = Vec::new();
        let mut grid = Grid::new(width);
        for (i, mut row) in rows.enumerate() {
            if dates == DateColumn::Leading {
                leading.push(take_lead(&mut row));
            }
            let row = fit_row(row, width, i)?;
            grid.push_row(row)
                .map_err(|e| StoreError::SchemaMismatch(e.to_string()))?;
        }

        let start_date = match dates {
            DateColumn::Absent { start } => start,
            DateColumn::Leading => leading
                .first()
                .and_then(Cell::as_date)
                .or_else(|| header_dates.first().and_then(Cell::as_date))
                .ok_or_else(|| {
                    StoreError::MalformedHeaders("missing start date in the date column".into())
                })?,
        };

        for (i, cell) in leading.iter().enumerate() {
            let expected = start_date + Duration::days(i as i64);
            if cell.as_date() != Some(expected) {
                return Err(StoreError::DateGap {
                    row: i,
                    expected,
                    found: cell.to_string(),
                });
            }
        }

        Ok(Self {
            catalog,
            grid,
            start_date,
        })
    }
}

impl ColumnStore for DenseStore {
    const DATE_COLUMNS: usize = 0;

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn grid(&self) -> &Grid {
        &self.grid
    }

    fn parts_mut(&mut self) -> (&mut Catalog, &mut Grid) {
        (&mut self.catalog, &mut self.grid)
    }

    /// Concatenate columns of date-aligned stores with disjoint keys.
    /// Row `i` of every input stays row `i`.
    fn merge(&mut self, others: &[&Self]) -> Result<()> {
        let mut seen: HashSet<CompoundKey> = self.catalog.keys().cloned().collect();
        for other in others {
            if other.row_count() != self.row_count() || other.start_date != self.start_date {
                return Err(StoreError::IncompatibleMerge(format!(
                    "store starting {} with {} rows does not align with {} with {} rows",
                    other.start_date,
                    other.row_count(),
                    self.start_date,
                    self.row_count()
                )));
            }
            if other.layout() != self.layout() {
                return Err(StoreError::SchemaMismatch(
                    "stores to merge use different header layouts".into(),
                ));
            }
            for key in other.catalog.keys() {
                if !seen.insert(key.clone()) {
                    return Err(StoreError::DuplicateKey(key.clone()));
                }
            }
        }

        for other in others {
            let base = self.catalog.width();
            self.grid.widen(other.catalog.width());
            for group in other.catalog.groups() {
                self.catalog.add(
                    group.key().clone(),
                    group.kind(),
                    group.metadata().clone(),
                    Self::slot_width(group.kind()),
                )?;
            }
            for row in 0..other.row_count() {
                self.grid.write_slot(row, base, other.grid.row(row));
            }
        }
        Ok(())
    }
}

pub(crate) fn days_between(start: NaiveDate, end: NaiveDate) -> Result<usize> {
    let days = (end - start).num_days();
    if days < 0 {
        return Err(StoreError::InvalidRange { start, end });
    }
    Ok(days as usize)
}

fn take_lead(row: &mut Vec<Cell>) -> Cell {
    if row.is_empty() {
        Cell::Empty
    } else {
        row.remove(0)
    }
}

/// Pad short rows; reject extra non-blank cells past the catalog width.
pub(crate) fn fit_row(mut row: Vec<Cell>, width: usize, index: usize) -> Result<Vec<Cell>> {
    if row.len() > width {
        if row[width..].iter().any(|c| !c.is_blank()) {
            return Err(StoreError::SchemaMismatch(format!(
                "data row {index} has values past the {width} catalogued columns"
            )));
        }
        row.truncate(width);
    }
    row.resize(width, Cell::Empty);
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{GroupKind, Metadata};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn key(s: &str) -> CompoundKey {
        CompoundKey::single(s).unwrap()
    }

    fn store_with(symbol: &str, start: NaiveDate, prices: &[f64]) -> DenseStore {
        let mut s = DenseStore::new(Layout::prices(), start);
        s.add_column_group(key(symbol), GroupKind::Price, Metadata::new())
            .unwrap();
        for (i, p) in prices.iter().enumerate() {
            s.set_value(&key(symbol), "price", start + Duration::days(i as i64), Cell::Number(*p))
                .unwrap();
        }
        s
    }

    #[test]
    fn add_group_backfills_existing_rows() {
        let mut s = store_with("SPY", d(2024, 1, 1), &[1.0, 2.0, 3.0]);
        s.add_column_group(key("QQQ"), GroupKind::Holding, Metadata::new())
            .unwrap();
        assert_eq!(s.grid().width(), 3);
        assert_eq!(s.row_count(), 3);
        assert!(s.slot(&key("QQQ"), 2).unwrap().iter().all(Cell::is_blank));
    }

    #[test]
    fn add_group_rejects_duplicate() {
        let mut s = store_with("SPY", d(2024, 1, 1), &[1.0]);
        let err = s
            .add_column_group(key("SPY"), GroupKind::Price, Metadata::new())
            .unwrap_err();
        assert_eq!(err, StoreError::DuplicateKey(key("SPY")));
    }

    #[test]
    fn value_lookup_by_date() {
        let s = store_with("SPY", d(2024, 1, 1), &[1.0, 2.0, 3.0]);
        assert_eq!(
            s.value(&key("SPY"), "price", d(2024, 1, 2)).unwrap(),
            Some(&Cell::Number(2.0))
        );
        assert_eq!(s.value(&key("SPY"), "price", d(2024, 1, 9)).unwrap(), None);
        assert!(s.value(&key("SPY"), "amount", d(2024, 1, 2)).is_err());
        assert_eq!(s.end_date(), d(2024, 1, 4));
    }

    #[test]
    fn merge_concatenates_columns_positionally() {
        let mut a = store_with("SPY", d(2024, 1, 1), &[1.0, 2.0]);
        let b = store_with("QQQ", d(2024, 1, 1), &[10.0, 20.0]);
        a.merge(&[&b]).unwrap();
        assert_eq!(a.catalog().len(), 2);
        assert_eq!(a.grid().row(1), &[Cell::Number(2.0), Cell::Number(20.0)]);
    }

    #[test]
    fn merge_rejects_misaligned_start() {
        let mut a = store_with("SPY", d(2024, 1, 1), &[1.0, 2.0]);
        let b = store_with("QQQ", d(2024, 1, 2), &[10.0, 20.0]);
        assert!(matches!(a.merge(&[&b]), Err(StoreError::IncompatibleMerge(_))));
    }

    #[test]
    fn merge_rejects_overlapping_keys_without_mutating() {
        let mut a = store_with("SPY", d(2024, 1, 1), &[1.0]);
        let b = store_with("QQQ", d(2024, 1, 1), &[2.0]);
        let c = store_with("SPY", d(2024, 1, 1), &[3.0]);
        let err = a.merge(&[&b, &c]).unwrap_err();
        assert_eq!(err, StoreError::DuplicateKey(key("SPY")));
        assert_eq!(a.catalog().len(), 1);
    }

    #[test]
    fn merged_builds_fresh_target() {
        let a = store_with("SPY", d(2024, 1, 1), &[1.0, 2.0]);
        let b = store_with("QQQ", d(2024, 1, 1), &[3.0, 4.0]);
        let m = DenseStore::merged(Layout::prices(), &[&a, &b]).unwrap();
        assert_eq!(m.grid().width(), 2);
        assert_eq!(m.start_date(), d(2024, 1, 1));
    }

    #[test]
    fn append_requires_adjacent_ranges() {
        let mut a = store_with("SPY", d(2024, 1, 1), &[1.0, 2.0]);
        let b = store_with("SPY", d(2024, 1, 3), &[3.0]);
        let gap = store_with("SPY", d(2024, 1, 6), &[9.0]);
        assert_eq!(
            a.clone().append(&[&gap]).unwrap_err(),
            StoreError::NonAdjacentRange {
                expected: d(2024, 1, 3),
                found: d(2024, 1, 6)
            }
        );
        a.append(&[&b]).unwrap();
        assert_eq!(a.row_count(), 3);
        assert_eq!(
            a.value(&key("SPY"), "price", d(2024, 1, 3)).unwrap(),
            Some(&Cell::Number(3.0))
        );
    }

    #[test]
    fn append_requires_same_catalog() {
        let mut a = store_with("SPY", d(2024, 1, 1), &[1.0]);
        let b = store_with("QQQ", d(2024, 1, 2), &[3.0]);
        assert!(matches!(a.append(&[&b]), Err(StoreError::SchemaMismatch(_))));
    }

    #[test]
    fn rows_roundtrip_with_date_column() {
        let s = store_with("SPY", d(2024, 2, 27), &[1.0, 2.0, 3.0, 4.0]);
        let rows = s.to_rows(true);
        assert_eq!(rows[4][0], Cell::Date(d(2024, 2, 27)));
        let back = DenseStore::from_rows(Layout::prices(), rows, DateColumn::Leading).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn rows_roundtrip_without_date_column() {
        let s = store_with("SPY", d(2024, 2, 27), &[1.0, 2.0]);
        let back = DenseStore::from_rows(
            Layout::prices(),
            s.to_rows(false),
            DateColumn::Absent { start: d(2024, 2, 27) },
        )
        .unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn empty_store_roundtrips_start_date() {
        let mut s = DenseStore::new(Layout::prices(), d(2023, 6, 1));
        s.add_column_group(key("SPY"), GroupKind::Price, Metadata::new())
            .unwrap();
        let back =
            DenseStore::from_rows(Layout::prices(), s.to_rows(true), DateColumn::Leading).unwrap();
        assert_eq!(back.start_date(), d(2023, 6, 1));
        assert_eq!(back.row_count(), 0);
    }

    #[test]
    fn from_rows_detects_date_gaps() {
        let s = store_with("SPY", d(2024, 1, 1), &[1.0, 2.0, 3.0]);
        let mut rows = s.to_rows(true);
        rows.remove(5);
        let err = DenseStore::from_rows(Layout::prices(), rows, DateColumn::Leading).unwrap_err();
        assert!(matches!(err, StoreError::DateGap { row: 1, .. }));
    }
}

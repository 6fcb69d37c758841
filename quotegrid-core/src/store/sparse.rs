//! Sparse store: every column group owns an independent date column.
//!
//! A group's slot in a row is `[date, ...values]`. Within one group the
//! filled dates form an ascending prefix of the rows; everything after it is
//! blank. Blank dates compare greater than every real date, so reserved
//! trailing rows are found by the same binary search as real ones.

use chrono::{Duration, NaiveDate};

use super::dense::{days_between, fit_row};
use super::{ColumnStore, DenseStore};
use crate::catalog::{Catalog, Layout};
use crate::cell::{Cell, DateKey};
use crate::error::{Result, StoreError};
use crate::grid::Grid;
use crate::key::CompoundKey;

#[derive(Debug, Clone, PartialEq)]
pub struct SparseStore {
    catalog: Catalog,
    grid: Grid,
}

/// Resolved position of one group inside the grid.
#[derive(Debug, Clone, Copy)]
struct Span {
    column: usize,
    stride: usize,
}

impl SparseStore {
    pub fn new(layout: Layout) -> Self {
        Self {
            catalog: Catalog::new(layout),
            grid: Grid::new(0),
        }
    }

    /// Append `rows` blank rows for later in-place growth.
    pub fn reserve_rows(&mut self, rows: usize) {
        let target = self.grid.rows() + rows;
        self.grid.ensure_rows(target);
    }

    fn span(&self, key: &CompoundKey) -> Result<Span> {
        let group = self.catalog.require(key)?;
        Ok(Span {
            column: group.column(),
            stride: group.kind().stride(),
        })
    }

    fn date_key(&self, key: &CompoundKey, span: Span, row: usize) -> Result<DateKey> {
        let cell = &self.grid[(row, span.column)];
        DateKey::of(cell).ok_or_else(|| StoreError::InvalidDate {
            key: key.clone(),
            row,
            found: cell.to_string(),
        })
    }

    /// First row in `[from, rows)` whose date is not less than `target`.
    fn lower_bound(
        &self,
        key: &CompoundKey,
        span: Span,
        from: usize,
        target: DateKey,
    ) -> Result<usize> {
        let (mut lo, mut hi) = (from, self.grid.rows());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.date_key(key, span, mid)? < target {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Number of filled rows for `key` (the length of its dated prefix).
    pub fn filled_rows(&self, key: &CompoundKey) -> Result<usize> {
        let span = self.span(key)?;
        self.lower_bound(key, span, 0, DateKey::Unfilled)
    }

    /// Insertion point for `date`: the first row whose date is not less than
    /// `date`, counting blank rows as greater than any date. `None` when every
    /// row holds an earlier date.
    pub fn find_row_for_date(&self, key: &CompoundKey, date: NaiveDate) -> Result<Option<usize>> {
        let span = self.span(key)?;
        let row = self.lower_bound(key, span, 0, DateKey::Date(date))?;
        Ok((row < self.grid.rows()).then_some(row))
    }

    /// Upsert one dated entry, keeping the group's dates ascending. Returns
    /// the row written.
    ///
    /// Callers insert in any order as long as the existing group is sorted;
    /// an out-of-place neighbour is reported as `UnsortedInsertion`.
    pub fn insert_at_date(
        &mut self,
        key: &CompoundKey,
        date: NaiveDate,
        values: &[Cell],
    ) -> Result<usize> {
        let span = self.span(key)?;
        if values.len() != span.stride {
            return Err(StoreError::ArityMismatch {
                key: key.clone(),
                expected: span.stride,
                found: values.len(),
            });
        }

        if self.grid.rows() == 0 {
            let row = self.grid.push_blank_row();
            self.write_entry(span, row, date, values);
            return Ok(row);
        }

        let Some(row) = self.find_row_for_date(key, date)? else {
            let row = self.grid.push_blank_row();
            self.write_entry(span, row, date, values);
            return Ok(row);
        };

        if row > 0 && self.date_key(key, span, row - 1)? >= DateKey::Date(date) {
            return Err(StoreError::UnsortedInsertion {
                key: key.clone(),
                date,
                row,
            });
        }

        match self.date_key(key, span, row)? {
            DateKey::Unfilled => {}
            DateKey::Date(existing) if existing == date => {}
            DateKey::Date(existing) if existing > date => {
                let filled = self.lower_bound(key, span, row, DateKey::Unfilled)?;
                if filled == self.grid.rows() {
                    self.grid.push_blank_row();
                }
                let width = 1 + span.stride;
                for i in (row..filled).rev() {
                    self.grid.copy_slot(i, i + 1, span.column, width);
                }
            }
            DateKey::Date(_) => {
                return Err(StoreError::UnsortedInsertion {
                    key: key.clone(),
                    date,
                    row,
                })
            }
        }
        self.write_entry(span, row, date, values);
        Ok(row)
    }

    fn write_entry(&mut self, span: Span, row: usize, date: NaiveDate, values: &[Cell]) {
        self.grid[(row, span.column)] = Cell::Date(date);
        self.grid.write_slot(row, span.column + 1, values);
    }

    /// Filled `(date, values)` entries of one group, ascending.
    pub fn entries(&self, key: &CompoundKey) -> Result<Vec<(NaiveDate, &[Cell])>> {
        let span = self.span(key)?;
        let filled = self.lower_bound(key, span, 0, DateKey::Unfilled)?;
        let mut entries = Vec::with_capacity(filled);
        for row in 0..filled {
            if let DateKey::Date(date) = self.date_key(key, span, row)? {
                entries.push((date, self.grid.slot(row, span.column + 1, span.stride)));
            }
        }
        Ok(entries)
    }

    /// Most recent entry of one group.
    pub fn latest(&self, key: &CompoundKey) -> Result<Option<(NaiveDate, &[Cell])>> {
        Ok(self.entries(key)?.pop())
    }

    /// Verify every group: dates non-decreasing, blanks only trailing.
    pub fn check_sorted(&self) -> Result<()> {
        for group in self.catalog.groups() {
            let key = group.key();
            let span = Span {
                column: group.column(),
                stride: group.kind().stride(),
            };
            let mut prev: Option<NaiveDate> = None;
            let mut seen_blank = false;
            for row in 0..self.grid.rows() {
                match self.date_key(key, span, row)? {
                    DateKey::Unfilled => seen_blank = true,
                    DateKey::Date(d) => {
                        if seen_blank || prev.is_some_and(|p| p > d) {
                            return Err(StoreError::UnsortedInsertion {
                                key: key.clone(),
                                date: d,
                                row,
                            });
                        }
                        prev = Some(d);
                    }
                }
            }
        }
        Ok(())
    }

    /// Forward-fill every group independently into one row per day of
    /// `[start, end)`.
    ///
    /// For each day a group's cursor advances while its next row's date is on
    /// or before that day. Before a group's first date the cursor still sits
    /// on row 0, so its first values are emitted; groups without data emit
    /// blanks.
    pub fn materialize(&self, start: NaiveDate, end: NaiveDate) -> Result<DenseStore> {
        let days = days_between(start, end)?;

        let mut catalog = Catalog::new(self.layout().clone());
        let mut cursors = Vec::with_capacity(self.catalog.len());
        for group in self.catalog.groups() {
            let kind = group.kind();
            let dst = catalog
                .add(
                    group.key().clone(),
                    kind,
                    group.metadata().clone(),
                    DenseStore::slot_width(kind),
                )?
                .column();
            let dates: Vec<NaiveDate> = self
                .entries(group.key())?
                .into_iter()
                .map(|(date, _)| date)
                .collect();
            cursors.push(Cursor {
                src: group.column() + 1,
                dst,
                stride: kind.stride(),
                dates,
                pos: 0,
            });
        }

        let mut grid = Grid::blank(days, catalog.width());
        for day_index in 0..days {
            let day = start + Duration::days(day_index as i64);
            for cursor in &mut cursors {
                if cursor.dates.is_empty() {
                    continue;
                }
                while cursor.pos + 1 < cursor.dates.len() && cursor.dates[cursor.pos + 1] <= day {
                    cursor.pos += 1;
                }
                let values = self.grid.slot(cursor.pos, cursor.src, cursor.stride);
                grid.write_slot(day_index, cursor.dst, values);
            }
        }

        Ok(DenseStore::from_parts(catalog, grid, start))
    }

    /// Header block followed by the raw data rows.
    pub fn to_rows(&self) -> Vec<Vec<Cell>> {
        let mut rows = self.encode_headers();
        rows.extend(self.grid.to_rows());
        rows
    }

    /// Inverse of [`SparseStore::to_rows`]; rejects unsorted groups.
    pub fn from_rows(layout: Layout, rows: Vec<Vec<Cell>>) -> Result<Self> {
        let header_count = layout.header_rows();
        if rows.len() < header_count {
            return Err(StoreError::MalformedHeaders(format!(
                "expected at least {header_count} rows, found {}",
                rows.len()
            )));
        }
        let mut rows = rows.into_iter();
        let headers: Vec<Vec<Cell>> = rows.by_ref().take(header_count).collect();
        let catalog = Catalog::decode_headers(layout, &headers, Self::slot_width)?;

        let mut grid = Grid::new(catalog.width());
        for (i, row) in rows.enumerate() {
            let row = fit_row(row, catalog.width(), i)?;
            grid.push_row(row)
                .map_err(|e| StoreError::SchemaMismatch(e.to_string()))?;
        }
        // Parsed sheet text may hold timestamps; keep date columns as dates.
        for group in catalog.groups() {
            for row in 0..grid.rows() {
                let cell = &mut grid[(row, group.column())];
                if let Cell::DateTime(dt) = cell {
                    *cell = Cell::Date(dt.date());
                }
            }
        }

        let store = Self { catalog, grid };
        store.check_sorted()?;
        Ok(store)
    }
}

struct Cursor {
    src: usize,
    dst: usize,
    stride: usize,
    dates: Vec<NaiveDate>,
    pos: usize,
}

impl ColumnStore for SparseStore {
    const DATE_COLUMNS: usize = 1;

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn grid(&self) -> &Grid {
        &self.grid
    }

    fn parts_mut(&mut self) -> (&mut Catalog, &mut Grid) {
        (&mut self.catalog, &mut self.grid)
    }

    fn merge(&mut self, _others: &[&Self]) -> Result<()> {
        Err(StoreError::MergeUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{GroupKind, Metadata};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn key(s: &str) -> CompoundKey {
        CompoundKey::single(s).unwrap()
    }

    fn price(v: f64) -> Vec<Cell> {
        vec![Cell::Number(v)]
    }

    fn store(symbols: &[&str]) -> SparseStore {
        let mut s = SparseStore::new(Layout::prices());
        for sym in symbols {
            s.add_column_group(key(sym), GroupKind::Price, Metadata::new())
                .unwrap();
        }
        s
    }

    fn dates(s: &SparseStore, sym: &str) -> Vec<NaiveDate> {
        s.entries(&key(sym)).unwrap().into_iter().map(|(d, _)| d).collect()
    }

    #[test]
    fn first_insert_allocates_a_row() {
        let mut s = store(&["SPY"]);
        assert_eq!(s.insert_at_date(&key("SPY"), d(5), &price(1.0)).unwrap(), 0);
        assert_eq!(s.row_count(), 1);
        assert_eq!(s.grid().row(0), &[Cell::Date(d(5)), Cell::Number(1.0)]);
    }

    #[test]
    fn appends_past_the_last_date() {
        let mut s = store(&["SPY"]);
        s.insert_at_date(&key("SPY"), d(1), &price(1.0)).unwrap();
        s.insert_at_date(&key("SPY"), d(3), &price(3.0)).unwrap();
        assert_eq!(dates(&s, "SPY"), vec![d(1), d(3)]);
    }

    #[test]
    fn inserting_earlier_date_shifts_rows_down() {
        let mut s = store(&["SPY"]);
        for day in [1, 4, 6] {
            s.insert_at_date(&key("SPY"), d(day), &price(day as f64))
                .unwrap();
        }
        let row = s.insert_at_date(&key("SPY"), d(2), &price(2.0)).unwrap();
        assert_eq!(row, 1);
        assert_eq!(dates(&s, "SPY"), vec![d(1), d(2), d(4), d(6)]);
        assert_eq!(s.row_count(), 4);
        assert_eq!(s.slot(&key("SPY"), 3).unwrap()[1], Cell::Number(6.0));
    }

    #[test]
    fn shift_reuses_blank_row_from_other_group() {
        let mut s = store(&["SPY", "QQQ"]);
        for day in [1, 2, 3] {
            s.insert_at_date(&key("QQQ"), d(day), &price(0.0)).unwrap();
        }
        s.insert_at_date(&key("SPY"), d(5), &price(5.0)).unwrap();
        s.insert_at_date(&key("SPY"), d(2), &price(2.0)).unwrap();
        assert_eq!(s.row_count(), 3);
        assert_eq!(dates(&s, "SPY"), vec![d(2), d(5)]);
        assert_eq!(dates(&s, "QQQ"), vec![d(1), d(2), d(3)]);
    }

    #[test]
    fn equal_date_overwrites() {
        let mut s = store(&["SPY"]);
        s.insert_at_date(&key("SPY"), d(1), &price(1.0)).unwrap();
        s.insert_at_date(&key("SPY"), d(1), &price(9.0)).unwrap();
        assert_eq!(s.row_count(), 1);
        assert_eq!(s.latest(&key("SPY")).unwrap().unwrap().1, &[Cell::Number(9.0)]);
    }

    #[test]
    fn arity_is_checked() {
        let mut s = store(&["SPY"]);
        let err = s
            .insert_at_date(&key("SPY"), d(1), &[Cell::Number(1.0), Cell::Number(2.0)])
            .unwrap_err();
        assert!(matches!(err, StoreError::ArityMismatch { expected: 1, found: 2, .. }));
    }

    #[test]
    fn reserved_rows_are_filled_in_place() {
        let mut s = store(&["SPY"]);
        s.insert_at_date(&key("SPY"), d(1), &price(1.0)).unwrap();
        s.reserve_rows(2);
        assert_eq!(s.find_row_for_date(&key("SPY"), d(9)).unwrap(), Some(1));
        s.insert_at_date(&key("SPY"), d(9), &price(9.0)).unwrap();
        assert_eq!(s.row_count(), 3);
        assert_eq!(s.filled_rows(&key("SPY")).unwrap(), 2);
    }

    #[test]
    fn find_row_for_date_semantics() {
        let mut s = store(&["SPY"]);
        for day in [2, 4, 4, 8] {
            let row = s.row_count();
            s.reserve_rows(1);
            s.parts_mut().1.write_slot(row, 0, &[Cell::Date(d(day)), Cell::Number(1.0)]);
        }
        let k = key("SPY");
        assert_eq!(s.find_row_for_date(&k, d(1)).unwrap(), Some(0));
        assert_eq!(s.find_row_for_date(&k, d(4)).unwrap(), Some(1));
        assert_eq!(s.find_row_for_date(&k, d(5)).unwrap(), Some(3));
        assert_eq!(s.find_row_for_date(&k, d(9)).unwrap(), None);
    }

    #[test]
    fn unsorted_group_is_rejected() {
        let mut s = store(&["SPY"]);
        s.reserve_rows(2);
        s.parts_mut().1.write_slot(0, 0, &[Cell::Date(d(5)), Cell::Number(1.0)]);
        s.parts_mut().1.write_slot(1, 0, &[Cell::Date(d(3)), Cell::Number(1.0)]);
        assert!(matches!(s.check_sorted(), Err(StoreError::UnsortedInsertion { .. })));
        assert!(SparseStore::from_rows(Layout::prices(), s.to_rows()).is_err());
    }

    #[test]
    fn gap_before_trailing_date_is_unsorted() {
        let mut s = store(&["SPY"]);
        s.reserve_rows(2);
        s.parts_mut().1.write_slot(1, 0, &[Cell::Date(d(5)), Cell::Number(1.0)]);
        assert!(matches!(
            s.check_sorted(),
            Err(StoreError::UnsortedInsertion { row: 1, .. })
        ));
    }

    #[test]
    fn merge_is_unsupported() {
        let mut a = store(&["SPY"]);
        let b = store(&["QQQ"]);
        assert_eq!(a.merge(&[&b]), Err(StoreError::MergeUnsupported));
    }

    #[test]
    fn materialize_forward_fills_each_group_independently() {
        let mut s = store(&["A", "B"]);
        s.insert_at_date(&key("A"), d(1), &price(10.0)).unwrap();
        s.insert_at_date(&key("A"), d(4), &price(40.0)).unwrap();
        for day in [1, 2, 3] {
            s.insert_at_date(&key("B"), d(day), &price(day as f64)).unwrap();
        }

        let dense = s.materialize(d(1), d(6)).unwrap();
        assert_eq!(dense.row_count(), 5);
        let a: Vec<_> = dense
            .series(&key("A"), "price")
            .unwrap()
            .into_iter()
            .map(|(_, c)| c.clone())
            .collect();
        let b: Vec<_> = dense
            .series(&key("B"), "price")
            .unwrap()
            .into_iter()
            .map(|(_, c)| c.as_number().unwrap())
            .collect();
        assert_eq!(
            a,
            [10.0, 10.0, 10.0, 40.0, 40.0].map(Cell::Number).to_vec()
        );
        assert_eq!(b, vec![1.0, 2.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn materialize_before_first_date_emits_first_row() {
        let mut s = store(&["A", "EMPTY"]);
        s.insert_at_date(&key("A"), d(5), &price(5.0)).unwrap();
        let dense = s.materialize(d(1), d(3)).unwrap();
        assert_eq!(
            dense.value(&key("A"), "price", d(1)).unwrap(),
            Some(&Cell::Number(5.0))
        );
        assert_eq!(
            dense.value(&key("EMPTY"), "price", d(1)).unwrap(),
            Some(&Cell::Empty)
        );
    }

    #[test]
    fn rows_roundtrip() {
        let mut s = store(&["A", "B"]);
        s.insert_at_date(&key("A"), d(1), &price(1.0)).unwrap();
        s.insert_at_date(&key("B"), d(2), &price(2.0)).unwrap();
        s.insert_at_date(&key("B"), d(3), &price(3.0)).unwrap();
        let back = SparseStore::from_rows(Layout::prices(), s.to_rows()).unwrap();
        assert_eq!(back, s);
    }
}

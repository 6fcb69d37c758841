//! Column-group catalog: per-series type, metadata and compound key.
//!
//! The catalog also owns the header block encoding shared by both store
//! variants. Headers are `1 + |metadata| + |key parts|` rows: row 0 holds the
//! group type token at each group's first column, then one row per metadata
//! field, then one row per key part, all aligned to the same columns.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::error::{Result, StoreError};
use crate::key::CompoundKey;

/// Logical type of a column group. Drives stride and field layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    /// Asset price series.
    Price,
    /// Currency conversion rate series.
    FxRate,
    /// Portfolio holding: price and amount held.
    Holding,
}

impl GroupKind {
    pub const ALL: [GroupKind; 3] = [GroupKind::Price, GroupKind::FxRate, GroupKind::Holding];

    /// Token written to header row 0.
    pub fn token(self) -> &'static str {
        match self {
            GroupKind::Price => "price",
            GroupKind::FxRate => "fx",
            GroupKind::Holding => "holding",
        }
    }

    pub fn from_token(token: &str) -> Result<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.token() == token)
            .ok_or_else(|| StoreError::UnknownGroupType(token.to_string()))
    }

    /// Field names in offset order.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            GroupKind::Price => &["price"],
            GroupKind::FxRate => &["rate"],
            GroupKind::Holding => &["price", "amount"],
        }
    }

    pub fn stride(self) -> usize {
        self.fields().len()
    }

    pub fn field_offset(self, field: &str) -> Result<usize> {
        self.fields()
            .iter()
            .position(|f| *f == field)
            .ok_or_else(|| StoreError::UnknownField {
                kind: self.token(),
                field: field.to_string(),
            })
    }
}

/// Store-level header shape: which metadata fields and key parts every
/// group carries, in header-row order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub metadata_fields: Vec<String>,
    pub key_parts: Vec<String>,
}

impl Layout {
    pub fn new<M, K>(metadata_fields: M, key_parts: K) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        K: IntoIterator,
        K::Item: Into<String>,
    {
        Self {
            metadata_fields: metadata_fields.into_iter().map(Into::into).collect(),
            key_parts: key_parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Price store: currency and fetch status per symbol.
    pub fn prices() -> Self {
        Self::new(["currency", "status"], ["symbol"])
    }

    /// Holdings store: one group per (account, symbol).
    pub fn holdings() -> Self {
        Self::new(["currency"], ["account", "symbol"])
    }

    pub fn header_rows(&self) -> usize {
        1 + self.metadata_fields.len() + self.key_parts.len()
    }
}

pub type Metadata = BTreeMap<String, Cell>;

/// One fixed-width vertical slice of a value grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnGroup {
    key: CompoundKey,
    kind: GroupKind,
    metadata: Metadata,
    column: usize,
}

impl ColumnGroup {
    pub fn key(&self) -> &CompoundKey {
        &self.key
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    /// Zero-based offset of the group's first cell in a data row.
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Metadata value, `Empty` when blank.
    pub fn meta(&self, field: &str) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        self.metadata.get(field).unwrap_or(&EMPTY)
    }

    /// Metadata value as trimmed text, `None` when blank.
    pub fn meta_text(&self, field: &str) -> Option<String> {
        let cell = self.meta(field);
        if cell.is_blank() {
            None
        } else {
            Some(cell.to_string().trim().to_string())
        }
    }
}

/// Ordered set of column groups with a key index.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    layout: Layout,
    groups: Vec<ColumnGroup>,
    index: HashMap<CompoundKey, usize>,
    width: usize,
}

impl Catalog {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            groups: Vec::new(),
            index: HashMap::new(),
            width: 0,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total data-row width consumed by all groups.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn groups(&self) -> impl Iterator<Item = &ColumnGroup> {
        self.groups.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CompoundKey> {
        self.groups.iter().map(|g| &g.key)
    }

    pub fn contains(&self, key: &CompoundKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &CompoundKey) -> Option<&ColumnGroup> {
        self.index.get(key).map(|&i| &self.groups[i])
    }

    pub fn require(&self, key: &CompoundKey) -> Result<&ColumnGroup> {
        self.get(key)
            .ok_or_else(|| StoreError::UnknownKey(key.clone()))
    }

    /// Append a group at the current width. `slot_width` is the number of
    /// data cells the owning store gives this group per row.
    pub fn add(
        &mut self,
        key: CompoundKey,
        kind: GroupKind,
        metadata: Metadata,
        slot_width: usize,
    ) -> Result<&ColumnGroup> {
        if key.len() != self.layout.key_parts.len() {
            return Err(StoreError::KeyArity {
                expected: self.layout.key_parts.len(),
                found: key.len(),
                key,
            });
        }
        if self.index.contains_key(&key) {
            return Err(StoreError::DuplicateKey(key));
        }
        if let Some(unknown) = metadata
            .keys()
            .find(|f| !self.layout.metadata_fields.contains(f))
        {
            return Err(StoreError::UnknownMetadataField(unknown.clone()));
        }

        let mut normalized = Metadata::new();
        for field in &self.layout.metadata_fields {
            let value = metadata.get(field).cloned().unwrap_or_default();
            normalized.insert(field.clone(), value);
        }

        let group = ColumnGroup {
            key: key.clone(),
            kind,
            metadata: normalized,
            column: self.width,
        };
        self.width += slot_width;
        self.index.insert(key, self.groups.len());
        self.groups.push(group);
        Ok(&self.groups[self.groups.len() - 1])
    }

    /// Same layout and the same keys and kinds in the same column order.
    pub fn same_schema(&self, other: &Catalog) -> bool {
        self.layout == other.layout
            && self.width == other.width
            && self.groups.len() == other.groups.len()
            && self
                .groups
                .iter()
                .zip(&other.groups)
                .all(|(a, b)| a.key == b.key && a.kind == b.kind && a.column == b.column)
    }

    /// Encode the header block. Every row is `width()` cells wide.
    pub fn encode_headers(&self) -> Vec<Vec<Cell>> {
        let mut headers = vec![vec![Cell::Empty; self.width]; self.layout.header_rows()];
        let meta_base = 1;
        let key_base = 1 + self.layout.metadata_fields.len();

        for group in &self.groups {
            let col = group.column;
            headers[0][col] = Cell::text(group.kind.token());
            for (i, field) in self.layout.metadata_fields.iter().enumerate() {
                headers[meta_base + i][col] = group.meta(field).clone();
            }
            for (i, part) in group.key.parts().enumerate() {
                headers[key_base + i][col] = Cell::text(part);
            }
        }
        headers
    }

    /// Rebuild a catalog from a header block. `slot_width` maps a group type
    /// to its data width in the owning store.
    pub fn decode_headers(
        layout: Layout,
        headers: &[Vec<Cell>],
        slot_width: impl Fn(GroupKind) -> usize,
    ) -> Result<Self> {
        let expected = layout.header_rows();
        if headers.len() != expected {
            return Err(StoreError::MalformedHeaders(format!(
                "expected {expected} header rows, found {}",
                headers.len()
            )));
        }
        let type_row = &headers[0];
        let meta_base = 1;
        let key_base = 1 + layout.metadata_fields.len();
        let mut catalog = Catalog::new(layout);

        let mut col = 0;
        while col < type_row.len() {
            let token = &type_row[col];
            if token.is_blank() {
                if type_row[col..].iter().all(Cell::is_blank) {
                    break;
                }
                return Err(StoreError::MalformedHeaders(format!(
                    "blank type cell at column {col} followed by more groups"
                )));
            }
            let kind = GroupKind::from_token(&token.to_string())?;
            let width = slot_width(kind);
            // Sheets trim trailing blank columns, so the last group may be
            // cut short; missing cells read as blank.
            let end = (col + width).min(type_row.len());
            if let Some(stray) = (col + 1..end).find(|&c| !type_row[c].is_blank()) {
                return Err(StoreError::MalformedHeaders(format!(
                    "type cell at column {stray} falls inside the group starting at {col}"
                )));
            }

            let mut metadata = Metadata::new();
            for (i, field) in catalog.layout.metadata_fields.iter().enumerate() {
                let cell = header_cell(headers, meta_base + i, col)?;
                metadata.insert(field.clone(), cell.clone());
            }

            let mut parts = Vec::with_capacity(catalog.layout.key_parts.len());
            for (i, name) in catalog.layout.key_parts.iter().enumerate() {
                let cell = header_cell(headers, key_base + i, col)?;
                if cell.is_blank() {
                    return Err(StoreError::MalformedHeaders(format!(
                        "blank key part '{name}' at column {col}"
                    )));
                }
                parts.push(cell.to_string().trim().to_string());
            }
            let key = CompoundKey::new(parts)?;

            debug_assert_eq!(catalog.width, col);
            catalog.add(key, kind, metadata, width)?;
            col += width;
        }
        Ok(catalog)
    }
}

fn header_cell(headers: &[Vec<Cell>], row: usize, col: usize) -> Result<&Cell> {
    headers[row].get(col).ok_or_else(|| {
        StoreError::MalformedHeaders(format!("header row {row} is too short for column {col}"))
    })
}

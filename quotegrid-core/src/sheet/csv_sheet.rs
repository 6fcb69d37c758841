//! CSV-file backed sheet.
//!
//! The whole file is held in memory; [`CsvSheet::save`] writes it back
//! atomically through a `.tmp` sibling and a rename.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{MemorySheet, Range, SheetError, TabularStore};
use crate::cell::Cell;

#[derive(Debug, Clone)]
pub struct CsvSheet {
    path: PathBuf,
    sheet: MemorySheet,
}

impl CsvSheet {
    /// Load `path`. A missing file opens as an empty sheet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SheetError> {
        let path = path.into();
        if !path.exists() {
            debug!(path = %path.display(), "sheet file missing, starting empty");
            return Ok(Self {
                path,
                sheet: MemorySheet::new(),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(Cell::parse).collect());
        }
        debug!(path = %path.display(), rows = rows.len(), "loaded sheet");
        Ok(Self {
            path,
            sheet: MemorySheet::from_rows(rows),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the used extent back to disk.
    pub fn save(&self) -> Result<(), SheetError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("csv.tmp");
        let width = self.sheet.last_column();
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&tmp_path)?;
            for row in self.sheet.get_all()? {
                let mut fields: Vec<String> = row.iter().map(Cell::to_string).collect();
                fields.resize(width, String::new());
                writer.write_record(&fields)?;
            }
            writer.flush()?;
        }
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        debug!(path = %self.path.display(), rows = self.sheet.last_row(), "saved sheet");
        Ok(())
    }
}

impl TabularStore for CsvSheet {
    fn get_values(&self, range: Range) -> Result<Vec<Vec<Cell>>, SheetError> {
        self.sheet.get_values(range)
    }

    fn set_values(
        &mut self,
        row: usize,
        column: usize,
        values: &[Vec<Cell>],
    ) -> Result<(), SheetError> {
        self.sheet.set_values(row, column, values)
    }

    fn clear(&mut self, range: Range) -> Result<(), SheetError> {
        self.sheet.clear(range)
    }

    fn last_row(&self) -> usize {
        self.sheet.last_row()
    }

    fn last_column(&self) -> usize {
        self.sheet.last_column()
    }
}

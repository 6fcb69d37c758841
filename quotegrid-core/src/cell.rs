//! Cell values held by the tabular backing store and the value grids.

use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One cell of a sheet or value grid.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Interpret raw sheet text. Dates win over numbers so `2024-01-02` is a
    /// date, not an arithmetic expression.
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        if s.is_empty() {
            return Cell::Empty;
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
            return Cell::Date(d);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, DATETIME_FORMAT) {
            return Cell::DateTime(dt);
        }
        // f64 parsing accepts "inf"/"nan"; tickers like INF must stay text.
        let numeric_start = s
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
        // Only canonical spellings become numbers, so codes like `000001`
        // or `1.50` keep their text through a save and reload.
        if numeric_start {
            if let Ok(n) = s.parse::<f64>() {
                if n.to_string() == s {
                    return Cell::Number(n);
                }
            }
        }
        Cell::Text(raw.to_string())
    }

    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// Blank cells are `Empty` or empty text; both act as the "unfilled" sentinel.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Calendar day of this cell, with timestamps normalized to midnight.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::DateTime(dt) => Some(dt.date()),
            Cell::Text(s) => match Cell::parse(s) {
                Cell::Date(d) => Some(d),
                Cell::DateTime(dt) => Some(dt.date()),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => f.write_str(s),
            Cell::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Cell::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<NaiveDate> for Cell {
    fn from(d: NaiveDate) -> Self {
        Cell::Date(d)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

/// Sort key for a date column: real dates ascend, and the unfilled sentinel
/// sorts after every date so trailing reserved rows stay at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DateKey {
    Date(NaiveDate),
    Unfilled,
}

impl DateKey {
    /// `None` when the cell holds something that is neither blank nor a date.
    pub fn of(cell: &Cell) -> Option<Self> {
        if cell.is_blank() {
            Some(DateKey::Unfilled)
        } else {
            cell.as_date().map(DateKey::Date)
        }
    }

    pub fn cmp_date(&self, date: NaiveDate) -> Ordering {
        self.cmp(&DateKey::Date(date))
    }
}

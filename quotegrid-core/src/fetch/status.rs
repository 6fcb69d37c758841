//! Persisted per-symbol price-fetch status, stored in a group's `status`
//! metadata cell.

use std::fmt;

use crate::cell::Cell;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PriceFetchStatus {
    #[default]
    Unknown,
    Available,
    NotAvailable,
    Defunct,
    /// Any status set by hand that this crate does not manage.
    Other(String),
}

impl PriceFetchStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PriceFetchStatus::Unknown => "",
            PriceFetchStatus::Available => "available",
            PriceFetchStatus::NotAvailable => "not-available",
            PriceFetchStatus::Defunct => "defunct",
            PriceFetchStatus::Other(s) => s,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "unknown" => PriceFetchStatus::Unknown,
            "available" => PriceFetchStatus::Available,
            "not-available" => PriceFetchStatus::NotAvailable,
            "defunct" => PriceFetchStatus::Defunct,
            other => PriceFetchStatus::Other(other.to_string()),
        }
    }

    pub fn from_cell(cell: &Cell) -> Self {
        if cell.is_blank() {
            PriceFetchStatus::Unknown
        } else {
            Self::parse(&cell.to_string())
        }
    }

    pub fn to_cell(&self) -> Cell {
        match self {
            PriceFetchStatus::Unknown => Cell::Empty,
            other => Cell::text(other.as_str()),
        }
    }

    /// Only unknown and available symbols are worth a request.
    pub fn is_fetchable(&self) -> bool {
        matches!(self, PriceFetchStatus::Unknown | PriceFetchStatus::Available)
    }
}

impl fmt::Display for PriceFetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceFetchStatus::Unknown => f.pad("unknown"),
            other => f.pad(other.as_str()),
        }
    }
}

/// Status after one job, given the status before it.
///
/// Unfetchable statuses are sticky; only an available symbol can become
/// defunct.
pub fn price_fetch_status(prior: &PriceFetchStatus, success: bool) -> PriceFetchStatus {
    match (prior, success) {
        (PriceFetchStatus::Unknown, true) => PriceFetchStatus::Available,
        (PriceFetchStatus::Unknown, false) => PriceFetchStatus::NotAvailable,
        (PriceFetchStatus::Available, true) => PriceFetchStatus::Available,
        (PriceFetchStatus::Available, false) => PriceFetchStatus::Defunct,
        (other, _) => other.clone(),
    }
}

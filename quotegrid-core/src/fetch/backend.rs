//! The scratch request/response area the orchestrator writes queries into.
//!
//! Each request occupies one `QUERY_STRIDE`-wide slot of the scratch area.
//! A slot's answer is either data rows or the unavailable marker in its
//! first cell; a blank request leaves its slot blank.

use chrono::NaiveDate;
use tracing::debug;

use super::error::FetchError;
use super::job::QUERY_STRIDE;
use super::provider::QuoteProvider;
use crate::cell::Cell;
use crate::grid::Grid;
use crate::sheet::{MemorySheet, Range, TabularStore};

/// Marker a slot carries when the provider had no answer.
pub const UNAVAILABLE: &str = "#N/A";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteRequest {
    /// Close prices over `[start, end)`.
    History {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    LivePrice {
        symbol: String,
    },
    Currency {
        symbol: String,
    },
}

impl QuoteRequest {
    pub fn symbol(&self) -> &str {
        match self {
            QuoteRequest::History { symbol, .. }
            | QuoteRequest::LivePrice { symbol }
            | QuoteRequest::Currency { symbol } => symbol,
        }
    }
}

pub trait QuoteBackend {
    fn unavailable_marker(&self) -> &str;

    fn clear_scratch(&mut self) -> Result<(), FetchError>;

    /// Evaluate one slot per entry; `None` leaves the slot blank.
    fn submit(&mut self, requests: &[Option<QuoteRequest>]) -> Result<(), FetchError>;

    /// The whole scratch area, `QUERY_STRIDE` columns per submitted slot.
    fn read_results(&self) -> Result<Grid, FetchError>;

    /// Whether a slot's first cell says "no data".
    fn is_unavailable(&self, first: Option<&Cell>) -> bool {
        match first {
            None => true,
            Some(cell) if cell.is_blank() => true,
            Some(cell) => cell.as_str().is_some_and(|s| s.trim() == self.unavailable_marker()),
        }
    }
}

/// Backend that answers requests through a [`QuoteProvider`] into an
/// in-memory scratch sheet.
pub struct ProviderBackend<P> {
    provider: P,
    scratch: MemorySheet,
    slots: usize,
}

impl<P: QuoteProvider> ProviderBackend<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            scratch: MemorySheet::new(),
            slots: 0,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn answer(&self, request: &QuoteRequest) -> Vec<Vec<Cell>> {
        let unavailable = || vec![vec![Cell::text(UNAVAILABLE)]];
        let symbol = request.symbol();
        if !self.provider.is_available() {
            debug!(provider = self.provider.name(), symbol, "provider unavailable");
            return unavailable();
        }
        let answer = match request {
            QuoteRequest::History { start, end, .. } => {
                self.provider.history(symbol, *start, *end).map(|points| {
                    points
                        .into_iter()
                        .map(|p| vec![Cell::DateTime(p.timestamp), Cell::Number(p.close)])
                        .collect()
                })
            }
            QuoteRequest::LivePrice { .. } => self
                .provider
                .live_price(symbol)
                .map(|price| vec![vec![Cell::Number(price)]]),
            QuoteRequest::Currency { .. } => self
                .provider
                .currency(symbol)
                .map(|code| vec![vec![Cell::text(code)]]),
        };
        match answer {
            Ok(rows) if !rows.is_empty() => rows,
            Ok(_) => unavailable(),
            Err(e) => {
                debug!(provider = self.provider.name(), symbol, error = %e, "request unavailable");
                unavailable()
            }
        }
    }
}

impl<P: QuoteProvider> QuoteBackend for ProviderBackend<P> {
    fn unavailable_marker(&self) -> &str {
        UNAVAILABLE
    }

    fn clear_scratch(&mut self) -> Result<(), FetchError> {
        self.scratch.clear_all()?;
        self.slots = 0;
        Ok(())
    }

    fn submit(&mut self, requests: &[Option<QuoteRequest>]) -> Result<(), FetchError> {
        self.slots = requests.len();
        for (slot, request) in requests.iter().enumerate() {
            if let Some(request) = request {
                let rows = self.answer(request);
                self.scratch.set_values(0, slot * QUERY_STRIDE, &rows)?;
            }
        }
        Ok(())
    }

    fn read_results(&self) -> Result<Grid, FetchError> {
        let width = self.slots * QUERY_STRIDE;
        let rows = self
            .scratch
            .get_values(Range::new(0, 0, self.scratch.last_row(), width))?;
        let mut grid = Grid::new(width);
        for row in rows {
            grid.push_row(row)?;
        }
        Ok(grid)
    }
}

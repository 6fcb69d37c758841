//! Scripted quote backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate};
use quotegrid_core::fetch::{FetchConfig, FetchError, QuoteBackend, QuoteRequest, QUERY_STRIDE, UNAVAILABLE};
use quotegrid_core::{Cell, Grid};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Chunking as configured in production, without the backoff sleep.
pub fn fast_config(max_chunk_symbols: usize, max_chunk_interval_days: u32, retries: u32) -> FetchConfig {
    FetchConfig {
        max_chunk_symbols,
        max_chunk_interval_days,
        retries,
        backoff_ms: 0,
    }
}

/// Deterministic close for `symbol` on `day`.
pub fn close(symbol: &str, day: NaiveDate) -> f64 {
    let base = symbol.bytes().map(f64::from).sum::<f64>();
    base + (day - d(2000, 1, 1)).num_days() as f64 / 100.0
}

/// Answers history requests with one close every `step_days` days. Symbols
/// can be made to fail a number of times, always, or for one sub-range.
#[derive(Default)]
pub struct ScriptedBackend {
    pub step_days: i64,
    pub unknown: HashSet<String>,
    /// Remaining history attempts to fail per symbol.
    pub flaky: HashMap<String, u32>,
    /// History requests starting on this date fail.
    pub failing_spans: HashMap<String, NaiveDate>,
    pub malformed: HashSet<String>,
    pub currencies: HashMap<String, String>,
    pub live: HashMap<String, f64>,
    /// Every request submitted, in order.
    pub log: Vec<QuoteRequest>,
    slots: Vec<Vec<Vec<Cell>>>,
}

impl ScriptedBackend {
    pub fn daily() -> Self {
        Self {
            step_days: 1,
            ..Self::default()
        }
    }

    pub fn every(step_days: i64) -> Self {
        Self {
            step_days,
            ..Self::default()
        }
    }

    pub fn history_requests(&self) -> usize {
        self.log
            .iter()
            .filter(|r| matches!(r, QuoteRequest::History { .. }))
            .count()
    }

    fn history(&mut self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<Vec<Cell>> {
        if self.unknown.contains(symbol) || self.failing_spans.get(symbol) == Some(&start) {
            return unavailable();
        }
        if let Some(left) = self.flaky.get_mut(symbol) {
            if *left > 0 {
                *left -= 1;
                return unavailable();
            }
        }
        if self.malformed.contains(symbol) {
            return vec![
                vec![Cell::Date(start), Cell::Number(1.0)],
                vec![Cell::Date(start), Cell::text("oops")],
            ];
        }
        let mut rows = Vec::new();
        let mut day = start;
        while day < end {
            rows.push(vec![Cell::Date(day), Cell::Number(close(symbol, day))]);
            day += Duration::days(self.step_days.max(1));
        }
        if rows.is_empty() {
            return unavailable();
        }
        rows
    }

    fn answer(&mut self, request: &QuoteRequest) -> Vec<Vec<Cell>> {
        match request {
            QuoteRequest::History { symbol, start, end } => self.history(symbol, *start, *end),
            QuoteRequest::LivePrice { symbol } => match self.live.get(symbol) {
                Some(&p) => vec![vec![Cell::Number(p)]],
                None => unavailable(),
            },
            QuoteRequest::Currency { symbol } => match self.currencies.get(symbol) {
                Some(c) => vec![vec![Cell::text(c.as_str())]],
                None => unavailable(),
            },
        }
    }
}

fn unavailable() -> Vec<Vec<Cell>> {
    vec![vec![Cell::text(UNAVAILABLE)]]
}

impl QuoteBackend for ScriptedBackend {
    fn unavailable_marker(&self) -> &str {
        UNAVAILABLE
    }

    fn clear_scratch(&mut self) -> Result<(), FetchError> {
        self.slots.clear();
        Ok(())
    }

    fn submit(&mut self, requests: &[Option<QuoteRequest>]) -> Result<(), FetchError> {
        self.slots = Vec::with_capacity(requests.len());
        for request in requests {
            let rows = match request {
                Some(request) => {
                    self.log.push(request.clone());
                    self.answer(request)
                }
                None => Vec::new(),
            };
            self.slots.push(rows);
        }
        Ok(())
    }

    fn read_results(&self) -> Result<Grid, FetchError> {
        let height = self.slots.iter().map(Vec::len).max().unwrap_or(0);
        let mut grid = Grid::blank(height, self.slots.len() * QUERY_STRIDE);
        for (slot, rows) in self.slots.iter().enumerate() {
            for (r, row) in rows.iter().enumerate() {
                grid.write_slot(r, slot * QUERY_STRIDE, row);
            }
        }
        Ok(grid)
    }
}

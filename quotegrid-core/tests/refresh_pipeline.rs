//! End-to-end refresh: existing price store + scripted provider -> updated
//! store, statuses and the materialized daily store.

mod common;

use chrono::NaiveDate;
use common::{close, d, fast_config, ScriptedBackend};
use quotegrid_core::fetch::{FetchOrchestrator, NullReporter, PriceFetchStatus, QuoteRequest};
use quotegrid_core::refresh::{CURRENCY_FIELD, STATUS_FIELD};
use quotegrid_core::sheet::{read_sparse, write_sparse, MemorySheet};
use quotegrid_core::{
    refresh_prices, Cell, ColumnStore, CompoundKey, GroupKind, Layout, Metadata, SparseStore,
};

fn key(s: &str) -> CompoundKey {
    CompoundKey::single(s).unwrap()
}

fn meta(status: &str, currency: &str) -> Metadata {
    let mut m = Metadata::new();
    m.insert(STATUS_FIELD.into(), Cell::text(status));
    m.insert(CURRENCY_FIELD.into(), Cell::text(currency));
    m
}

fn existing_store() -> SparseStore {
    let mut store = SparseStore::new(Layout::prices());
    store
        .add_column_group(key("SPY"), GroupKind::Price, meta("available", "USD"))
        .unwrap();
    store
        .add_column_group(key("OLD"), GroupKind::Price, meta("available", "GBP"))
        .unwrap();
    store
        .add_column_group(key("DEAD"), GroupKind::Price, meta("defunct", "USD"))
        .unwrap();
    store.insert_at_date(&key("SPY"), d(2024, 1, 1), &[Cell::Number(470.0)]).unwrap();
    store.insert_at_date(&key("SPY"), d(2024, 1, 2), &[Cell::Number(999.0)]).unwrap();
    store.insert_at_date(&key("OLD"), d(2023, 12, 20), &[Cell::Number(12.5)]).unwrap();
    store.insert_at_date(&key("DEAD"), d(2023, 12, 29), &[Cell::Number(3.0)]).unwrap();
    store
}

fn backend() -> ScriptedBackend {
    let mut backend = ScriptedBackend::daily();
    backend.unknown.insert("GONE".into());
    backend.currencies.insert("NEW".into(), "EUR".into());
    backend
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn dates(store: &SparseStore, symbol: &str) -> Vec<NaiveDate> {
    store.entries(&key(symbol)).unwrap().into_iter().map(|(d, _)| d).collect()
}

#[test]
fn refresh_merges_fetched_prices_and_updates_statuses() {
    let existing = existing_store();
    let mut orch = FetchOrchestrator::new(fast_config(10, 365, 2), backend()).with_reporter(NullReporter);
    let (start, end) = (d(2024, 1, 2), d(2024, 1, 6));

    let outcome = refresh_prices(
        &mut orch,
        &existing,
        &symbols(&["SPY", "NEW", "DEAD", "GONE"]),
        start,
        end,
    )
    .unwrap();

    // Statuses follow the classification table; DEAD was never requested.
    assert_eq!(outcome.statuses["SPY"], PriceFetchStatus::Available);
    assert_eq!(outcome.statuses["NEW"], PriceFetchStatus::Available);
    assert_eq!(outcome.statuses["DEAD"], PriceFetchStatus::Defunct);
    assert_eq!(outcome.statuses["GONE"], PriceFetchStatus::NotAvailable);
    assert!(orch.backend().log.iter().all(|r| r.symbol() != "DEAD"));
    assert_eq!(outcome.summary.skipped, 1);

    let prices = &outcome.prices;
    let keys: Vec<String> = prices.catalog().keys().map(CompoundKey::joined).collect();
    assert_eq!(keys, ["SPY", "OLD", "DEAD", "NEW", "GONE"]);

    // SPY keeps its older entry; the fetched close replaces Jan 2.
    assert_eq!(
        dates(prices, "SPY"),
        [d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4), d(2024, 1, 5)]
    );
    let spy = prices.entries(&key("SPY")).unwrap();
    assert_eq!(spy[0].1[0].as_number(), Some(470.0));
    assert_eq!(spy[1].1[0].as_number(), Some(close("SPY", d(2024, 1, 2))));

    assert_eq!(dates(prices, "NEW").len(), 4);
    assert!(dates(prices, "GONE").is_empty());
    assert_eq!(dates(prices, "OLD"), [d(2023, 12, 20)]);

    let new = prices.group(&key("NEW")).unwrap();
    assert_eq!(new.meta_text(CURRENCY_FIELD).as_deref(), Some("EUR"));
    assert_eq!(new.meta_text(STATUS_FIELD).as_deref(), Some("available"));
    let gone = prices.group(&key("GONE")).unwrap();
    assert_eq!(gone.meta_text(STATUS_FIELD).as_deref(), Some("not-available"));
    let old = prices.group(&key("OLD")).unwrap();
    assert_eq!(old.metadata(), &meta("available", "GBP"));

    // Currency was only looked up where none was stored.
    let asked: Vec<&str> = orch
        .backend()
        .log
        .iter()
        .filter(|r| matches!(r, QuoteRequest::Currency { .. }))
        .map(QuoteRequest::symbol)
        .collect();
    assert!(asked.contains(&"NEW"));
    assert!(!asked.contains(&"SPY"));
}

#[test]
fn daily_store_forward_fills_every_group_over_the_range() {
    let existing = existing_store();
    let mut orch = FetchOrchestrator::new(fast_config(10, 365, 1), backend()).with_reporter(NullReporter);
    let (start, end) = (d(2024, 1, 2), d(2024, 1, 6));

    let outcome = refresh_prices(&mut orch, &existing, &symbols(&["SPY"]), start, end).unwrap();
    let daily = &outcome.daily;

    assert_eq!(daily.start_date(), start);
    assert_eq!(daily.row_count(), 4);
    let old = daily.series(&key("OLD"), "price").unwrap();
    assert!(old.iter().all(|(_, c)| c.as_number() == Some(12.5)));
    let spy = daily.series(&key("SPY"), "price").unwrap();
    assert_eq!(spy[3].1.as_number(), Some(close("SPY", d(2024, 1, 5))));
}

#[test]
fn persisted_statuses_stop_future_requests() {
    let mut sheet = MemorySheet::new();
    write_sparse(&mut sheet, &existing_store()).unwrap();

    let (start, end) = (d(2024, 1, 2), d(2024, 1, 4));
    let list = symbols(&["SPY", "GONE"]);

    let loaded = read_sparse(&sheet, Layout::prices()).unwrap();
    let mut first = FetchOrchestrator::new(fast_config(10, 365, 1), backend()).with_reporter(NullReporter);
    let outcome = refresh_prices(&mut first, &loaded, &list, start, end).unwrap();
    assert_eq!(outcome.statuses["GONE"], PriceFetchStatus::NotAvailable);
    write_sparse(&mut sheet, &outcome.prices).unwrap();

    let reloaded = read_sparse(&sheet, Layout::prices()).unwrap();
    assert_eq!(reloaded, outcome.prices);
    let mut second = FetchOrchestrator::new(fast_config(10, 365, 1), backend()).with_reporter(NullReporter);
    let outcome = refresh_prices(&mut second, &reloaded, &list, start, end).unwrap();

    assert!(second.backend().log.iter().all(|r| r.symbol() != "GONE"));
    assert_eq!(outcome.statuses["GONE"], PriceFetchStatus::NotAvailable);
    assert_eq!(outcome.statuses["SPY"], PriceFetchStatus::Available);
}

#[test]
fn available_symbol_that_stops_answering_turns_defunct() {
    let existing = existing_store();
    let mut dead = backend();
    dead.unknown.insert("SPY".into());
    let mut orch = FetchOrchestrator::new(fast_config(10, 365, 1), dead).with_reporter(NullReporter);

    let outcome =
        refresh_prices(&mut orch, &existing, &symbols(&["SPY"]), d(2024, 1, 2), d(2024, 1, 4)).unwrap();

    assert_eq!(outcome.statuses["SPY"], PriceFetchStatus::Defunct);
    // Stored prices survive a failed refresh.
    assert_eq!(dates(&outcome.prices, "SPY"), [d(2024, 1, 1), d(2024, 1, 2)]);
}

#[test]
fn inverted_range_is_rejected() {
    let existing = existing_store();
    let mut orch = FetchOrchestrator::new(fast_config(10, 365, 1), backend()).with_reporter(NullReporter);
    let result = refresh_prices(&mut orch, &existing, &symbols(&["SPY"]), d(2024, 1, 5), d(2024, 1, 2));
    assert!(result.is_err());
    assert!(orch.backend().log.is_empty());
}

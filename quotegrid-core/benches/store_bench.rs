//! Criterion benchmarks for store hot paths.
//!
//! Benchmarks:
//! 1. Sparse insertion (appending and shifting inserts)
//! 2. Binary search for a date's row
//! 3. Materializing a sparse store into daily rows
//! 4. Merging chunked fetch results

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::{Duration, NaiveDate};
use quotegrid_core::fetch::{merge_chunk_jobs, FetchJob, SymbolFetchState};
use quotegrid_core::{Cell, ColumnStore, CompoundKey, GroupKind, Layout, Metadata, SparseStore};

// ── Helpers ──────────────────────────────────────────────────────────

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

fn symbols(n: usize) -> Vec<CompoundKey> {
    (0..n)
        .map(|i| CompoundKey::single(&format!("SYM{i:03}")).unwrap())
        .collect()
}

/// `groups` series, each with a weekday-only close over `days` days.
fn make_store(groups: usize, days: i64) -> SparseStore {
    let mut store = SparseStore::new(Layout::prices());
    let keys = symbols(groups);
    for key in &keys {
        store
            .add_column_group(key.clone(), GroupKind::Price, Metadata::new())
            .unwrap();
    }
    for (g, key) in keys.iter().enumerate() {
        for i in 0..days {
            if i % 7 >= 5 {
                continue;
            }
            let close = 100.0 + g as f64 + (i as f64 * 0.1).sin() * 10.0;
            store
                .insert_at_date(key, base_date() + Duration::days(i), &[Cell::Number(close)])
                .unwrap();
        }
    }
    store
}

// ── 1. Sparse insertion ──────────────────────────────────────────────

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparse_insert");
    for &days in &[250_i64, 2500] {
        group.bench_with_input(BenchmarkId::new("append", days), &days, |b, &days| {
            b.iter(|| black_box(make_store(1, days)))
        });
        group.bench_with_input(BenchmarkId::new("reverse", days), &days, |b, &days| {
            b.iter(|| {
                let key = CompoundKey::single("SPY").unwrap();
                let mut store = SparseStore::new(Layout::prices());
                store
                    .add_column_group(key.clone(), GroupKind::Price, Metadata::new())
                    .unwrap();
                for i in (0..days).rev() {
                    store
                        .insert_at_date(&key, base_date() + Duration::days(i), &[Cell::Number(1.0)])
                        .unwrap();
                }
                black_box(store)
            })
        });
    }
    group.finish();
}

// ── 2. Binary search ─────────────────────────────────────────────────

fn bench_find_row(c: &mut Criterion) {
    let store = make_store(20, 3650);
    let key = CompoundKey::single("SYM010").unwrap();
    c.bench_function("find_row_for_date", |b| {
        b.iter(|| {
            for i in (0..3650).step_by(37) {
                black_box(
                    store
                        .find_row_for_date(&key, base_date() + Duration::days(i))
                        .unwrap(),
                );
            }
        })
    });
}

// ── 3. Materialize ───────────────────────────────────────────────────

fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");
    for &groups in &[10_usize, 100] {
        let store = make_store(groups, 730);
        let end = base_date() + Duration::days(730);
        group.bench_with_input(BenchmarkId::from_parameter(groups), &store, |b, store| {
            b.iter(|| black_box(store.materialize(base_date(), end).unwrap().row_count()))
        });
    }
    group.finish();
}

// ── 4. Chunk merge ───────────────────────────────────────────────────

fn bench_merge_chunks(c: &mut Criterion) {
    let names: Vec<String> = (0..10).map(|i| format!("SYM{i:03}")).collect();
    let start = base_date();
    let end = start + Duration::days(730);
    let state = || SymbolFetchState::new(names.iter().cloned(), &[]);

    let chunks: Vec<FetchJob> = [(start, start + Duration::days(365)), (start + Duration::days(365), end)]
        .into_iter()
        .map(|(s, e)| {
            let mut job = FetchJob::new(state(), s, e).unwrap();
            let rows: Vec<(NaiveDate, f64)> = (0..(e - s).num_days())
                .map(|i| (s + Duration::days(i), 100.0 + i as f64))
                .collect();
            for name in &names {
                job.write_rows(name, 0, &rows).unwrap();
                job.record_coverage(name, s, e);
                job.update(name, true).unwrap();
            }
            job
        })
        .collect();

    c.bench_function("merge_chunk_jobs", |b| {
        b.iter(|| {
            let mut target = FetchJob::new(state(), start, end).unwrap();
            merge_chunk_jobs(&mut target, &chunks).unwrap();
            black_box(target)
        })
    });
}

criterion_group!(
    benches,
    bench_insert,
    bench_find_row,
    bench_materialize,
    bench_merge_chunks,
);
criterion_main!(benches);

//! Quotegrid CLI: refresh and inspect the sparse price store.
//!
//! Commands:
//! - `refresh` fetch prices for the configured symbols and rewrite both stores
//! - `status` per-symbol fetch status, currency and coverage
//! - `materialize` turn a sparse price CSV into a dense daily CSV
//! - `quote` live price snapshot

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use quotegrid_core::fetch::{
    CircuitBreaker, FetchOrchestrator, ProviderBackend, ProviderConfig, YahooProvider,
};
use quotegrid_core::sheet::{read_sparse, write_dense, write_sparse, CsvSheet};
use quotegrid_core::store::ColumnStore;
use quotegrid_core::{refresh_prices, Layout, QuoteGridConfig, SparseStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "quotegrid",
    about = "Quotegrid CLI: column-group price stores fed by chunked quote fetches"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch prices for the configured symbols and rewrite the stores.
    Refresh {
        /// Path to the TOML config file.
        #[arg(long, default_value = "quotegrid.toml")]
        config: PathBuf,

        /// Start date (YYYY-MM-DD). Defaults to `lookback_days` before the end.
        #[arg(long)]
        start: Option<String>,

        /// Exclusive end date (YYYY-MM-DD). Defaults to tomorrow.
        #[arg(long)]
        end: Option<String>,
    },
    /// Report each stored symbol's status, currency and last price date.
    Status {
        /// Path to the TOML config file.
        #[arg(long, default_value = "quotegrid.toml")]
        config: PathBuf,

        /// Emit JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Forward-fill a sparse price CSV into a dense daily CSV.
    Materialize {
        /// Sparse price store CSV.
        #[arg(long)]
        store: PathBuf,

        /// Dense output CSV.
        #[arg(long)]
        output: PathBuf,

        /// First day (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// Exclusive last day (YYYY-MM-DD).
        #[arg(long)]
        end: String,
    },
    /// Print current prices.
    Quote {
        /// Symbols to quote (e.g., SPY VWRL.L).
        #[arg(required = true)]
        symbols: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Refresh { config, start, end } => run_refresh(&config, start, end),
        Commands::Status { config, json } => run_status(&config, json),
        Commands::Materialize {
            store,
            output,
            start,
            end,
        } => run_materialize(&store, &output, &start, &end),
        Commands::Quote { symbols } => run_quote(symbols),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn build_backend(config: &ProviderConfig) -> Result<ProviderBackend<YahooProvider>> {
    let breaker = Arc::new(CircuitBreaker::from_config(config));
    let provider = YahooProvider::new(config, breaker)?;
    Ok(ProviderBackend::new(provider))
}

fn run_refresh(config_path: &Path, start: Option<String>, end: Option<String>) -> Result<()> {
    let config = QuoteGridConfig::from_file(config_path)?;
    if config.refresh.symbols.is_empty() {
        bail!("no symbols configured under [refresh] in {}", config_path.display());
    }

    let end_date = match end.as_deref() {
        Some(s) => parse_date(s)?,
        None => chrono::Local::now().date_naive() + Duration::days(1),
    };
    let start_date = match start.as_deref() {
        Some(s) => parse_date(s)?,
        None => end_date - Duration::days(i64::from(config.refresh.lookback_days)),
    };
    if end_date < start_date {
        bail!("--end {end_date} is before --start {start_date}");
    }

    let mut prices_sheet = CsvSheet::open(&config.store.prices)?;
    let existing = read_sparse(&prices_sheet, Layout::prices())?;
    info!(
        path = %config.store.prices.display(),
        groups = existing.catalog().len(),
        "loaded price store"
    );

    let backend = build_backend(&config.provider)?;
    let mut orchestrator = FetchOrchestrator::new(config.fetch.clone(), backend);
    let outcome = refresh_prices(
        &mut orchestrator,
        &existing,
        &config.refresh.symbols,
        start_date,
        end_date,
    )?;

    write_sparse(&mut prices_sheet, &outcome.prices)?;
    prices_sheet.save()?;
    let mut daily_sheet = CsvSheet::open(&config.store.daily)?;
    write_dense(&mut daily_sheet, &outcome.daily, true)?;
    daily_sheet.save()?;

    let summary = &outcome.summary;
    println!("Refresh {start_date} to {end_date}");
    println!(
        "  chunks: {} ({} skipped), requests: {}, retries: {}",
        summary.chunks, summary.skipped_chunks, summary.requests, summary.retries
    );
    println!(
        "  succeeded: {}, failed: {}, not attempted: {}",
        summary.succeeded, summary.failed, summary.skipped
    );
    println!();
    println!("{:<12} {:<15}", "Symbol", "Status");
    println!("{}", "-".repeat(28));
    for (symbol, status) in &outcome.statuses {
        println!("{symbol:<12} {status:<15}");
    }
    if !outcome.partially_covered.is_empty() {
        println!();
        println!("Gaps in: {}", outcome.partially_covered.join(", "));
    }
    println!();
    println!("Prices saved to: {}", config.store.prices.display());
    println!("Daily saved to:  {}", config.store.daily.display());
    Ok(())
}

fn run_status(config_path: &Path, json: bool) -> Result<()> {
    let config = QuoteGridConfig::from_file(config_path)?;
    let sheet = CsvSheet::open(&config.store.prices)?;
    let store = read_sparse(&sheet, Layout::prices())?;

    let rows = status_rows(&store)?;
    if json {
        let entries: Vec<serde_json::Value> = rows
            .iter()
            .map(|r| {
                serde_json::json!({
                    "symbol": r.symbol,
                    "status": r.status,
                    "currency": r.currency,
                    "rows": r.rows,
                    "last_date": r.last_date.map(|d| d.to_string()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("Price store is empty: {}", config.store.prices.display());
        return Ok(());
    }
    println!("Store: {}", config.store.prices.display());
    println!();
    println!(
        "{:<12} {:<15} {:<9} {:>7} {:<12}",
        "Symbol", "Status", "Currency", "Rows", "Last date"
    );
    println!("{}", "-".repeat(59));
    for r in &rows {
        println!(
            "{:<12} {:<15} {:<9} {:>7} {:<12}",
            r.symbol,
            r.status,
            r.currency.as_deref().unwrap_or("-"),
            r.rows,
            r.last_date.map_or_else(|| "-".to_string(), |d| d.to_string())
        );
    }
    Ok(())
}

struct StatusRow {
    symbol: String,
    status: String,
    currency: Option<String>,
    rows: usize,
    last_date: Option<NaiveDate>,
}

fn status_rows(store: &SparseStore) -> Result<Vec<StatusRow>> {
    use quotegrid_core::fetch::PriceFetchStatus;
    use quotegrid_core::refresh::{CURRENCY_FIELD, STATUS_FIELD};

    let mut rows = Vec::new();
    for group in store.catalog().groups() {
        let key = group.key();
        rows.push(StatusRow {
            symbol: key.joined(),
            status: PriceFetchStatus::from_cell(group.meta(STATUS_FIELD)).to_string(),
            currency: group.meta_text(CURRENCY_FIELD),
            rows: store.filled_rows(key)?,
            last_date: store.latest(key)?.map(|(d, _)| d),
        });
    }
    Ok(rows)
}

fn run_materialize(store_path: &Path, output: &Path, start: &str, end: &str) -> Result<()> {
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    if !store_path.exists() {
        bail!("store file not found: {}", store_path.display());
    }

    let sheet = CsvSheet::open(store_path)?;
    let store = read_sparse(&sheet, Layout::prices())?;
    let dense = store.materialize(start, end)?;

    let mut out = CsvSheet::open(output)?;
    write_dense(&mut out, &dense, true)?;
    out.save()?;
    println!(
        "Materialized {} groups x {} days to {}",
        dense.catalog().len(),
        dense.row_count(),
        output.display()
    );
    Ok(())
}

fn run_quote(symbols: Vec<String>) -> Result<()> {
    let config = ProviderConfig::default();
    let backend = build_backend(&config)?;
    let mut orchestrator = FetchOrchestrator::new(Default::default(), backend);
    let prices = orchestrator.live_prices(&symbols)?;

    let mut missing = 0;
    for symbol in &symbols {
        match prices.get(symbol).copied().flatten() {
            Some(price) => println!("{symbol:<12} {price:>12.4}"),
            None => {
                missing += 1;
                println!("{symbol:<12} {:>12}", "n/a");
            }
        }
    }
    if missing == symbols.len() {
        bail!("no quotes available");
    }
    Ok(())
}

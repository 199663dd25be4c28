//! pricefetch CLI: fetch, batch, matrix and resample commands.
//!
//! Commands:
//! - `fetch`: one symbol, daily or monthly, written to .csv/.parquet/.xlsx
//! - `batch`: many symbols (arguments or named config lists), one file each
//! - `matrix`: monthly close matrix over a rolling lookback for a symbol list
//! - `resample`: aggregate an existing daily CSV/Parquet table to monthly bars

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pricefetch_core::data::{
    aggregate_frame, fetch_batch, fetch_matrix, lookback_range, read_daily_frame, TracingProgress,
};
use pricefetch_core::domain::{Frequency, Market};
use pricefetch_core::export::OutputFormat;
use pricefetch_core::{write_table, FetchRequest, FetcherConfig, Table, WriteOptions};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pricefetch", about = "Fetch KR/US daily OHLCV with provider fallback")]
struct Cli {
    /// TOML config (HTTP settings, provider toggles, symbol lists).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Prefix CSV output with a UTF-8 byte-order mark.
    #[arg(long, global = true, default_value_t = false)]
    bom: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one symbol and write it to a file.
    Fetch {
        /// KR: 6-digit code (e.g. 005930), US: ticker (e.g. AAPL).
        #[arg(long)]
        symbol: String,

        /// KR or US. Inferred from the symbol when omitted.
        #[arg(long)]
        market: Option<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: String,

        /// daily or monthly.
        #[arg(long, default_value = "daily")]
        freq: String,

        /// auto, datareader, krx or yahoo.
        #[arg(long, default_value = "auto")]
        provider: String,

        /// Request adjusted prices.
        #[arg(long, default_value_t = false)]
        adjusted: bool,

        /// Output file (.csv, .parquet or .xlsx).
        #[arg(long)]
        output: PathBuf,
    },
    /// Fetch many symbols, one output file per symbol.
    Batch {
        /// Symbols to fetch.
        symbols: Vec<String>,

        /// Named symbol lists from the config file.
        #[arg(long = "list")]
        lists: Vec<String>,

        /// KR or US. Inferred per symbol when omitted.
        #[arg(long)]
        market: Option<String>,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,

        #[arg(long, default_value = "daily")]
        freq: String,

        #[arg(long, default_value = "auto")]
        provider: String,

        #[arg(long, default_value_t = false)]
        adjusted: bool,

        /// Directory for the per-symbol files.
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,

        /// File extension: csv, parquet or xlsx.
        #[arg(long, default_value = "csv")]
        format: String,
    },
    /// Monthly close matrix for a symbol list over the last N years.
    Matrix {
        /// Symbols (columns, in order).
        symbols: Vec<String>,

        /// Named symbol lists from the config file, concatenated in order.
        #[arg(long = "list")]
        lists: Vec<String>,

        /// Lookback in whole years.
        #[arg(long, default_value_t = 2)]
        years: u32,

        /// Output file (.csv, .parquet or .xlsx).
        #[arg(long, default_value = "output/monthly_close_matrix.csv")]
        output: PathBuf,
    },
    /// Aggregate a daily table file to monthly bars.
    Resample {
        /// Daily table (.csv or .parquet) in the canonical layout.
        #[arg(long)]
        input: PathBuf,

        /// Output file (.csv, .parquet or .xlsx).
        #[arg(long)]
        output: PathBuf,
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
    let config = match &cli.config {
        Some(path) => FetcherConfig::from_file(path)?,
        None => FetcherConfig::default(),
    };
    let mut opts = config.write_options();
    opts.csv_bom |= cli.bom;

    match cli.command {
        Commands::Fetch {
            symbol,
            market,
            start,
            end,
            freq,
            provider,
            adjusted,
            output,
        } => {
            let market = market.unwrap_or_else(|| Market::infer(&symbol).to_string());
            let req = FetchRequest::new(market, symbol, start, end)
                .with_freq(freq)
                .with_provider(provider)
                .with_adjusted(adjusted);
            run_fetch(&config, &req, &output, &opts)
        }
        Commands::Batch {
            symbols,
            lists,
            market,
            start,
            end,
            freq,
            provider,
            adjusted,
            output_dir,
            format,
        } => {
            let symbols = collect_symbols(&config, symbols, &lists)?;
            // An empty market means "infer per symbol"
            let template = FetchRequest::new(market.unwrap_or_default(), "", start, end)
                .with_freq(freq)
                .with_provider(provider)
                .with_adjusted(adjusted);
            run_batch(&config, &symbols, &template, &output_dir, &format, &opts)
        }
        Commands::Matrix {
            symbols,
            lists,
            years,
            output,
        } => {
            let symbols = collect_symbols(&config, symbols, &lists)?;
            run_matrix(&config, &symbols, years, &output, &opts)
        }
        Commands::Resample { input, output } => run_resample(&input, &output, &opts),
    }
}

/// Positional symbols first, then named lists, duplicates dropped.
fn collect_symbols(config: &FetcherConfig, symbols: Vec<String>, lists: &[String]) -> Result<Vec<String>> {
    let mut all = symbols;
    all.extend(config.union_of(lists)?);
    let all = pricefetch_core::data::matrix::dedup_symbols(&all);
    if all.is_empty() {
        bail!("no symbols given (pass symbols or --list <name>)");
    }
    Ok(all)
}

fn run_fetch(config: &FetcherConfig, req: &FetchRequest, output: &Path, opts: &WriteOptions) -> Result<()> {
    OutputFormat::for_output(output)?;
    let fetcher = config.build_fetcher()?;
    let out = fetcher
        .fetch(req)
        .with_context(|| format!("fetch {} failed", req.symbol()))?;
    let table = Table::from(&out);
    write_table(&table, output, opts)?;
    println!("Saved {} rows to {}", table.height(), output.display());
    Ok(())
}

fn run_batch(
    config: &FetcherConfig,
    symbols: &[String],
    template: &FetchRequest,
    output_dir: &Path,
    format: &str,
    opts: &WriteOptions,
) -> Result<()> {
    let freq: Frequency = template.freq().parse()?;
    let file_name = |symbol: &str| output_dir.join(format!("{symbol}_{}.{format}", freq.as_str()));
    // Reject the format before any network traffic
    OutputFormat::for_output(&file_name("SYMBOL"))?;
    let fetcher = config.build_fetcher()?;

    // One batch per market; an explicit --market puts everything in one group
    let mut groups: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for symbol in symbols {
        let key = match template.market() {
            "" => Market::infer(symbol).to_string(),
            given => given.to_string(),
        };
        groups.entry(key).or_default().push(symbol.as_str());
    }

    let mut failures: Vec<(String, anyhow::Error)> = Vec::new();
    for (market, group) in groups {
        tracing::info!(market = %market, symbols = group.len(), "starting batch");
        let template = template.clone().with_market(market);
        let summary = fetch_batch(&fetcher, &group, &template, &TracingProgress);
        if !summary.all_succeeded() {
            tracing::warn!(failed = summary.failed(), total = summary.total, "batch had failures");
        }

        for (symbol, out) in &summary.fetched {
            let path = file_name(symbol);
            match write_table(&Table::from(out), &path, opts) {
                Ok(()) => println!("Saved {} rows to {}", out.len(), path.display()),
                Err(e) => failures.push((
                    symbol.clone(),
                    anyhow::Error::new(e).context(format!("write {}", path.display())),
                )),
            }
        }
        failures.extend(summary.errors.into_iter().map(|(s, e)| (s, e.into())));
    }

    if !failures.is_empty() {
        for (symbol, err) in &failures {
            eprintln!("Error for {symbol}: {err:#}");
        }
        bail!("{} of {} symbols failed", failures.len(), symbols.len());
    }
    Ok(())
}

fn run_matrix(
    config: &FetcherConfig,
    symbols: &[String],
    years: u32,
    output: &Path,
    opts: &WriteOptions,
) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let (start, end) = lookback_range(today, years)?;
    OutputFormat::for_output(output)?;
    let fetcher = config.build_fetcher()?;
    let matrix = fetch_matrix(&fetcher, symbols, start, end)?;
    let table = Table::from(&matrix);
    write_table(&table, output, opts)?;
    println!("Saved {} rows to {}", table.height(), output.display());
    Ok(())
}

fn run_resample(input: &Path, output: &Path, opts: &WriteOptions) -> Result<()> {
    OutputFormat::for_output(output)?;
    let df = read_daily_frame(input).with_context(|| format!("read {}", input.display()))?;
    let monthly = aggregate_frame(&df)?;
    let table = Table::monthly(&monthly);
    write_table(&table, output, opts)?;
    println!("Saved {} rows to {}", table.height(), output.display());
    Ok(())
}

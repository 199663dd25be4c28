//! Batch fetch: runs one request template over many symbols with progress reporting.

use super::fetch::{FetchError, FetchOutput, Fetcher};
use crate::domain::FetchRequest;

/// Progress callbacks for a batch. Implementations must be cheap; they run inline.
pub trait FetchProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize);
    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: &Result<FetchOutput, FetchError>,
    );
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Reports progress through `tracing`.
pub struct TracingProgress;

impl FetchProgress for TracingProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        tracing::info!(symbol, "[{}/{}] fetching", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: &Result<FetchOutput, FetchError>,
    ) {
        match result {
            Ok(out) => tracing::info!(symbol, rows = out.len(), "[{}/{}] done", index + 1, total),
            Err(e) => tracing::warn!(symbol, error = %e, "[{}/{}] failed", index + 1, total),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!(succeeded, failed, total, "batch complete");
    }
}

/// Fetch every symbol with `template`'s market, range, frequency and provider.
///
/// Per-symbol failures are collected, never fatal; the batch always runs to
/// the end.
pub fn fetch_batch<S: AsRef<str>>(
    fetcher: &Fetcher,
    symbols: &[S],
    template: &FetchRequest,
    progress: &dyn FetchProgress,
) -> BatchSummary {
    let total = symbols.len();
    let mut fetched = Vec::new();
    let mut errors = Vec::new();

    for (i, symbol) in symbols.iter().enumerate() {
        let symbol = symbol.as_ref();
        progress.on_start(symbol, i, total);

        let result = fetcher.fetch(&template.for_symbol(symbol));
        progress.on_complete(symbol, i, total, &result);

        match result {
            Ok(out) => fetched.push((symbol.to_string(), out)),
            Err(e) => errors.push((symbol.to_string(), e)),
        }
    }

    progress.on_batch_complete(fetched.len(), errors.len(), total);

    BatchSummary {
        total,
        fetched,
        errors,
    }
}

/// Summary of a batch fetch.
#[derive(Debug)]
pub struct BatchSummary {
    pub total: usize,
    pub fetched: Vec<(String, FetchOutput)>,
    pub errors: Vec<(String, FetchError)>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.fetched.len()
    }

    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

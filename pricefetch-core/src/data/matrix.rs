//! Monthly close matrix: one row per month, one column per symbol.
//!
//! Each cell is the month's adjusted close where the provider supplied one,
//! falling back to the plain close. Used for allocation-model inputs where
//! a fixed list of tickers is tracked over a rolling lookback window.

use super::fetch::{FetchError, FetchOutput, Fetcher};
use crate::domain::{FetchRequest, Market, MonthlyRecord, ProviderId, ValidationError, DATE_FORMAT};
use chrono::{Months, NaiveDate};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Symbols in first-seen order with duplicates removed.
pub fn dedup_symbols<S: AsRef<str>>(symbols: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    symbols
        .iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

/// `[start, end)` covering the last `years` years up to and including `today`.
///
/// `end` is tomorrow; `start` is the same calendar day `years` earlier,
/// with Feb 29 clamped to Feb 28 in non-leap years.
pub fn lookback_range(today: NaiveDate, years: u32) -> Result<(NaiveDate, NaiveDate), ValidationError> {
    if years == 0 {
        return Err(ValidationError::ZeroLookback);
    }
    let end = today.succ_opt().unwrap_or(today);
    let start = end
        .checked_sub_months(Months::new(years * 12))
        .ok_or_else(|| ValidationError::InvalidDate {
            field: "start",
            value: format!("{} minus {years} years", end.format(DATE_FORMAT)),
        })?;
    Ok((start, end))
}

/// Month-by-symbol close prices.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseMatrix {
    symbols: Vec<String>,
    periods: Vec<NaiveDate>,
    rows: Vec<Vec<Option<f64>>>,
}

impl CloseMatrix {
    /// Assemble from per-symbol monthly bars.
    ///
    /// Rows span the union of all periods, ascending. A symbol with no bar
    /// for a month has an empty cell there. Symbols absent from `series`
    /// still get a (fully empty) column.
    pub fn build<S: AsRef<str>>(symbols: &[S], series: &HashMap<String, Vec<MonthlyRecord>>) -> Self {
        let symbols = dedup_symbols(symbols);

        let periods: Vec<NaiveDate> = symbols
            .iter()
            .filter_map(|s| series.get(s))
            .flatten()
            .map(|m| m.period)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let lookup: Vec<HashMap<NaiveDate, f64>> = symbols
            .iter()
            .map(|s| {
                series
                    .get(s)
                    .into_iter()
                    .flatten()
                    .map(|m| (m.period, m.adj_close.filter(|v| !v.is_nan()).unwrap_or(m.close)))
                    .filter(|(_, v)| !v.is_nan())
                    .collect()
            })
            .collect();

        let rows = periods
            .iter()
            .map(|p| lookup.iter().map(|cells| cells.get(p).copied()).collect())
            .collect();

        Self {
            symbols,
            periods,
            rows,
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }

    /// Cell lookup by period and symbol.
    pub fn get(&self, period: NaiveDate, symbol: &str) -> Option<f64> {
        let row = self.periods.binary_search(&period).ok()?;
        let col = self.symbols.iter().position(|s| s == symbol)?;
        self.rows[row][col]
    }
}

/// Fetch monthly bars for every symbol and assemble the matrix.
///
/// The market of each symbol is inferred from its shape. Yahoo is pinned
/// when registered, since it is the provider that carries adjusted closes;
/// otherwise the usual fallback chain runs. Any symbol that cannot be
/// fetched fails the whole matrix.
pub fn fetch_matrix<S: AsRef<str>>(
    fetcher: &Fetcher,
    symbols: &[S],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<CloseMatrix, FetchError> {
    let symbols = dedup_symbols(symbols);
    let start = start.format(DATE_FORMAT).to_string();
    let end = end.format(DATE_FORMAT).to_string();

    // Cells hold adjusted closes, and only yahoo always carries them
    let provider = if fetcher.available().contains(&ProviderId::Yahoo) {
        ProviderId::Yahoo.as_str()
    } else {
        "auto"
    };

    let mut series = HashMap::with_capacity(symbols.len());
    for symbol in &symbols {
        let market = Market::infer(symbol);
        let req = FetchRequest::new(market.as_str(), symbol.as_str(), start.as_str(), end.as_str())
            .with_freq("monthly")
            .with_provider(provider);
        let monthly = match fetcher.fetch(&req)? {
            FetchOutput::Monthly(rows) => rows,
            FetchOutput::Daily(rows) => super::monthly::aggregate_monthly(&rows),
        };
        tracing::info!(symbol = %symbol, months = monthly.len(), "matrix column fetched");
        series.insert(symbol.clone(), monthly);
    }
    Ok(CloseMatrix::build(&symbols, &series))
}

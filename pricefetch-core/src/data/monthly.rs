//! Daily → calendar-month resampling.
//!
//! Rows are partitioned by (market, symbol), sorted by date, and bucketed
//! by the first day of their month. Missing prices (NaN) are skipped the
//! way a resampler skips nulls: `open` is the first present open, `close`
//! the last present close. A bucket with no usable open/high/low/close is
//! dropped, never imputed.

use crate::domain::{CanonicalRecord, Market, MonthlyRecord};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

/// First calendar day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Aggregate canonical daily records into monthly bars.
///
/// Output is grouped by (market, symbol) and ascending by period within a
/// group. Callers must not rely on the order of groups.
pub fn aggregate_monthly(daily: &[CanonicalRecord]) -> Vec<MonthlyRecord> {
    let mut partitions: BTreeMap<(Market, &str), Vec<&CanonicalRecord>> = BTreeMap::new();
    for rec in daily {
        partitions
            .entry((rec.market, rec.symbol.as_str()))
            .or_default()
            .push(rec);
    }

    let mut out = Vec::new();
    for (_, mut rows) in partitions {
        // Stable: equal dates keep input order
        rows.sort_by_key(|r| r.date);

        let mut start = 0;
        while start < rows.len() {
            let period = month_start(rows[start].date);
            let len = rows[start..]
                .iter()
                .take_while(|r| month_start(r.date) == period)
                .count();
            if let Some(bar) = aggregate_bucket(period, &rows[start..start + len]) {
                out.push(bar);
            }
            start += len;
        }
    }
    out
}

fn aggregate_bucket(period: NaiveDate, rows: &[&CanonicalRecord]) -> Option<MonthlyRecord> {
    let last = rows.last()?;

    let open = rows.iter().map(|r| r.open).find(|v| !v.is_nan())?;
    let close = rows.iter().rev().map(|r| r.close).find(|v| !v.is_nan())?;
    let high = rows
        .iter()
        .map(|r| r.high)
        .filter(|v| !v.is_nan())
        .reduce(f64::max)?;
    let low = rows
        .iter()
        .map(|r| r.low)
        .filter(|v| !v.is_nan())
        .reduce(f64::min)?;
    // Clamp rather than wrap if a month's total exceeds u64
    let volume = rows.iter().fold(0u64, |acc, r| acc.saturating_add(r.volume));

    // Last present adjusted close, only when the daily table carries one
    let adj_close = if rows.iter().any(|r| r.adj_close.is_some()) {
        Some(
            rows.iter()
                .rev()
                .filter_map(|r| r.adj_close)
                .find(|v| !v.is_nan())
                .unwrap_or(f64::NAN),
        )
    } else {
        None
    };

    Some(MonthlyRecord {
        period,
        open,
        high,
        low,
        close,
        volume,
        adj_close,
        market: last.market,
        symbol: last.symbol.clone(),
        source: last.source,
        adjusted: last.adjusted,
    })
}

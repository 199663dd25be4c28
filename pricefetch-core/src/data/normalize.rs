//! Schema normalization: provider-native [`RawTable`] → canonical daily records.
//!
//! All provider quirks (localized headers, date as index vs column,
//! timezone-aware timestamps, comma-grouped numbers) are resolved here
//! behind one alias table, so adapters never touch canonical naming.

use super::raw::{RawColumn, RawTable, RawValue};
use crate::domain::{CanonicalRecord, RecordStamp};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;

/// Columns every canonical table must carry after renaming.
pub const REQUIRED_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Date-carrying column names, checked in this order.
const DATE_COLUMNS: [&str; 2] = ["Date", "날짜"];

/// Provider column name → canonical name. Canonical names map to themselves
/// so renaming an already-normalized table is a no-op.
const ALIASES: [(&str, &str); 17] = [
    ("Open", "open"),
    ("High", "high"),
    ("Low", "low"),
    ("Close", "close"),
    ("Adj Close", "adj_close"),
    ("Volume", "volume"),
    ("시가", "open"),
    ("고가", "high"),
    ("저가", "low"),
    ("종가", "close"),
    ("거래량", "volume"),
    ("open", "open"),
    ("high", "high"),
    ("low", "low"),
    ("close", "close"),
    ("adj_close", "adj_close"),
    ("volume", "volume"),
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizationError {
    #[error("missing required OHLCV columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("no date column or date index")]
    NoDateKey,

    #[error("row {row}: {reason}")]
    InvalidDate { row: usize, reason: String },

    #[error("duplicate date {0}")]
    DuplicateDate(NaiveDate),

    #[error("column '{column}' row {row}: {reason}")]
    InvalidValue {
        column: String,
        row: usize,
        reason: String,
    },

    #[error("column '{column}' has {actual} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// Canonical name for a provider column, if it is one we keep.
pub fn canonical_name(name: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
}

/// Rename columns through the alias table, dropping unknown ones.
///
/// Idempotent: applying it to its own output returns the same columns.
pub fn rename_columns(columns: Vec<RawColumn>) -> Vec<RawColumn> {
    columns
        .into_iter()
        .filter_map(|c| {
            canonical_name(&c.name).map(|canonical| RawColumn {
                name: canonical.to_string(),
                values: c.values,
            })
        })
        .collect()
}

/// Normalize a provider table into canonical daily records sorted by date.
pub fn normalize(
    raw: RawTable,
    stamp: &RecordStamp,
) -> Result<Vec<CanonicalRecord>, NormalizationError> {
    let RawTable { index, mut columns } = raw;

    // 1. Promote a date column to the row key, else use the index.
    let keys = match columns
        .iter()
        .position(|c| DATE_COLUMNS.contains(&c.name.as_str()))
    {
        Some(pos) => columns.remove(pos).values,
        None => index.ok_or(NormalizationError::NoDateKey)?,
    };

    // 2. Naive calendar dates, sorted, unique.
    let dates = keys
        .iter()
        .enumerate()
        .map(|(row, v)| {
            v.as_date()
                .map_err(|reason| NormalizationError::InvalidDate { row, reason })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut order: Vec<usize> = (0..dates.len()).collect();
    order.sort_by_key(|&i| dates[i]);
    if let Some(w) = order.windows(2).find(|w| dates[w[0]] == dates[w[1]]) {
        return Err(NormalizationError::DuplicateDate(dates[w[0]]));
    }

    // 3. Canonical column names.
    let mut by_name: BTreeMap<String, Vec<RawValue>> = BTreeMap::new();
    for c in rename_columns(columns) {
        if c.values.len() != dates.len() {
            return Err(NormalizationError::RaggedColumn {
                column: c.name,
                expected: dates.len(),
                actual: c.values.len(),
            });
        }
        by_name.entry(c.name).or_insert(c.values);
    }

    // 4. Required columns.
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| !by_name.contains_key(**name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(NormalizationError::MissingColumns(missing));
    }

    let open = price_column(&by_name, "open")?;
    let high = price_column(&by_name, "high")?;
    let low = price_column(&by_name, "low")?;
    let close = price_column(&by_name, "close")?;
    let volume = volume_column(&by_name)?;
    // 5. Only when the source has it.
    let adj_close = if by_name.contains_key("adj_close") {
        Some(price_column(&by_name, "adj_close")?)
    } else {
        None
    };

    // 6. Stamp provenance on every row.
    Ok(order
        .into_iter()
        .map(|i| CanonicalRecord {
            date: dates[i],
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            volume: volume[i],
            adj_close: adj_close.as_ref().map(|a| a[i]),
            market: stamp.market,
            symbol: stamp.symbol.clone(),
            source: stamp.source,
            adjusted: stamp.adjusted,
        })
        .collect())
}

fn price_column(
    columns: &BTreeMap<String, Vec<RawValue>>,
    name: &str,
) -> Result<Vec<f64>, NormalizationError> {
    columns[name]
        .iter()
        .enumerate()
        .map(|(row, v)| {
            v.as_f64()
                .map(|p| p.unwrap_or(f64::NAN))
                .map_err(|reason| NormalizationError::InvalidValue {
                    column: name.to_string(),
                    row,
                    reason,
                })
        })
        .collect()
}

/// Volumes at or above 2^64 have no `u64` representation.
pub(crate) fn volume_in_range(x: f64) -> bool {
    x.is_finite() && x >= 0.0 && x < u64::MAX as f64
}

fn volume_column(columns: &BTreeMap<String, Vec<RawValue>>) -> Result<Vec<u64>, NormalizationError> {
    let invalid = |row: usize, reason: String| NormalizationError::InvalidValue {
        column: "volume".into(),
        row,
        reason,
    };
    columns["volume"]
        .iter()
        .enumerate()
        .map(|(row, v)| match v.as_f64().map_err(|r| invalid(row, r))? {
            None => Ok(0),
            Some(x) if volume_in_range(x) => Ok(x.round() as u64),
            Some(x) => Err(invalid(row, format!("volume {x} is not a non-negative 64-bit count"))),
        })
        .collect()
}

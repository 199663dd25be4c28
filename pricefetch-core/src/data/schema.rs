//! Daily table schema for externally supplied frames.
//!
//! Fetch results are typed records and cannot lack a column, but a daily
//! table read back from CSV or Parquet can. [`DailySchema::validate`] is the
//! gate in front of the monthly aggregator for such tables.

use super::monthly::aggregate_monthly;
use super::normalize::volume_in_range;
use crate::domain::{CanonicalRecord, Market, MonthlyRecord, ProviderId};
use chrono::NaiveDate;
use polars::prelude::*;
use std::path::Path;

/// Columns a daily table must carry to be aggregated.
pub const DAILY_COLUMNS: [&str; 10] = [
    "date", "open", "high", "low", "close", "volume", "market", "symbol", "source", "adjusted",
];

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing columns for monthly aggregation: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("column '{column}' row {row}: {reason}")]
    InvalidValue {
        column: String,
        row: usize,
        reason: String,
    },

    #[error("unsupported input extension '{0}' (expected .csv or .parquet)")]
    UnsupportedInput(String),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Canonical daily table schema.
pub struct DailySchema;

impl DailySchema {
    /// Fail with the sorted list of missing required columns, if any.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let mut missing: Vec<String> = DAILY_COLUMNS
            .iter()
            .filter(|name| df.column(name).is_err())
            .map(|name| name.to_string())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(SchemaError::MissingColumns(missing))
    }
}

/// Read a daily table from `.csv` or `.parquet`.
pub fn read_daily_frame(path: &Path) -> Result<DataFrame, SchemaError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => Ok(LazyCsvReader::new(path)
            .with_has_header(true)
            .with_try_parse_dates(true)
            .finish()?
            .collect()?),
        #[cfg(feature = "parquet")]
        "parquet" => Ok(LazyFrame::scan_parquet(path, Default::default())?.collect()?),
        _ => Err(SchemaError::UnsupportedInput(ext)),
    }
}

/// Validate a daily frame and aggregate it to monthly bars.
pub fn aggregate_frame(df: &DataFrame) -> Result<Vec<MonthlyRecord>, SchemaError> {
    let daily = records_from_frame(df)?;
    Ok(aggregate_monthly(&daily))
}

/// Convert a daily frame into canonical records.
pub fn records_from_frame(df: &DataFrame) -> Result<Vec<CanonicalRecord>, SchemaError> {
    DailySchema::validate(df)?;

    let dates = date_values(df.column("date")?)?;
    let open = f64_values(df, "open")?;
    let high = f64_values(df, "high")?;
    let low = f64_values(df, "low")?;
    let close = f64_values(df, "close")?;
    let volume = f64_values(df, "volume")?;
    let adj_close = match df.column("adj_close") {
        Ok(_) => Some(f64_values(df, "adj_close")?),
        Err(_) => None,
    };
    let market = text_values(df, "market")?;
    let symbol = text_values(df, "symbol")?;
    let source = text_values(df, "source")?;
    let adjusted = bool_values(df.column("adjusted")?)?;

    let invalid = |column: &str, row: usize, reason: String| SchemaError::InvalidValue {
        column: column.to_string(),
        row,
        reason,
    };

    (0..df.height())
        .map(|i| {
            let market: Market = market[i]
                .parse()
                .map_err(|e: crate::domain::ValidationError| invalid("market", i, e.to_string()))?;
            let source: ProviderId = source[i]
                .parse()
                .map_err(|e: crate::domain::ValidationError| invalid("source", i, e.to_string()))?;
            let vol = volume[i];
            if !volume_in_range(vol) {
                return Err(invalid("volume", i, format!("{vol} is not a valid volume")));
            }
            Ok(CanonicalRecord {
                date: dates[i],
                open: open[i],
                high: high[i],
                low: low[i],
                close: close[i],
                volume: vol.round() as u64,
                adj_close: adj_close.as_ref().map(|a| a[i]),
                market,
                symbol: symbol[i].clone(),
                source,
                adjusted: adjusted[i],
            })
        })
        .collect()
}

fn date_values(col: &Column) -> Result<Vec<NaiveDate>, SchemaError> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let invalid = |row: usize, reason: String| SchemaError::InvalidValue {
        column: "date".into(),
        row,
        reason,
    };

    if let DataType::String = col.dtype() {
        return col
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                let s = v.ok_or_else(|| invalid(row, "empty date".into()))?;
                let head = s.split([' ', 'T']).next().unwrap_or(s);
                NaiveDate::parse_from_str(head, "%Y-%m-%d")
                    .map_err(|_| invalid(row, format!("'{s}' is not a date")))
            })
            .collect();
    }

    let days = col.cast(&DataType::Date)?.cast(&DataType::Int32)?;
    days.i32()?
        .into_iter()
        .enumerate()
        .map(|(row, days)| {
            days.map(|d| epoch + chrono::Duration::days(d as i64))
                .ok_or_else(|| invalid(row, "empty date".into()))
        })
        .collect()
}

fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>, SchemaError> {
    let col = df.column(name)?.cast(&DataType::Float64)?;
    Ok(col
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

fn text_values(df: &DataFrame, name: &str) -> Result<Vec<String>, SchemaError> {
    let col = df.column(name)?.cast(&DataType::String)?;
    col.str()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(str::to_string).ok_or_else(|| SchemaError::InvalidValue {
                column: name.to_string(),
                row,
                reason: "empty value".into(),
            })
        })
        .collect()
}

fn bool_values(col: &Column) -> Result<Vec<bool>, SchemaError> {
    let invalid = |row: usize, reason: String| SchemaError::InvalidValue {
        column: "adjusted".into(),
        row,
        reason,
    };
    if let DataType::Boolean = col.dtype() {
        return col
            .bool()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| v.ok_or_else(|| invalid(row, "empty value".into())))
            .collect();
    }
    let text = col.cast(&DataType::String)?;
    text.str()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("true") | Some("1") => Ok(true),
            Some("false") | Some("0") => Ok(false),
            other => Err(invalid(row, format!("{other:?} is not a boolean"))),
        })
        .collect()
}

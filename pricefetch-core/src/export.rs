//! Table writer: CSV, Parquet and XLSX selected by file extension.
//!
//! Everything the crate writes goes through a columnar [`Table`]: fetch
//! results, monthly bars and the close matrix. The extension is checked
//! before anything touches the filesystem, so an unsupported path leaves no
//! directory or file behind.

use crate::data::fetch::FetchOutput;
use crate::data::matrix::CloseMatrix;
use crate::domain::{CanonicalRecord, MonthlyRecord};
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported output extension '{0}' (expected .csv, .parquet or .xlsx)")]
    UnsupportedFormat(String),

    #[error("{format} output requires building with the '{feature}' feature")]
    CodecUnavailable {
        format: &'static str,
        feature: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] PolarsError),

    #[cfg(feature = "xlsx")]
    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

/// Output codec, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Parquet,
    Xlsx,
}

impl OutputFormat {
    /// Case-insensitive extension lookup.
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "parquet" => Ok(OutputFormat::Parquet),
            "xlsx" => Ok(OutputFormat::Xlsx),
            _ => Err(ExportError::UnsupportedFormat(ext)),
        }
    }

    /// Extension lookup plus codec availability; run before any I/O.
    pub fn for_output(path: &Path) -> Result<Self, ExportError> {
        Self::from_path(path)?.ensure_available()
    }

    /// Fail if this build cannot write the format.
    pub fn ensure_available(self) -> Result<Self, ExportError> {
        match self {
            OutputFormat::Csv => Ok(self),
            OutputFormat::Parquet if cfg!(feature = "parquet") => Ok(self),
            OutputFormat::Parquet => Err(ExportError::CodecUnavailable {
                format: "parquet",
                feature: "parquet",
            }),
            OutputFormat::Xlsx if cfg!(feature = "xlsx") => Ok(self),
            OutputFormat::Xlsx => Err(ExportError::CodecUnavailable {
                format: "xlsx",
                feature: "xlsx",
            }),
        }
    }
}

/// Values of one output column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Date(Vec<Option<NaiveDate>>),
    /// NaN is written as an empty cell.
    Float(Vec<f64>),
    UInt(Vec<u64>),
    Text(Vec<String>),
    Bool(Vec<bool>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            ColumnData::Date(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::UInt(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
        }
    }

    /// Text rendering of one cell for CSV.
    fn render(&self, row: usize) -> String {
        match self {
            ColumnData::Date(v) => v[row]
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            ColumnData::Float(v) if v[row].is_nan() => String::new(),
            ColumnData::Float(v) => v[row].to_string(),
            ColumnData::UInt(v) => v[row].to_string(),
            ColumnData::Text(v) => v[row].clone(),
            ColumnData::Bool(v) => v[row].to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub name: String,
    pub data: ColumnData,
}

/// A rectangular, columnar table ready to be written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<TableColumn>,
}

impl Table {
    pub fn push(mut self, name: impl Into<String>, data: ColumnData) -> Self {
        self.columns.push(TableColumn {
            name: name.into(),
            data,
        });
        self
    }

    pub fn height(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Canonical daily layout; `adj_close` only when some row carries it.
    pub fn daily(rows: &[CanonicalRecord]) -> Self {
        Self::ohlcv(rows.len(), move |i| {
            let r = &rows[i];
            Bar {
                date: r.date,
                ohlc: [r.open, r.high, r.low, r.close],
                volume: r.volume,
                adj_close: r.adj_close,
                market: r.market.as_str(),
                symbol: &r.symbol,
                source: r.source.as_str(),
                adjusted: r.adjusted,
            }
        })
    }

    /// Monthly layout; the period is written as `date`.
    pub fn monthly(rows: &[MonthlyRecord]) -> Self {
        Self::ohlcv(rows.len(), move |i| {
            let r = &rows[i];
            Bar {
                date: r.period,
                ohlc: [r.open, r.high, r.low, r.close],
                volume: r.volume,
                adj_close: r.adj_close,
                market: r.market.as_str(),
                symbol: &r.symbol,
                source: r.source.as_str(),
                adjusted: r.adjusted,
            }
        })
    }

    fn ohlcv<'a>(n: usize, bar: impl Fn(usize) -> Bar<'a>) -> Self {
        let bars: Vec<Bar<'a>> = (0..n).map(bar).collect();
        let price = |k: usize| ColumnData::Float(bars.iter().map(|b| b.ohlc[k]).collect());

        let mut t = Table::default()
            .push("date", ColumnData::Date(bars.iter().map(|b| Some(b.date)).collect()))
            .push("open", price(0))
            .push("high", price(1))
            .push("low", price(2))
            .push("close", price(3))
            .push("volume", ColumnData::UInt(bars.iter().map(|b| b.volume).collect()));
        if bars.iter().any(|b| b.adj_close.is_some()) {
            t = t.push(
                "adj_close",
                ColumnData::Float(bars.iter().map(|b| b.adj_close.unwrap_or(f64::NAN)).collect()),
            );
        }
        let text = |f: fn(&Bar<'a>) -> &'a str| {
            ColumnData::Text(bars.iter().map(|b| f(b).to_string()).collect())
        };
        t.push("market", text(|b| b.market))
            .push("symbol", text(|b| b.symbol))
            .push("source", text(|b| b.source))
            .push("adjusted", ColumnData::Bool(bars.iter().map(|b| b.adjusted).collect()))
    }
}

/// One row of either record kind, borrowed for layout.
struct Bar<'a> {
    date: NaiveDate,
    ohlc: [f64; 4],
    volume: u64,
    adj_close: Option<f64>,
    market: &'static str,
    symbol: &'a str,
    source: &'static str,
    adjusted: bool,
}

impl From<&FetchOutput> for Table {
    fn from(out: &FetchOutput) -> Self {
        match out {
            FetchOutput::Daily(rows) => Table::daily(rows),
            FetchOutput::Monthly(rows) => Table::monthly(rows),
        }
    }
}

impl From<&CloseMatrix> for Table {
    fn from(m: &CloseMatrix) -> Self {
        let dates = m.periods().iter().map(|d| Some(*d)).collect();
        m.symbols().iter().enumerate().fold(
            Table::default().push("date", ColumnData::Date(dates)),
            |t, (i, symbol)| {
                let cells = m.rows().iter().map(|row| row[i].unwrap_or(f64::NAN)).collect();
                t.push(symbol.clone(), ColumnData::Float(cells))
            },
        )
    }
}

/// Writer options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// Prefix CSV output with a UTF-8 byte-order mark (spreadsheet apps need it for Korean text).
    pub csv_bom: bool,
}

/// Write `table` to `path`, picking the codec from the extension.
pub fn write_table(table: &Table, path: &Path, opts: &WriteOptions) -> Result<(), ExportError> {
    let format = OutputFormat::for_output(path)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    match format {
        OutputFormat::Csv => write_csv(table, path, opts.csv_bom),
        OutputFormat::Parquet => write_parquet(table, path),
        OutputFormat::Xlsx => write_xlsx(table, path),
    }?;

    tracing::info!(path = %path.display(), rows = table.height(), ?format, "table written");
    Ok(())
}

fn write_csv(table: &Table, path: &Path, bom: bool) -> Result<(), ExportError> {
    let mut file = fs::File::create(path)?;
    if bom {
        file.write_all("\u{feff}".as_bytes())?;
    }
    let mut wtr = csv::Writer::from_writer(file);
    wtr.write_record(table.column_names())?;
    for row in 0..table.height() {
        wtr.write_record(table.columns.iter().map(|c| c.data.render(row)))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Convert to a polars frame. Dates become a `Date` column.
#[cfg_attr(not(feature = "parquet"), allow(dead_code))]
fn to_dataframe(table: &Table) -> Result<DataFrame, PolarsError> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let columns = table
        .columns
        .iter()
        .map(|c| {
            let name: PlSmallStr = c.name.as_str().into();
            Ok(match &c.data {
                ColumnData::Date(v) => {
                    let days: Vec<Option<i32>> = v
                        .iter()
                        .map(|d| d.map(|d| (d - epoch).num_days() as i32))
                        .collect();
                    Column::new(name, days).cast(&DataType::Date)?
                }
                ColumnData::Float(v) => {
                    let cells: Vec<Option<f64>> =
                        v.iter().map(|x| (!x.is_nan()).then_some(*x)).collect();
                    Column::new(name, cells)
                }
                ColumnData::UInt(v) => Column::new(name, v.clone()),
                ColumnData::Text(v) => Column::new(name, v.clone()),
                ColumnData::Bool(v) => Column::new(name, v.clone()),
            })
        })
        .collect::<Result<Vec<_>, PolarsError>>()?;
    DataFrame::new(columns)
}

#[cfg(feature = "parquet")]
fn write_parquet(table: &Table, path: &Path) -> Result<(), ExportError> {
    let mut df = to_dataframe(table)?;
    let file = fs::File::create(path)?;
    ParquetWriter::new(file).finish(&mut df)?;
    Ok(())
}

#[cfg(not(feature = "parquet"))]
fn write_parquet(_table: &Table, _path: &Path) -> Result<(), ExportError> {
    Err(ExportError::CodecUnavailable {
        format: "parquet",
        feature: "parquet",
    })
}

#[cfg(feature = "xlsx")]
fn write_xlsx(table: &Table, path: &Path) -> Result<(), ExportError> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, column) in table.columns.iter().enumerate() {
        let col = col as u16;
        sheet.write_string(0, col, &column.name)?;
        for row in 0..table.height() {
            let r = row as u32 + 1;
            match &column.data {
                ColumnData::Float(v) if v[row].is_nan() => {}
                ColumnData::Float(v) => {
                    sheet.write_number(r, col, v[row])?;
                }
                ColumnData::UInt(v) => {
                    sheet.write_number(r, col, v[row] as f64)?;
                }
                ColumnData::Bool(v) => {
                    sheet.write_boolean(r, col, v[row])?;
                }
                data => {
                    sheet.write_string(r, col, data.render(row))?;
                }
            }
        }
    }
    workbook.save(path)?;
    Ok(())
}

#[cfg(not(feature = "xlsx"))]
fn write_xlsx(_table: &Table, _path: &Path) -> Result<(), ExportError> {
    Err(ExportError::CodecUnavailable {
        format: "xlsx",
        feature: "xlsx",
    })
}

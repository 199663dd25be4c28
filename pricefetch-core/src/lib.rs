//! pricefetch core: daily OHLCV retrieval for KR and US equities.
//!
//! - Request validation and domain types
//! - Provider adapters with an ordered fallback chain
//! - Schema normalization to one canonical daily record
//! - Calendar-month aggregation
//! - Table export (CSV, Parquet, XLSX)

pub mod config;
pub mod data;
pub mod domain;
pub mod export;

pub use config::{ConfigError, FetcherConfig};
pub use data::{FetchError, FetchOutput, Fetcher};
pub use domain::{FetchRequest, Market, ValidationError};
pub use export::{write_table, ExportError, Table, WriteOptions};

//! Canonical daily and monthly OHLCV records.

use super::market::{Market, ProviderId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV row in the canonical schema.
///
/// A missing price cell is stored as NaN, matching how providers report
/// holidays and halted sessions. `adj_close` is `None` when the source does
/// not publish an adjusted close at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: Option<f64>,
    pub market: Market,
    pub symbol: String,
    pub source: ProviderId,
    pub adjusted: bool,
}

/// One calendar-month bar for a (market, symbol) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    /// First calendar day of the month.
    pub period: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: Option<f64>,
    pub market: Market,
    pub symbol: String,
    pub source: ProviderId,
    pub adjusted: bool,
}

/// Stamp applied to every normalized row: where it came from and what was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStamp {
    pub market: Market,
    pub symbol: String,
    pub source: ProviderId,
    pub adjusted: bool,
}


//! Fetch requests and their validation.
//!
//! A [`FetchRequest`] carries the caller's fields exactly as supplied (CLI
//! strings, config values). [`FetchRequest::validate`] is the only way to
//! obtain a [`ValidRequest`], and adapters only ever see a `ValidRequest`,
//! so a malformed request cannot reach the network.

use super::market::{Frequency, Market, ProviderChoice};
use chrono::NaiveDate;
use thiserror::Error;

/// Date format accepted for request bounds.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported market: {0}")]
    UnsupportedMarket(String),

    #[error("unsupported frequency: {0}")]
    UnsupportedFrequency(String),

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("invalid {field} date '{value}' (expected YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },

    #[error("start {start} must be <= end {end}")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },

    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("lookback years must be > 0")]
    ZeroLookback,
}

/// One fetch call as supplied by the caller. Constructed once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    market: String,
    symbol: String,
    start: String,
    end: String,
    freq: String,
    provider: String,
    adjusted: bool,
}

impl FetchRequest {
    /// Daily, provider `auto`, adjusted prices.
    pub fn new(
        market: impl Into<String>,
        symbol: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            market: market.into(),
            symbol: symbol.into(),
            start: start.into(),
            end: end.into(),
            freq: Frequency::Daily.as_str().to_string(),
            provider: ProviderChoice::Auto.to_string(),
            adjusted: true,
        }
    }

    pub fn with_freq(self, freq: impl Into<String>) -> Self {
        Self {
            freq: freq.into(),
            ..self
        }
    }

    pub fn with_provider(self, provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..self
        }
    }

    pub fn with_adjusted(self, adjusted: bool) -> Self {
        Self { adjusted, ..self }
    }

    pub fn with_market(self, market: impl Into<String>) -> Self {
        Self {
            market: market.into(),
            ..self
        }
    }

    /// Same request for a different symbol (used by batch fetches).
    pub fn for_symbol(&self, symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..self.clone()
        }
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }

    pub fn freq(&self) -> &str {
        &self.freq
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn adjusted(&self) -> bool {
        self.adjusted
    }

    /// Check every field. Pure: performs no I/O.
    pub fn validate(&self) -> Result<ValidRequest, ValidationError> {
        let market: Market = self.market.parse()?;
        let freq: Frequency = self.freq.parse()?;
        let provider: ProviderChoice = self.provider.parse()?;

        let symbol = self.symbol.trim();
        if symbol.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let start = parse_date("start", &self.start)?;
        let end = parse_date("end", &self.end)?;
        if start > end {
            return Err(ValidationError::StartAfterEnd { start, end });
        }

        Ok(ValidRequest {
            market,
            symbol: symbol.to_string(),
            start,
            end,
            freq,
            provider,
            adjusted: self.adjusted,
        })
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        ValidationError::InvalidDate {
            field,
            value: value.to_string(),
        }
    })
}

/// A request whose fields have all been checked. `start <= end` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRequest {
    pub market: Market,
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub freq: Frequency,
    pub provider: ProviderChoice,
    pub adjusted: bool,
}

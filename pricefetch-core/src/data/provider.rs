//! Provider adapter trait and structured error types.
//!
//! Each upstream source sits behind two layers: a client trait (the
//! network-facing library, swappable for a fake in tests) and a
//! [`ProviderAdapter`] that turns client calls into [`RawTable`]s and maps
//! every failure to a [`ProviderError`] tagged with the provider id.

use super::raw::RawTable;
use crate::domain::{Market, ProviderId};
use chrono::NaiveDate;
use thiserror::Error;

/// Failure inside a provider client library.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} for {symbol}")]
    Http { status: u16, symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::ResponseFormatChanged(e.to_string())
        } else {
            ClientError::NetworkUnreachable(e.to_string())
        }
    }
}

/// Why a single provider could not produce data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderFailure {
    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("no data returned")]
    Empty,

    #[error("not supported for market {0}")]
    UnsupportedMarket(Market),

    #[error("provider is not available in this build or configuration")]
    Unavailable,
}

/// A provider call failed. Recoverable by fallback unless the request pinned it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{provider}: {reason}")]
pub struct ProviderError {
    pub provider: ProviderId,
    pub reason: ProviderFailure,
}

impl ProviderError {
    pub fn new(provider: ProviderId, reason: impl Into<ProviderFailure>) -> Self {
        Self {
            provider,
            reason: reason.into(),
        }
    }
}

/// One upstream source, producing provider-native tables.
///
/// Adapters never rename columns or reshape dates; that is the normalizer's
/// job. They do reject empty results so "no rows" is a provider failure.
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    fn fetch_raw(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        market: Market,
        adjusted: bool,
    ) -> Result<RawTable, ProviderError>;
}

/// Turn an empty table into a provider failure.
pub(crate) fn non_empty(provider: ProviderId, table: RawTable) -> Result<RawTable, ProviderError> {
    if table.is_empty() {
        return Err(ProviderError::new(provider, ProviderFailure::Empty));
    }
    Ok(table)
}

//! Fallback orchestrator: validation, ordered provider dispatch, normalization.
//!
//! Providers are tried in a single linear pass. Each attempt yields a
//! `Result` (data or a provider-tagged failure); the first attempt that both
//! fetches and normalizes wins, and the remaining providers are never
//! called. A provider that was not registered at startup is simply left out
//! of the order.

use super::monthly::aggregate_monthly;
use super::normalize::{normalize, NormalizationError};
use super::provider::{ProviderAdapter, ProviderError, ProviderFailure};
use crate::domain::{
    CanonicalRecord, FetchRequest, Frequency, MonthlyRecord, ProviderChoice, ProviderId,
    RecordStamp, ValidRequest, ValidationError,
};
use thiserror::Error;

/// Why one provider attempt produced nothing usable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{provider}: {error}")]
    Normalization {
        provider: ProviderId,
        error: NormalizationError,
    },
}

impl AttemptError {
    pub fn provider(&self) -> ProviderId {
        match self {
            AttemptError::Provider(e) => e.provider,
            AttemptError::Normalization { provider, .. } => *provider,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// The request pinned a provider and it failed; no fallback was tried.
    #[error(transparent)]
    Provider(AttemptError),

    #[error("all providers failed: {}", join_attempts(attempts))]
    AllProvidersFailed { attempts: Vec<AttemptError> },
}

fn join_attempts(attempts: &[AttemptError]) -> String {
    if attempts.is_empty() {
        return "no provider available".into();
    }
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Result of a successful fetch, shaped by the request's frequency.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutput {
    Daily(Vec<CanonicalRecord>),
    Monthly(Vec<MonthlyRecord>),
}

impl FetchOutput {
    pub fn len(&self) -> usize {
        match self {
            FetchOutput::Daily(rows) => rows.len(),
            FetchOutput::Monthly(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The provider set resolved at startup, plus the fallback logic over it.
#[derive(Default)]
pub struct Fetcher {
    adapters: Vec<Box<dyn ProviderAdapter>>,
}

impl Fetcher {
    /// A fetcher with no providers; add them with [`Fetcher::register`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter. A later registration for the same id replaces the earlier one.
    pub fn register(mut self, adapter: Box<dyn ProviderAdapter>) -> Self {
        self.adapters.retain(|a| a.id() != adapter.id());
        self.adapters.push(adapter);
        self
    }

    /// Providers available in this fetcher.
    pub fn available(&self) -> Vec<ProviderId> {
        self.adapters.iter().map(|a| a.id()).collect()
    }

    fn adapter(&self, id: ProviderId) -> Option<&dyn ProviderAdapter> {
        self.adapters.iter().find(|a| a.id() == id).map(|a| a.as_ref())
    }

    /// Validate, fetch daily data with fallback, and resample if monthly was asked for.
    pub fn fetch(&self, req: &FetchRequest) -> Result<FetchOutput, FetchError> {
        let req = req.validate()?;
        let daily = self.fetch_daily(&req)?;
        match req.freq {
            Frequency::Daily => Ok(FetchOutput::Daily(daily)),
            Frequency::Monthly => Ok(FetchOutput::Monthly(aggregate_monthly(&daily))),
        }
    }

    /// Daily canonical records for an already-validated request.
    pub fn fetch_daily(&self, req: &ValidRequest) -> Result<Vec<CanonicalRecord>, FetchError> {
        if let ProviderChoice::Pinned(id) = req.provider {
            let adapter = self.adapter(id).ok_or_else(|| {
                FetchError::Provider(ProviderError::new(id, ProviderFailure::Unavailable).into())
            })?;
            return self.attempt(adapter, req).map_err(FetchError::Provider);
        }

        let mut failures = Vec::new();
        for &id in ProviderId::fallback_order(req.market) {
            let Some(adapter) = self.adapter(id) else {
                tracing::debug!(provider = %id, "provider not registered, skipping");
                continue;
            };
            match self.attempt(adapter, req) {
                Ok(records) => return Ok(records),
                Err(e) => {
                    tracing::warn!(
                        provider = %id,
                        symbol = %req.symbol,
                        error = %e,
                        "provider failed, trying next"
                    );
                    failures.push(e);
                }
            }
        }

        Err(FetchError::AllProvidersFailed { attempts: failures })
    }

    /// One provider: fetch raw, then normalize.
    fn attempt(
        &self,
        adapter: &dyn ProviderAdapter,
        req: &ValidRequest,
    ) -> Result<Vec<CanonicalRecord>, AttemptError> {
        let provider = adapter.id();
        tracing::debug!(
            provider = %provider,
            symbol = %req.symbol,
            market = %req.market,
            start = %req.start,
            end = %req.end,
            "fetching"
        );

        let raw = adapter.fetch_raw(&req.symbol, req.start, req.end, req.market, req.adjusted)?;
        let stamp = RecordStamp {
            market: req.market,
            symbol: req.symbol.clone(),
            source: provider,
            adjusted: req.adjusted,
        };
        let records =
            normalize(raw, &stamp).map_err(|error| AttemptError::Normalization { provider, error })?;

        tracing::info!(provider = %provider, symbol = %req.symbol, rows = records.len(), "fetched");
        Ok(records)
    }
}

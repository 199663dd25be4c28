//! Fetching, normalization and aggregation

pub mod batch;
pub mod datareader;
pub mod fetch;
pub mod http;
pub mod krx;
pub mod matrix;
pub mod monthly;
pub mod normalize;
pub mod provider;
pub mod raw;
pub mod schema;
pub mod yahoo;

pub use batch::{fetch_batch, BatchSummary, FetchProgress, TracingProgress};
pub use fetch::{AttemptError, FetchError, FetchOutput, Fetcher};
pub use matrix::{fetch_matrix, lookback_range, CloseMatrix};
pub use monthly::aggregate_monthly;
pub use normalize::{normalize, NormalizationError};
pub use provider::{ClientError, ProviderAdapter, ProviderError, ProviderFailure};
pub use raw::{RawTable, RawValue};
pub use schema::{aggregate_frame, read_daily_frame, records_from_frame, DailySchema, SchemaError};

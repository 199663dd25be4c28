//! Domain types: markets, providers, requests, and canonical records.

pub mod market;
pub mod record;
pub mod request;

pub use market::{Frequency, Market, ProviderChoice, ProviderId};
pub use record::{CanonicalRecord, MonthlyRecord, RecordStamp};
pub use request::{FetchRequest, ValidRequest, ValidationError, DATE_FORMAT};

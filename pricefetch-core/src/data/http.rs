//! Shared blocking HTTP plumbing for the provider clients.
//!
//! One `reqwest::blocking::Client` per provider client, built from
//! [`HttpSettings`]. Status codes are mapped to [`ClientError`] here so every
//! client reports transport failures the same way. There is no retry: a
//! failed call is a failed provider attempt and the orchestrator moves on.

use super::provider::ClientError;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout and identity for outbound requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into(),
        }
    }
}

impl HttpSettings {
    pub fn build_client(&self) -> Result<Client, ClientError> {
        Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(ClientError::from)
    }
}

/// Map a response status to a client error, passing successes through.
pub(crate) fn check_status(resp: Response, symbol: &str) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    tracing::debug!(status = status.as_u16(), symbol, url = %resp.url(), "upstream returned error status");
    Err(status_error(status, symbol))
}

fn status_error(status: StatusCode, symbol: &str) -> ClientError {
    if status == StatusCode::NOT_FOUND {
        return ClientError::SymbolNotFound {
            symbol: symbol.to_string(),
        };
    }
    ClientError::Http {
        status: status.as_u16(),
        symbol: symbol.to_string(),
    }
}

//! Fetcher configuration, loaded from TOML.
//!
//! ```toml
//! [http]
//! timeout_secs = 20
//!
//! [providers]
//! krx = false
//!
//! [output]
//! csv_bom = true
//!
//! [lists]
//! attack = ["QQQ", "VEA", "VWO", "BND"]
//! canary = ["SPY", "VEA", "VWO", "BND"]
//! ```
//!
//! Every section is optional. Provider toggles are the capability flags:
//! a disabled provider is never registered and the fallback chain skips it.

use crate::data::datareader::{DataReaderProvider, HttpDataReader};
use crate::data::fetch::Fetcher;
use crate::data::http::HttpSettings;
use crate::data::krx::{HttpKrx, KrxProvider};
use crate::data::matrix::dedup_symbols;
use crate::data::provider::ClientError;
use crate::data::yahoo::{HttpYahoo, YahooProvider};
use crate::domain::ProviderId;
use crate::export::WriteOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown symbol list '{0}'")]
    UnknownList(String),

    #[error("build {provider} client: {source}")]
    Client {
        provider: ProviderId,
        source: ClientError,
    },
}

/// Which providers are compiled into the fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderToggles {
    pub datareader: bool,
    pub krx: bool,
    pub yahoo: bool,
}

impl Default for ProviderToggles {
    fn default() -> Self {
        Self {
            datareader: true,
            krx: true,
            yahoo: true,
        }
    }
}

impl ProviderToggles {
    pub fn enabled(&self, id: ProviderId) -> bool {
        match id {
            ProviderId::DataReader => self.datareader,
            ProviderId::Krx => self.krx,
            ProviderId::Yahoo => self.yahoo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub csv_bom: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub http: HttpSettings,
    pub providers: ProviderToggles,
    pub output: OutputConfig,
    /// Named symbol lists for `batch` and `matrix`.
    pub lists: BTreeMap<String, Vec<String>>,
}

impl FetcherConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn list(&self, name: &str) -> Result<&[String], ConfigError> {
        self.lists
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| ConfigError::UnknownList(name.to_string()))
    }

    /// Concatenate named lists in order, dropping repeated symbols.
    pub fn union_of(&self, names: &[impl AsRef<str>]) -> Result<Vec<String>, ConfigError> {
        let mut all = Vec::new();
        for name in names {
            all.extend_from_slice(self.list(name.as_ref())?);
        }
        Ok(dedup_symbols(&all))
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            csv_bom: self.output.csv_bom,
        }
    }

    /// Register the enabled providers with real HTTP clients.
    pub fn build_fetcher(&self) -> Result<Fetcher, ConfigError> {
        let client_err =
            |provider: ProviderId| move |source: ClientError| ConfigError::Client { provider, source };
        let mut fetcher = Fetcher::new();

        if self.providers.datareader {
            let client = HttpDataReader::new(&self.http).map_err(client_err(ProviderId::DataReader))?;
            fetcher = fetcher.register(Box::new(DataReaderProvider::new(client)));
        }
        if self.providers.krx {
            let client = HttpKrx::new(&self.http).map_err(client_err(ProviderId::Krx))?;
            fetcher = fetcher.register(Box::new(KrxProvider::new(client)));
        }
        if self.providers.yahoo {
            let client = HttpYahoo::new(&self.http).map_err(client_err(ProviderId::Yahoo))?;
            fetcher = fetcher.register(Box::new(YahooProvider::new(client)));
        }

        tracing::debug!(providers = ?fetcher.available(), "fetcher ready");
        Ok(fetcher)
    }
}

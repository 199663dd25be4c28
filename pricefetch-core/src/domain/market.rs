//! Market, frequency, and provider identifiers.

use super::request::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exchange region a symbol trades in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Market {
    #[serde(rename = "KR")]
    Kr,
    #[serde(rename = "US")]
    Us,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Kr => "KR",
            Market::Us => "US",
        }
    }

    /// Guess the market from the symbol shape: six ASCII digits is a Korean
    /// listing code, anything else is treated as a US ticker.
    pub fn infer(symbol: &str) -> Self {
        let symbol = symbol.trim();
        if symbol.len() == 6 && symbol.bytes().all(|b| b.is_ascii_digit()) {
            Market::Kr
        } else {
            Market::Us
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KR" => Ok(Market::Kr),
            "US" => Ok(Market::Us),
            _ => Err(ValidationError::UnsupportedMarket(s.to_string())),
        }
    }
}

/// Output bar frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "daily" => Ok(Frequency::Daily),
            "monthly" => Ok(Frequency::Monthly),
            _ => Err(ValidationError::UnsupportedFrequency(s.to_string())),
        }
    }
}

/// Upstream data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Broad-coverage aggregator (Naver chart for KR, Stooq for US).
    DataReader,
    /// Korea Exchange market data portal.
    Krx,
    /// Yahoo Finance chart API.
    Yahoo,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::DataReader, ProviderId::Krx, ProviderId::Yahoo];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::DataReader => "datareader",
            ProviderId::Krx => "krx",
            ProviderId::Yahoo => "yahoo",
        }
    }

    /// Fallback order used when the request does not pin a provider.
    pub fn fallback_order(market: Market) -> &'static [ProviderId] {
        match market {
            Market::Us => &[ProviderId::DataReader, ProviderId::Yahoo],
            Market::Kr => &[ProviderId::DataReader, ProviderId::Krx, ProviderId::Yahoo],
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderId::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnsupportedProvider(s.to_string()))
    }
}

/// Provider selection carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderChoice {
    #[default]
    Auto,
    Pinned(ProviderId),
}

impl fmt::Display for ProviderChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderChoice::Auto => f.write_str("auto"),
            ProviderChoice::Pinned(p) => p.fmt(f),
        }
    }
}

impl FromStr for ProviderChoice {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == "auto" {
            return Ok(ProviderChoice::Auto);
        }
        s.parse().map(ProviderChoice::Pinned)
    }
}

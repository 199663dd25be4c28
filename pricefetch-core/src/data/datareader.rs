//! General-purpose reader covering both markets.
//!
//! KR symbols come from Naver's chart feed, whose header row is Korean
//! (`날짜, 시가, 고가, 저가, 종가, 거래량`). US symbols come from Stooq's daily
//! CSV (`Date, Open, High, Low, Close, Volume`). Either way the date arrives
//! as an ordinary column and the index is positional.

use super::http::{check_status, HttpSettings};
use super::provider::{non_empty, ClientError, ProviderAdapter, ProviderError};
use super::raw::{RawTable, RawValue};
use crate::domain::{Market, ProviderId};
use chrono::NaiveDate;

/// The reader library: one call per symbol and range.
pub trait DataReaderClient: Send + Sync {
    fn daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        market: Market,
    ) -> Result<RawTable, ClientError>;
}

/// Blocking HTTP implementation over Naver (KR) and Stooq (US).
pub struct HttpDataReader {
    client: reqwest::blocking::Client,
}

impl HttpDataReader {
    pub fn new(settings: &HttpSettings) -> Result<Self, ClientError> {
        Ok(Self {
            client: settings.build_client()?,
        })
    }

    fn naver_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "https://fchart.stock.naver.com/siseJson.nhn?symbol={symbol}&requestType=1\
             &startTime={}&endTime={}&timeframe=day",
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
        )
    }

    fn stooq_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "https://stooq.com/q/d/l/?s={}&d1={}&d2={}&i=d",
            stooq_symbol(symbol),
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
        )
    }
}

impl DataReaderClient for HttpDataReader {
    fn daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        market: Market,
    ) -> Result<RawTable, ClientError> {
        let url = match market {
            Market::Kr => Self::naver_url(symbol, start, end),
            Market::Us => Self::stooq_url(symbol, start, end),
        };
        tracing::debug!(%url, "datareader request");
        let body = check_status(self.client.get(&url).send()?, symbol)?.text()?;
        match market {
            Market::Kr => parse_naver(&body),
            Market::Us => parse_stooq(&body),
        }
    }
}

/// Stooq wants lowercase tickers with a `.us` suffix.
fn stooq_symbol(symbol: &str) -> String {
    let lower = symbol.to_ascii_lowercase();
    if lower.contains('.') {
        lower
    } else {
        format!("{lower}.us")
    }
}

/// Parse Naver's chart payload: a JS array literal whose first row is the header.
fn parse_naver(body: &str) -> Result<RawTable, ClientError> {
    let json = body.trim().replace('\'', "\"");
    let rows: Vec<Vec<serde_json::Value>> = serde_json::from_str(&json)
        .map_err(|e| ClientError::ResponseFormatChanged(format!("naver chart payload: {e}")))?;

    let mut rows = rows.into_iter();
    let header: Vec<String> = match rows.next() {
        Some(h) => h
            .into_iter()
            .map(|v| v.as_str().unwrap_or_default().trim().to_string())
            .collect(),
        None => return Ok(RawTable::new()),
    };

    let mut columns: Vec<Vec<RawValue>> = vec![Vec::new(); header.len()];
    for row in rows {
        if row.len() != header.len() {
            return Err(ClientError::ResponseFormatChanged(format!(
                "naver row has {} cells, header has {}",
                row.len(),
                header.len()
            )));
        }
        for (col, cell) in columns.iter_mut().zip(row) {
            col.push(json_cell(cell));
        }
    }

    Ok(header
        .into_iter()
        .zip(columns)
        .fold(RawTable::new(), |t, (name, values)| t.column(name, values)))
}

fn json_cell(v: serde_json::Value) -> RawValue {
    match v {
        serde_json::Value::Null => RawValue::Null,
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => RawValue::Int(i),
            None => n.as_f64().map(RawValue::Float).unwrap_or(RawValue::Null),
        },
        serde_json::Value::String(s) => RawValue::Text(s),
        other => RawValue::Text(other.to_string()),
    }
}

/// Parse Stooq's CSV export. A body of `No data` means an empty range.
fn parse_stooq(body: &str) -> Result<RawTable, ClientError> {
    if body.trim().eq_ignore_ascii_case("no data") {
        return Ok(RawTable::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(body.as_bytes());
    let header: Vec<String> = reader
        .headers()
        .map_err(|e| ClientError::ResponseFormatChanged(format!("stooq header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut columns: Vec<Vec<RawValue>> = vec![Vec::new(); header.len()];
    for record in reader.records() {
        let record =
            record.map_err(|e| ClientError::ResponseFormatChanged(format!("stooq row: {e}")))?;
        for (col, cell) in columns.iter_mut().zip(record.iter()) {
            col.push(if cell.is_empty() {
                RawValue::Null
            } else {
                RawValue::Text(cell.to_string())
            });
        }
    }

    Ok(header
        .into_iter()
        .zip(columns)
        .fold(RawTable::new(), |t, (name, values)| t.column(name, values)))
}

/// Variant A adapter: either market, date as a column.
pub struct DataReaderProvider<C> {
    client: C,
}

impl<C: DataReaderClient> DataReaderProvider<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: DataReaderClient> ProviderAdapter for DataReaderProvider<C> {
    fn id(&self) -> ProviderId {
        ProviderId::DataReader
    }

    fn fetch_raw(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        market: Market,
        _adjusted: bool,
    ) -> Result<RawTable, ProviderError> {
        let table = self
            .client
            .daily(symbol, start, end, market)
            .map_err(|e| ProviderError::new(self.id(), e))?;
        non_empty(self.id(), table)
    }
}

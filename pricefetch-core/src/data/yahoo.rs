//! Yahoo Finance chart feed (either market).
//!
//! Fetches daily bars from Yahoo's v8 chart API. Yahoo has no official API
//! and is subject to unannounced format changes; a payload that no longer
//! matches the structs below is reported as `ResponseFormatChanged`.
//!
//! Korean listings need an exchange suffix: a bare KR code is tried as
//! `.KS` (KOSPI) and then `.KQ` (KOSDAQ).

use super::http::{check_status, HttpSettings};
use super::provider::{ClientError, ProviderAdapter, ProviderError, ProviderFailure};
use super::raw::{RawTable, RawValue};
use crate::domain::{Market, ProviderId};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i32,
    #[serde(default)]
    exchange_timezone_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// The chart library: history for one exact Yahoo ticker.
pub trait YahooClient: Send + Sync {
    fn history(&self, ticker: &str, start: NaiveDate, end: NaiveDate)
        -> Result<RawTable, ClientError>;
}

/// Blocking HTTP client for the chart API.
pub struct HttpYahoo {
    client: reqwest::blocking::Client,
}

impl HttpYahoo {
    pub fn new(settings: &HttpSettings) -> Result<Self, ClientError> {
        Ok(Self {
            client: settings.build_client()?,
        })
    }

    /// Build the chart API URL for a ticker and inclusive date range.
    fn chart_url(ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{ticker}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true&events=div,splits"
        )
    }
}

impl YahooClient for HttpYahoo {
    fn history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable, ClientError> {
        let url = Self::chart_url(ticker, start, end);
        tracing::debug!(ticker, %url, "yahoo request");
        let resp = check_status(self.client.get(&url).send()?, ticker)?;
        let chart: ChartResponse = resp.json().map_err(|e| {
            ClientError::ResponseFormatChanged(format!("failed to parse response for {ticker}: {e}"))
        })?;
        parse_chart(ticker, chart)
    }
}

/// Parse the chart response into a table indexed by exchange-local timestamps.
fn parse_chart(ticker: &str, resp: ChartResponse) -> Result<RawTable, ClientError> {
    let result = match (resp.chart.result, resp.chart.error) {
        (Some(result), _) => result,
        (None, Some(err)) if err.code == "Not Found" => {
            return Err(ClientError::SymbolNotFound {
                symbol: ticker.to_string(),
            })
        }
        (None, Some(err)) => {
            return Err(ClientError::ResponseFormatChanged(format!(
                "{}: {}",
                err.code, err.description
            )))
        }
        (None, None) => {
            return Err(ClientError::ResponseFormatChanged(
                "empty result with no error".into(),
            ))
        }
    };

    let Some(data) = result.into_iter().next() else {
        return Ok(RawTable::new());
    };
    // Yahoo omits timestamps entirely for a range with no sessions
    let Some(timestamps) = data.timestamp else {
        return Ok(RawTable::new());
    };

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ClientError::ResponseFormatChanged("no quote data".into()))?;
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let offset = FixedOffset::east_opt(data.meta.gmtoffset).ok_or_else(|| {
        ClientError::ResponseFormatChanged(format!("invalid gmtoffset {}", data.meta.gmtoffset))
    })?;
    if let Some(tz) = &data.meta.exchange_timezone_name {
        tracing::trace!(ticker, tz = %tz, offset = data.meta.gmtoffset, "exchange timezone");
    }

    let price = |v: Option<f64>| v.map(RawValue::Float).unwrap_or(RawValue::Null);
    let mut index = Vec::with_capacity(timestamps.len());
    let (mut open, mut high, mut low, mut close, mut adj, mut volume) =
        (Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());

    for (i, &ts) in timestamps.iter().enumerate() {
        let o = quote.open.get(i).copied().flatten();
        let h = quote.high.get(i).copied().flatten();
        let l = quote.low.get(i).copied().flatten();
        let c = quote.close.get(i).copied().flatten();
        let v = quote.volume.get(i).copied().flatten();

        // Skip rows where all OHLCV are None (holidays/non-trading days)
        if o.is_none() && h.is_none() && l.is_none() && c.is_none() && v.is_none() {
            continue;
        }

        let stamp = DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.with_timezone(&offset))
            .ok_or_else(|| ClientError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;
        index.push(RawValue::DateTime(stamp));
        open.push(price(o));
        high.push(price(h));
        low.push(price(l));
        close.push(price(c));
        adj.push(price(
            adj_closes.as_ref().and_then(|a| a.get(i).copied().flatten()),
        ));
        volume.push(v.map(|v| RawValue::Int(v as i64)).unwrap_or(RawValue::Null));
    }

    let mut table = RawTable::with_index(index)
        .column("Open", open)
        .column("High", high)
        .column("Low", low)
        .column("Close", close);
    if adj_closes.is_some() {
        table = table.column("Adj Close", adj);
    }
    Ok(table.column("Volume", volume))
}

/// Tickers to try, in order, for a symbol in a market.
pub fn candidate_tickers(symbol: &str, market: Market) -> Vec<String> {
    if market == Market::Kr && !symbol.contains('.') {
        vec![format!("{symbol}.KS"), format!("{symbol}.KQ")]
    } else {
        vec![symbol.to_string()]
    }
}

/// Variant C adapter: global coverage with exchange-suffix probing for KR.
pub struct YahooProvider<C> {
    client: C,
}

impl<C: YahooClient> YahooProvider<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: YahooClient> ProviderAdapter for YahooProvider<C> {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn fetch_raw(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        market: Market,
        _adjusted: bool,
    ) -> Result<RawTable, ProviderError> {
        let mut last_error = None;
        for ticker in candidate_tickers(symbol, market) {
            match self.client.history(&ticker, start, end) {
                Ok(table) if !table.is_empty() => return Ok(table),
                Ok(_) => tracing::debug!(ticker = %ticker, "no rows, trying next ticker"),
                Err(e) => {
                    tracing::debug!(ticker = %ticker, error = %e, "ticker failed");
                    last_error = Some(e);
                }
            }
        }

        let reason = match last_error {
            Some(e) => ProviderFailure::Client(e),
            None => ProviderFailure::Empty,
        };
        Err(ProviderError::new(self.id(), reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::raw::floats;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn chart(json: &str) -> ChartResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn chart_parses_into_tz_aware_index() {
        let resp = chart(
            r#"{"chart":{"result":[{
                "meta":{"gmtoffset":32400,"exchangeTimezoneName":"Asia/Seoul"},
                "timestamp":[1704153600,1704240000,1704326400],
                "indicators":{
                    "quote":[{"open":[78200.0,null,78500.0],"high":[79800.0,null,78800.0],
                              "low":[78200.0,null,77000.0],"close":[79600.0,null,77000.0],
                              "volume":[17142847,null,21753644]}],
                    "adjclose":[{"adjclose":[79600.0,null,77000.0]}]
                }}],"error":null}}"#,
        );
        let t = parse_chart("005930.KS", resp).unwrap();
        assert_eq!(t.height(), 2, "all-null row is skipped");
        assert_eq!(
            t.column_names(),
            vec!["Open", "High", "Low", "Close", "Adj Close", "Volume"]
        );

        let index = t.index.as_ref().unwrap();
        match &index[0] {
            RawValue::DateTime(dt) => {
                assert_eq!(dt.offset().local_minus_utc(), 32400);
                assert_eq!(dt.to_rfc3339(), "2024-01-02T09:00:00+09:00");
            }
            other => panic!("expected a timestamp, got {other:?}"),
        }
        assert_eq!(t.get("Volume").unwrap().values[1], RawValue::Int(21753644));
    }

    #[test]
    fn missing_adjclose_block_omits_the_column() {
        let resp = chart(
            r#"{"chart":{"result":[{"timestamp":[1704205800],
                "indicators":{"quote":[{"open":[187.15],"high":[188.44],"low":[183.88],
                "close":[185.64],"volume":[82488674]}]}}],"error":null}}"#,
        );
        let t = parse_chart("AAPL", resp).unwrap();
        assert!(t.get("Adj Close").is_none());
        assert_eq!(t.get("Close").unwrap().values[0], RawValue::Float(185.64));
    }

    #[test]
    fn not_found_error_maps_to_missing_symbol() {
        let resp = chart(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#,
        );
        assert_eq!(
            parse_chart("ZZZZ", resp).unwrap_err(),
            ClientError::SymbolNotFound {
                symbol: "ZZZZ".into()
            }
        );
    }

    #[test]
    fn range_without_sessions_is_empty() {
        let resp = chart(
            r#"{"chart":{"result":[{"indicators":{"quote":[{"open":[],"high":[],"low":[],
                "close":[],"volume":[]}]}}],"error":null}}"#,
        );
        assert!(parse_chart("AAPL", resp).unwrap().is_empty());
    }

    #[test]
    fn kr_codes_get_exchange_suffixes() {
        assert_eq!(candidate_tickers("005930", Market::Kr), vec!["005930.KS", "005930.KQ"]);
        assert_eq!(candidate_tickers("005930.KS", Market::Kr), vec!["005930.KS"]);
        assert_eq!(candidate_tickers("AAPL", Market::Us), vec!["AAPL"]);
    }

    /// Fake chart library keyed by ticker; unknown tickers come back empty.
    #[derive(Default)]
    struct FakeYahoo {
        responses: HashMap<String, Result<RawTable, ClientError>>,
        asked: Mutex<Vec<String>>,
    }

    impl FakeYahoo {
        fn with(mut self, ticker: &str, result: Result<RawTable, ClientError>) -> Self {
            self.responses.insert(ticker.into(), result);
            self
        }
    }

    impl YahooClient for FakeYahoo {
        fn history(
            &self,
            ticker: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<RawTable, ClientError> {
            self.asked.lock().unwrap().push(ticker.to_string());
            self.responses
                .get(ticker)
                .cloned()
                .unwrap_or_else(|| Ok(RawTable::new()))
        }
    }

    fn one_row() -> RawTable {
        RawTable::with_index(vec![RawValue::Text("2024-01-02".into())]).column("Close", floats(&[1.0]))
    }

    fn jan() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[test]
    fn kosdaq_listing_found_after_empty_kospi_probe() {
        let provider = YahooProvider::new(FakeYahoo::default().with("035720.KQ", Ok(one_row())));
        let (start, end) = jan();
        let t = provider.fetch_raw("035720", start, end, Market::Kr, true).unwrap();
        assert_eq!(t, one_row());
        assert_eq!(
            *provider.client.asked.lock().unwrap(),
            vec!["035720.KS".to_string(), "035720.KQ".to_string()]
        );
    }

    #[test]
    fn first_non_empty_candidate_wins() {
        let provider = YahooProvider::new(
            FakeYahoo::default()
                .with("005930.KS", Ok(one_row()))
                .with("005930.KQ", Err(ClientError::NetworkUnreachable("x".into()))),
        );
        let (start, end) = jan();
        assert!(provider.fetch_raw("005930", start, end, Market::Kr, true).is_ok());
        assert_eq!(provider.client.asked.lock().unwrap().len(), 1);
    }

    #[test]
    fn all_empty_reports_no_data_and_errors_report_last() {
        let (start, end) = jan();
        let empty = YahooProvider::new(FakeYahoo::default());
        let err = empty.fetch_raw("123456", start, end, Market::Kr, true).unwrap_err();
        assert_eq!(err.reason, ProviderFailure::Empty);

        let failing = YahooProvider::new(
            FakeYahoo::default()
                .with("123456.KS", Err(ClientError::NetworkUnreachable("first".into())))
                .with("123456.KQ", Err(ClientError::NetworkUnreachable("second".into()))),
        );
        let err = failing.fetch_raw("123456", start, end, Market::Kr, true).unwrap_err();
        assert_eq!(err.to_string(), "yahoo: network unreachable: second");
    }
}

//! Korea Exchange market-data feed (KR only).
//!
//! The exchange's data portal answers a form POST with JSON rows keyed by
//! its internal field codes. The client turns those into a date-indexed
//! table with the exchange's Korean column names, change rate included.

use super::http::{check_status, HttpSettings};
use super::provider::{non_empty, ClientError, ProviderAdapter, ProviderError, ProviderFailure};
use super::raw::{RawTable, RawValue};
use crate::domain::{Market, ProviderId};
use chrono::NaiveDate;
use serde::Deserialize;

const KRX_URL: &str = "http://data.krx.co.kr/comm/bldAttendant/getJsonData.cmd";
const KRX_REFERER: &str = "http://data.krx.co.kr/contents/MDC/MDI/mdiLoader";
const DAILY_PRICE_BLD: &str = "dbms/MDC/STAT/standard/MDCSTAT01701";

/// The exchange library: dates are 8-digit `YYYYMMDD` strings.
pub trait KrxClient: Send + Sync {
    fn market_ohlcv(
        &self,
        start: &str,
        end: &str,
        ticker: &str,
        adjusted: bool,
    ) -> Result<RawTable, ClientError>;
}

/// ISIN for a 6-digit KRX short code: `KR7` + code + `00` + check digit.
pub fn isin_for(code: &str) -> Option<String> {
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let base = format!("KR7{}00", code.to_ascii_uppercase());
    let check = isin_check_digit(&base)?;
    Some(format!("{base}{check}"))
}

/// Luhn check digit over the ISIN body, letters expanded to 10..=35.
fn isin_check_digit(base: &str) -> Option<u32> {
    let mut digits = Vec::with_capacity(base.len() * 2);
    for c in base.chars() {
        let v = c.to_digit(36)?;
        if v >= 10 {
            digits.push(v / 10);
        }
        digits.push(v % 10);
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    Some((10 - sum % 10) % 10)
}

#[derive(Debug, Deserialize)]
struct KrxResponse {
    output: Vec<KrxRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct KrxRow {
    trd_dd: String,
    tdd_opnprc: String,
    tdd_hgprc: String,
    tdd_lwprc: String,
    tdd_clsprc: String,
    acc_trdvol: String,
    #[serde(default)]
    fluc_rt: Option<String>,
}

/// Blocking HTTP client for the exchange data portal.
pub struct HttpKrx {
    client: reqwest::blocking::Client,
}

impl HttpKrx {
    pub fn new(settings: &HttpSettings) -> Result<Self, ClientError> {
        Ok(Self {
            client: settings.build_client()?,
        })
    }
}

impl KrxClient for HttpKrx {
    fn market_ohlcv(
        &self,
        start: &str,
        end: &str,
        ticker: &str,
        adjusted: bool,
    ) -> Result<RawTable, ClientError> {
        let isin = isin_for(ticker).ok_or_else(|| ClientError::SymbolNotFound {
            symbol: ticker.to_string(),
        })?;
        let adj = if adjusted { "2" } else { "1" };
        let form = [
            ("bld", DAILY_PRICE_BLD),
            ("isuCd", isin.as_str()),
            ("strtDd", start),
            ("endDd", end),
            ("adjStkPrc", adj),
            ("adjStkPrc_check", "Y"),
        ];
        tracing::debug!(ticker, %isin, start, end, "krx request");

        let resp = self
            .client
            .post(KRX_URL)
            .header("Referer", KRX_REFERER)
            .form(&form)
            .send()?;
        let body = check_status(resp, ticker)?.text()?;
        parse_krx(&body)
    }
}

fn parse_krx(body: &str) -> Result<RawTable, ClientError> {
    let resp: KrxResponse = serde_json::from_str(body)
        .map_err(|e| ClientError::ResponseFormatChanged(format!("krx payload: {e}")))?;

    let text = |s: &str| RawValue::Text(s.to_string());
    let rows = &resp.output;
    Ok(
        RawTable::with_index(rows.iter().map(|r| text(&r.trd_dd)).collect())
            .column("시가", rows.iter().map(|r| text(&r.tdd_opnprc)).collect())
            .column("고가", rows.iter().map(|r| text(&r.tdd_hgprc)).collect())
            .column("저가", rows.iter().map(|r| text(&r.tdd_lwprc)).collect())
            .column("종가", rows.iter().map(|r| text(&r.tdd_clsprc)).collect())
            .column("거래량", rows.iter().map(|r| text(&r.acc_trdvol)).collect())
            .column(
                "등락률",
                rows.iter()
                    .map(|r| r.fluc_rt.as_deref().map(text).unwrap_or(RawValue::Null))
                    .collect(),
            ),
    )
}

/// Variant B adapter: KR only, dates passed as `YYYYMMDD`.
pub struct KrxProvider<C> {
    client: C,
}

impl<C: KrxClient> KrxProvider<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: KrxClient> ProviderAdapter for KrxProvider<C> {
    fn id(&self) -> ProviderId {
        ProviderId::Krx
    }

    fn fetch_raw(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        market: Market,
        adjusted: bool,
    ) -> Result<RawTable, ProviderError> {
        if market != Market::Kr {
            return Err(ProviderError::new(
                self.id(),
                ProviderFailure::UnsupportedMarket(market),
            ));
        }
        let start = start.format("%Y%m%d").to_string();
        let end = end.format("%Y%m%d").to_string();
        let table = self
            .client
            .market_ohlcv(&start, &end, symbol, adjusted)
            .map_err(|e| ProviderError::new(self.id(), e))?;
        non_empty(self.id(), table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::raw::texts;
    use std::sync::Mutex;

    #[test]
    fn isin_check_digits_match_listed_codes() {
        assert_eq!(isin_for("005930").as_deref(), Some("KR7005930003"));
        assert_eq!(isin_for("000660").as_deref(), Some("KR7000660001"));
        assert_eq!(isin_for("035720").as_deref(), Some("KR7035720002"));
        assert_eq!(isin_for("069500").as_deref(), Some("KR7069500007"));
    }

    #[test]
    fn isin_rejects_malformed_codes() {
        assert_eq!(isin_for("5930"), None);
        assert_eq!(isin_for("00593-"), None);
    }

    #[test]
    fn payload_becomes_date_indexed_korean_table() {
        let body = r#"{"output":[
            {"TRD_DD":"2024/01/03","TDD_OPNPRC":"78,500","TDD_HGPRC":"78,800","TDD_LWPRC":"77,000",
             "TDD_CLSPRC":"77,000","ACC_TRDVOL":"21,753,644","FLUC_RT":"-3.27","MKTCAP":"1"},
            {"TRD_DD":"2024/01/02","TDD_OPNPRC":"78,200","TDD_HGPRC":"79,800","TDD_LWPRC":"78,200",
             "TDD_CLSPRC":"79,600","ACC_TRDVOL":"17,142,847","FLUC_RT":"1.02"}
        ]}"#;
        let t = parse_krx(body).unwrap();
        assert_eq!(t.index, Some(texts(&["2024/01/03", "2024/01/02"])));
        assert_eq!(t.column_names(), vec!["시가", "고가", "저가", "종가", "거래량", "등락률"]);
        assert_eq!(t.get("거래량").unwrap().values[1], RawValue::Text("17,142,847".into()));
    }

    #[test]
    fn payload_without_output_is_a_format_change() {
        assert!(matches!(
            parse_krx(r#"{"error":"x"}"#),
            Err(ClientError::ResponseFormatChanged(_))
        ));
    }

    #[derive(Default)]
    struct FakeKrx {
        calls: Mutex<Vec<(String, String, String, bool)>>,
    }

    impl KrxClient for FakeKrx {
        fn market_ohlcv(
            &self,
            start: &str,
            end: &str,
            ticker: &str,
            adjusted: bool,
        ) -> Result<RawTable, ClientError> {
            self.calls
                .lock()
                .unwrap()
                .push((start.into(), end.into(), ticker.into(), adjusted));
            Ok(RawTable::with_index(texts(&["20240102"])).column("종가", texts(&["79,600"])))
        }
    }

    fn jan() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[test]
    fn dates_are_compacted_before_the_call() {
        let provider = KrxProvider::new(FakeKrx::default());
        let (start, end) = jan();
        provider.fetch_raw("005930", start, end, Market::Kr, false).unwrap();
        let calls = provider.client.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            ("20240101".into(), "20240131".into(), "005930".into(), false)
        );
    }

    #[test]
    fn us_market_fails_without_calling_the_client() {
        let provider = KrxProvider::new(FakeKrx::default());
        let (start, end) = jan();
        let err = provider.fetch_raw("AAPL", start, end, Market::Us, true).unwrap_err();
        assert_eq!(err.provider, ProviderId::Krx);
        assert_eq!(err.reason, ProviderFailure::UnsupportedMarket(Market::Us));
        assert!(provider.client.calls.lock().unwrap().is_empty());
    }
}

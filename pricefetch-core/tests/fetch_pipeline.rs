//! End-to-end fetch pipeline with fake provider clients behind the real adapters.
//!
//! Each fake speaks its provider's native shape (Korean headers with a date
//! column, a date-indexed exchange table, a timezone-aware chart index) so
//! the normalizer sees what production would feed it.

use chrono::{DateTime, NaiveDate};
use pricefetch_core::data::datareader::{DataReaderClient, DataReaderProvider};
use pricefetch_core::data::krx::{KrxClient, KrxProvider};
use pricefetch_core::data::raw::{floats, texts, RawTable, RawValue};
use pricefetch_core::data::yahoo::{YahooClient, YahooProvider};
use pricefetch_core::data::{ClientError, FetchError, FetchOutput, Fetcher};
use pricefetch_core::data::normalize::normalize;
use pricefetch_core::domain::{Market, ProviderId, RecordStamp};
use pricefetch_core::FetchRequest;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Fakes ────────────────────────────────────────────────────────────

struct Reader {
    kr: Result<RawTable, ClientError>,
    us: Result<RawTable, ClientError>,
    calls: Arc<AtomicUsize>,
}

impl DataReaderClient for Reader {
    fn daily(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
        market: Market,
    ) -> Result<RawTable, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match market {
            Market::Kr => self.kr.clone(),
            Market::Us => self.us.clone(),
        }
    }
}

struct Exchange {
    table: Result<RawTable, ClientError>,
    calls: Arc<AtomicUsize>,
}

impl KrxClient for Exchange {
    fn market_ohlcv(
        &self,
        _start: &str,
        _end: &str,
        _ticker: &str,
        _adjusted: bool,
    ) -> Result<RawTable, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.table.clone()
    }
}

struct Chart {
    table: RawTable,
    calls: Arc<AtomicUsize>,
}

impl YahooClient for Chart {
    fn history(
        &self,
        ticker: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<RawTable, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if ticker.ends_with(".KQ") {
            return Ok(RawTable::new());
        }
        Ok(self.table.clone())
    }
}

// ── Native-shaped tables ─────────────────────────────────────────────

fn naver_table() -> RawTable {
    RawTable::new()
        .column("날짜", texts(&["20240103", "20240102"]))
        .column("시가", vec![RawValue::Int(78500), RawValue::Int(78200)])
        .column("고가", vec![RawValue::Int(78800), RawValue::Int(79800)])
        .column("저가", vec![RawValue::Int(77000), RawValue::Int(78200)])
        .column("종가", vec![RawValue::Int(77000), RawValue::Int(79600)])
        .column("거래량", vec![RawValue::Int(21753644), RawValue::Int(17142847)])
        .column("외국인소진율", floats(&[53.28, 53.32]))
}

fn krx_table() -> RawTable {
    RawTable::with_index(texts(&["2024/01/03", "2024/01/02"]))
        .column("시가", texts(&["78,500", "78,200"]))
        .column("고가", texts(&["78,800", "79,800"]))
        .column("저가", texts(&["77,000", "78,200"]))
        .column("종가", texts(&["77,000", "79,600"]))
        .column("거래량", texts(&["21,753,644", "17,142,847"]))
        .column("등락률", texts(&["-3.27", "1.02"]))
}

fn yahoo_table() -> RawTable {
    let ts = |s: &str| RawValue::DateTime(DateTime::parse_from_rfc3339(s).unwrap());
    RawTable::with_index(vec![
        ts("2024-01-02T09:00:00+09:00"),
        ts("2024-01-03T09:00:00+09:00"),
    ])
    .column("Open", floats(&[78200.0, 78500.0]))
    .column("High", floats(&[79800.0, 78800.0]))
    .column("Low", floats(&[78200.0, 77000.0]))
    .column("Close", floats(&[79600.0, 77000.0]))
    .column("Adj Close", floats(&[77500.0, 75000.0]))
    .column("Volume", vec![RawValue::Int(17142847), RawValue::Int(21753644)])
}

struct Counters {
    reader: Arc<AtomicUsize>,
    krx: Arc<AtomicUsize>,
    yahoo: Arc<AtomicUsize>,
}

fn fetcher(reader_kr: Result<RawTable, ClientError>) -> (Fetcher, Counters) {
    fetcher_with(reader_kr, Ok(krx_table()))
}

fn fetcher_with(
    reader_kr: Result<RawTable, ClientError>,
    krx: Result<RawTable, ClientError>,
) -> (Fetcher, Counters) {
    let counters = Counters {
        reader: Arc::new(AtomicUsize::new(0)),
        krx: Arc::new(AtomicUsize::new(0)),
        yahoo: Arc::new(AtomicUsize::new(0)),
    };
    let fetcher = Fetcher::new()
        .register(Box::new(DataReaderProvider::new(Reader {
            kr: reader_kr,
            us: Ok(RawTable::new()),
            calls: counters.reader.clone(),
        })))
        .register(Box::new(KrxProvider::new(Exchange {
            table: krx,
            calls: counters.krx.clone(),
        })))
        .register(Box::new(YahooProvider::new(Chart {
            table: yahoo_table(),
            calls: counters.yahoo.clone(),
        })));
    (fetcher, counters)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn daily(out: FetchOutput) -> Vec<pricefetch_core::domain::CanonicalRecord> {
    match out {
        FetchOutput::Daily(rows) => rows,
        other => panic!("expected daily output, got {other:?}"),
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn kr_reader_success_normalizes_korean_headers() {
    let (fetcher, counters) = fetcher(Ok(naver_table()));
    let req = FetchRequest::new("KR", "005930", "2024-01-01", "2024-01-31").with_adjusted(false);
    let rows = daily(fetcher.fetch(&req).unwrap());

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].date, date(2024, 1, 2), "sorted ascending");
    assert_eq!(rows[0].close, 79600.0);
    assert_eq!(rows[1].volume, 21753644);
    assert!(rows[0].adj_close.is_none());
    assert!(rows.iter().all(|r| r.source == ProviderId::DataReader
        && r.market == Market::Kr
        && r.symbol == "005930"
        && !r.adjusted));
    assert_eq!(counters.krx.load(Ordering::SeqCst), 0);
    assert_eq!(counters.yahoo.load(Ordering::SeqCst), 0);
}

#[test]
fn kr_falls_back_to_exchange_feed_when_reader_is_empty() {
    let (fetcher, counters) = fetcher(Ok(RawTable::new()));
    let req = FetchRequest::new("KR", "005930", "2024-01-01", "2024-01-31");
    let rows = daily(fetcher.fetch(&req).unwrap());

    assert!(rows.iter().all(|r| r.source == ProviderId::Krx));
    assert_eq!(rows[0].open, 78200.0, "thousands separators parsed");
    assert_eq!(rows[0].volume, 17142847);
    assert_eq!(counters.reader.load(Ordering::SeqCst), 1);
    assert_eq!(counters.yahoo.load(Ordering::SeqCst), 0);
}

#[test]
fn pinned_yahoo_keeps_local_dates_and_adj_close() {
    let (fetcher, counters) = fetcher(Ok(naver_table()));
    let req = FetchRequest::new("KR", "005930", "2024-01-01", "2024-01-31").with_provider("yahoo");
    let rows = daily(fetcher.fetch(&req).unwrap());

    assert_eq!(rows[0].date, date(2024, 1, 2));
    assert_eq!(rows[1].adj_close, Some(75000.0));
    assert!(rows.iter().all(|r| r.source == ProviderId::Yahoo));
    assert_eq!(counters.reader.load(Ordering::SeqCst), 0);
    // .KS answered, so .KQ was never asked
    assert_eq!(counters.yahoo.load(Ordering::SeqCst), 1);
}

#[test]
fn us_skips_exchange_feed_and_reports_history() {
    let counters = Arc::new(AtomicUsize::new(0));
    let fetcher = Fetcher::new()
        .register(Box::new(DataReaderProvider::new(Reader {
            kr: Ok(RawTable::new()),
            us: Err(ClientError::Http {
                status: 503,
                symbol: "AAPL".into(),
            }),
            calls: Arc::new(AtomicUsize::new(0)),
        })))
        .register(Box::new(KrxProvider::new(Exchange {
            table: Ok(krx_table()),
            calls: counters.clone(),
        })));

    let err = fetcher
        .fetch(&FetchRequest::new("US", "AAPL", "2024-01-01", "2024-01-31"))
        .unwrap_err();
    assert!(matches!(err, FetchError::AllProvidersFailed { .. }));
    assert_eq!(
        err.to_string(),
        "all providers failed: datareader: HTTP 503 for AAPL"
    );
    assert_eq!(counters.load(Ordering::SeqCst), 0);
}

#[test]
fn monthly_request_through_fallback() {
    let (fetcher, _) = fetcher(Err(ClientError::NetworkUnreachable("down".into())));
    let req = FetchRequest::new("KR", "005930", "2024-01-01", "2024-01-31").with_freq("monthly");
    let FetchOutput::Monthly(rows) = fetcher.fetch(&req).unwrap() else {
        panic!("expected monthly output");
    };
    assert_eq!(rows.len(), 1);
    let jan = &rows[0];
    assert_eq!(jan.period, date(2024, 1, 1));
    assert_eq!((jan.open, jan.high, jan.low, jan.close), (78200.0, 79800.0, 77000.0, 77000.0));
    assert_eq!(jan.volume, 17142847 + 21753644);
    assert_eq!(jan.source, ProviderId::Krx);
}

#[test]
fn duplicate_dates_fall_through_to_next_provider() {
    let dup = RawTable::new()
        .column("Date", texts(&["2024-01-02", "2024-01-02"]))
        .column("Open", floats(&[1.0, 1.0]))
        .column("High", floats(&[1.0, 1.0]))
        .column("Low", floats(&[1.0, 1.0]))
        .column("Close", floats(&[1.0, 1.0]))
        .column("Volume", floats(&[1.0, 1.0]));
    let (fetcher, _) = fetcher(Ok(dup));
    let rows = daily(
        fetcher
            .fetch(&FetchRequest::new("KR", "005930", "2024-01-01", "2024-01-31"))
            .unwrap(),
    );
    assert_eq!(rows[0].source, ProviderId::Krx);
}

#[test]
fn kr_third_provider_answers_when_first_two_fail() {
    let (fetcher, counters) = fetcher_with(
        Err(ClientError::Http {
            status: 500,
            symbol: "005930".into(),
        }),
        Err(ClientError::NetworkUnreachable("exchange down".into())),
    );
    let req = FetchRequest::new("KR", "005930", "2024-01-01", "2024-01-31");
    let rows = daily(fetcher.fetch(&req).unwrap());

    let expected = normalize(
        yahoo_table(),
        &RecordStamp {
            market: Market::Kr,
            symbol: "005930".into(),
            source: ProviderId::Yahoo,
            adjusted: true,
        },
    )
    .unwrap();
    assert_eq!(rows, expected);
    assert_eq!(counters.reader.load(Ordering::SeqCst), 1);
    assert_eq!(counters.krx.load(Ordering::SeqCst), 1);
    assert_eq!(counters.yahoo.load(Ordering::SeqCst), 1);
}

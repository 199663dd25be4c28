//! Provider-native tables, before normalization.
//!
//! Providers disagree on column names (English or Korean), on where the
//! date lives (row index or a `Date`/`날짜` column), and on cell types
//! (numbers, comma-grouped text, timezone-aware timestamps). A `RawTable`
//! carries all of that as-is; only the normalizer interprets it.

use chrono::{DateTime, FixedOffset, NaiveDate};

/// One cell of a raw table.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Float(f64),
    Int(i64),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Null,
}

impl RawValue {
    /// Numeric view of the cell. Text may use `,` as a thousands separator.
    /// `Ok(None)` means the cell is empty; `Err` carries the offending text.
    pub fn as_f64(&self) -> Result<Option<f64>, String> {
        match self {
            RawValue::Float(v) if v.is_nan() => Ok(None),
            RawValue::Float(v) => Ok(Some(*v)),
            RawValue::Int(v) => Ok(Some(*v as f64)),
            RawValue::Null => Ok(None),
            RawValue::Text(s) => {
                let cleaned = s.trim().replace(',', "");
                if cleaned.is_empty() || cleaned == "-" {
                    return Ok(None);
                }
                cleaned
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| format!("'{s}' is not a number"))
            }
            RawValue::Date(d) => Err(format!("date {d} is not a number")),
            RawValue::DateTime(dt) => Err(format!("timestamp {dt} is not a number")),
        }
    }

    /// Calendar-date view of the cell, with any timezone dropped.
    ///
    /// Timezone-aware values keep their local wall-clock date: a Seoul
    /// session stamped `2024-01-02T00:00:00+09:00` is 2024-01-02.
    pub fn as_date(&self) -> Result<NaiveDate, String> {
        match self {
            RawValue::Date(d) => Ok(*d),
            RawValue::DateTime(dt) => Ok(dt.naive_local().date()),
            RawValue::Text(s) => parse_date_text(s.trim()),
            RawValue::Int(v) => parse_date_text(&v.to_string()),
            RawValue::Float(v) => Err(format!("{v} is not a date")),
            RawValue::Null => Err("empty date".into()),
        }
    }
}

fn parse_date_text(s: &str) -> Result<NaiveDate, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local().date());
    }
    // Leading date of a "YYYY-MM-DD hh:mm:ss" style timestamp
    let head = s.split([' ', 'T']).next().unwrap_or(s);
    ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d", "%Y.%m.%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok())
        .ok_or_else(|| format!("'{s}' is not a date"))
}

/// A named column of raw cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub values: Vec<RawValue>,
}

/// Provider-specific table.
///
/// `index` is `None` for a positional index (the date, if any, is then one
/// of the columns). All columns have the same length as the index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub index: Option<Vec<RawValue>>,
    pub columns: Vec<RawColumn>,
}

impl RawTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table keyed by an explicit row index.
    pub fn with_index(index: Vec<RawValue>) -> Self {
        Self {
            index: Some(index),
            columns: Vec::new(),
        }
    }

    /// Append a column (builder style).
    pub fn column(mut self, name: impl Into<String>, values: Vec<RawValue>) -> Self {
        self.columns.push(RawColumn {
            name: name.into(),
            values,
        });
        self
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&RawColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Number of rows: index length, or the longest column for a positional index.
    pub fn height(&self) -> usize {
        match &self.index {
            Some(index) => index.len(),
            None => self.columns.iter().map(|c| c.values.len()).max().unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }
}

/// Convenience for building float columns.
pub fn floats(values: &[f64]) -> Vec<RawValue> {
    values.iter().map(|v| RawValue::Float(*v)).collect()
}

/// Convenience for building text columns.
pub fn texts(values: &[&str]) -> Vec<RawValue> {
    values.iter().map(|v| RawValue::Text(v.to_string())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_text_with_thousands_separators() {
        assert_eq!(RawValue::Text("79,600".into()).as_f64(), Ok(Some(79600.0)));
        assert_eq!(RawValue::Text("".into()).as_f64(), Ok(None));
        assert_eq!(RawValue::Text("-".into()).as_f64(), Ok(None));
        assert!(RawValue::Text("abc".into()).as_f64().is_err());
        assert_eq!(RawValue::Float(f64::NAN).as_f64(), Ok(None));
    }

    #[test]
    fn date_formats_accepted() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        for s in ["2024-01-02", "20240102", "2024/01/02", "2024.01.02", "2024-01-02 00:00:00"] {
            assert_eq!(RawValue::Text(s.into()).as_date(), Ok(d), "format {s}");
        }
        assert_eq!(RawValue::Int(20240102).as_date(), Ok(d));
        assert!(RawValue::Text("Jan 2".into()).as_date().is_err());
    }

    #[test]
    fn timezone_is_stripped_keeping_local_date() {
        let seoul = FixedOffset::east_opt(9 * 3600).unwrap();
        let dt = DateTime::parse_from_rfc3339("2024-01-02T00:00:00+09:00")
            .unwrap()
            .with_timezone(&seoul);
        assert_eq!(
            RawValue::DateTime(dt).as_date(),
            Ok(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        );
    }

    #[test]
    fn height_follows_index_or_columns() {
        let t = RawTable::new().column("Date", texts(&["2024-01-02", "2024-01-03"]));
        assert_eq!(t.height(), 2);
        let t = RawTable::with_index(vec![RawValue::Int(20240102)]).column("종가", floats(&[1.0]));
        assert_eq!(t.height(), 1);
        assert!(RawTable::new().is_empty());
    }
}

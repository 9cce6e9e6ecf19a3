//! Calendar dates and the `YYYYMMDD` date key.
//!
//! Both sides of the fact/date join go through [`cell_to_date`], so raw
//! values carrying a time of day (`2/24/2003 0:00`) and plain dates
//! (`2003-02-24`) land on the same calendar day.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::models::Cell;

/// Date-only layouts, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Date-time layouts; the time of day is discarded.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Surrogate key of the date dimension: the date written as `YYYYMMDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(u32);

impl DateKey {
    /// Encode a date. Only four-digit years fit in eight digits.
    pub fn from_date(date: NaiveDate) -> Option<Self> {
        let year = date.year();
        if !(1000..=9999).contains(&year) {
            return None;
        }
        Some(Self(year as u32 * 10_000 + date.month() * 100 + date.day()))
    }

    /// Decode back to the calendar date.
    pub fn to_date(self) -> Option<NaiveDate> {
        let year = (self.0 / 10_000) as i32;
        let month = (self.0 / 100) % 100;
        let day = self.0 % 100;
        NaiveDate::from_ymd_opt(year, month, day)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<DateKey> for Cell {
    fn from(key: DateKey) -> Self {
        Cell::Int(i64::from(key.0))
    }
}

/// Calendar quarter (1-4) of a date.
pub fn quarter(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

/// Parse a date string, dropping any time of day.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }

    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive())
}

/// Read a cell as a calendar date.
///
/// `Ok(None)` for missing values; `Err` carries the offending text.
pub fn cell_to_date(cell: &Cell) -> Result<Option<NaiveDate>, String> {
    match cell {
        Cell::Null => Ok(None),
        Cell::Date(d) => Ok(Some(*d)),
        Cell::Text(s) => parse_date(s).map(Some).ok_or_else(|| s.clone()),
        // A date dimension reloaded from CSV carries keys, not dates
        Cell::Int(v) => u32::try_from(*v)
            .ok()
            .and_then(|k| DateKey(k).to_date())
            .map(Some)
            .ok_or_else(|| v.to_string()),
        Cell::Float(v) if v.is_nan() => Ok(None),
        Cell::Float(v) => Err(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_key_example() {
        let key = DateKey::from_date(ymd(2024, 1, 15)).unwrap();
        assert_eq!(key.value(), 20240115);
        assert_eq!(key.to_string(), "20240115");
    }

    #[test]
    fn test_date_key_round_trip() {
        let mut date = ymd(2003, 1, 1);
        while date < ymd(2005, 12, 31) {
            let key = DateKey::from_date(date).unwrap();
            assert_eq!(key.to_date(), Some(date));
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_date_key_rejects_wide_years() {
        assert!(DateKey::from_date(ymd(12024, 1, 1)).is_none());
        assert!(DateKey::from_date(ymd(999, 1, 1)).is_none());
    }

    #[test]
    fn test_quarters() {
        assert_eq!(quarter(ymd(2024, 1, 15)), 1);
        assert_eq!(quarter(ymd(2024, 3, 31)), 1);
        assert_eq!(quarter(ymd(2024, 4, 1)), 2);
        assert_eq!(quarter(ymd(2024, 12, 31)), 4);
    }

    #[test]
    fn test_parse_formats_agree_on_day() {
        let expected = Some(ymd(2003, 2, 24));
        assert_eq!(parse_date("2003-02-24"), expected);
        assert_eq!(parse_date("2/24/2003 0:00"), expected);
        assert_eq!(parse_date("2/24/2003 17:45"), expected);
        assert_eq!(parse_date("02/24/2003"), expected);
        assert_eq!(parse_date("2003-02-24 13:01:02"), expected);
        assert_eq!(parse_date("2003-02-24T13:01:02"), expected);
        assert_eq!(parse_date("2003-02-24T13:01:02+02:00"), expected);
        assert_eq!(parse_date("2003/02/24"), expected);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2003-02-30"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_cell_to_date() {
        assert_eq!(cell_to_date(&Cell::Null), Ok(None));
        assert_eq!(cell_to_date(&Cell::Int(20240115)), Ok(Some(ymd(2024, 1, 15))));
        assert_eq!(cell_to_date(&Cell::Text("13/45/2003".into())), Err("13/45/2003".to_string()));
    }
}

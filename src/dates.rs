//! Date parsing for spreadsheet cells.
//!
//! Sheets hand dates back either as formatted text or, when a column was
//! formatted as a number, as a serial day count since 1899-12-30.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SERIAL_REGEX: Regex = Regex::new(r"^\d+(\.\d+)?$").unwrap();
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d %B %Y", "%B %d, %Y"];

fn serial_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
}

/// Whether `text` looks like a spreadsheet date serial.
pub fn is_serial(text: &str) -> bool {
    SERIAL_REGEX.is_match(text.trim())
}

/// Convert a serial such as `45938` or `45938.5` to a timestamp.
pub fn from_serial(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if !is_serial(text) {
        return None;
    }
    let serial: f64 = text.parse().ok()?;
    let days = serial.trunc() as i64;
    let seconds = ((serial - serial.trunc()) * 86_400.0).round() as i64;
    serial_epoch()
        .checked_add_signed(Duration::try_days(days)?)?
        .checked_add_signed(Duration::try_seconds(seconds)?)
}

/// Parse a cell as a timestamp: serials first, then literal formats.
///
/// Date-only values land at midnight. Returns `None` when nothing matches.
pub fn parse_cell(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if is_serial(text) {
        return from_serial(text);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}

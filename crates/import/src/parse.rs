use backoffice_core::Value;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// A cell that does not satisfy the type rule it was checked against.
/// Carries the raw text for diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Value not parseable: '{0}'")]
pub struct NotParseable(pub String);

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%m-%d-%Y", "%d-%m-%Y", "%d.%m.%Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// `YYYYMMDD`, as bank exports write their transaction dates.
pub fn parse_compact_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = s[..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn parse_datetime_text(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Parses date text, discarding any time-of-day component.
pub fn parse_date_text(s: &str) -> Result<NaiveDate, NotParseable> {
    let trimmed = s.trim();

    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
    {
        return Ok(date);
    }
    if let Some(dt) = parse_datetime_text(trimmed) {
        return Ok(dt.date());
    }
    parse_compact_date(trimmed).ok_or_else(|| NotParseable(s.to_string()))
}

/// Date rule for a cell. Date cells pass, text is parsed, numbers and
/// booleans are rejected (real dates arrive as date cells, a bare number in
/// a date column is an identifier that slipped out of place).
pub fn parse_date(value: &Value) -> Result<NaiveDate, NotParseable> {
    match value {
        Value::Date(d) => Ok(*d),
        Value::DateTime(dt) => Ok(dt.date()),
        Value::Text(s) => parse_date_text(s),
        other => Err(NotParseable(other.to_string())),
    }
}

/// 9999-12-31 23:59:59, the last instant Excel can display.
const MAX_EXCEL_SERIAL: f64 = 2_958_465.999_99;

/// Converts an Excel 1900-system serial into a `Date`, or a `DateTime` when
/// the serial has a time-of-day part.
pub fn excel_serial_to_value(serial: f64) -> Option<Value> {
    if !serial.is_finite() || !(0.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let mut days = serial.floor() as i64;
    let mut secs = ((serial - serial.floor()) * 86_400.0).round() as u32;
    if secs >= 86_400 {
        days += 1;
        secs = 0;
    }
    let date = epoch.checked_add_signed(Duration::try_days(days)?)?;
    if secs == 0 {
        Some(Value::Date(date))
    } else {
        let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)?;
        Some(Value::DateTime(date.and_time(time)))
    }
}

/// Parses a money-ish string: `$`, commas and spaces are ignored and
/// accounting parentheses mean negative.
pub fn parse_amount(s: &str) -> Result<Decimal, NotParseable> {
    let raw = s;
    let s = s.trim();
    let (negative, s) = if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };
    let s = s.replace([',', '$', ' '], "");
    let dec = Decimal::from_str(&s)
        .or_else(|_| Decimal::from_scientific(&s))
        .map_err(|_| NotParseable(raw.to_string()))?;
    Ok(if negative { -dec } else { dec })
}

/// Numeric coercion for a cell: numbers pass, text goes through
/// [`parse_amount`]; anything else is `None`.
pub fn coerce_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Text(s) => parse_amount(s).ok(),
        _ => None,
    }
}

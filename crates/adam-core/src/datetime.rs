//! ISO 8601 date/time handling for SDTM `--DTC` values.
//!
//! SDTM timing variables use the ISO 8601 **extended** format and represent
//! unknown components by right truncation:
//!
//! - `2021` (year), `2021-05` (month), `2021-05-01` (day)
//! - `2021-05-01T14`, `2021-05-01T14:30`, `2021-05-01T14:30:15[.fff]`
//! - `2021---15` (day known, month unknown)
//!
//! Derivations compare dates only when the day is known. Partial values are
//! either excluded ([`complete_date`]) or explicitly imputed ([`impute_date`]).

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

/// Precision of a parsed value, from coarsest to finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DatePrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl DatePrecision {
    pub fn has_complete_date(self) -> bool {
        self >= Self::Day
    }
}

/// A parsed ISO 8601 value keeping only the components that were present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoDateTime {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
}

impl IsoDateTime {
    pub fn precision(&self) -> DatePrecision {
        if self.second.is_some() {
            DatePrecision::Second
        } else if self.minute.is_some() {
            DatePrecision::Minute
        } else if self.hour.is_some() {
            DatePrecision::Hour
        } else if self.day.is_some() && self.month.is_some() {
            DatePrecision::Day
        } else if self.month.is_some() {
            DatePrecision::Month
        } else {
            DatePrecision::Year
        }
    }

    /// The calendar date, when year, month and day are all known.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month?, self.day?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateTimeError {
    #[error("spaces are not allowed in ISO 8601 values")]
    SpacesNotAllowed,
    #[error("ISO 8601 basic format is not allowed; use the extended format")]
    BasicFormat,
    #[error("invalid year component")]
    InvalidYear,
    #[error("invalid month component (must be 01-12)")]
    InvalidMonth,
    #[error("invalid day component")]
    InvalidDay,
    #[error("invalid time component")]
    InvalidTime,
    #[error("invalid timezone designator")]
    InvalidTimezone,
}

/// Outcome of parsing one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateTimeValidation {
    Valid(IsoDateTime),
    Empty,
    Invalid(DateTimeError),
}

impl DateTimeValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn into_value(self) -> Option<IsoDateTime> {
        match self {
            Self::Valid(value) => Some(value),
            _ => None,
        }
    }
}

/// Parses an ISO 8601 extended-format value with right truncation.
///
/// ```
/// use adam_core::datetime::{DatePrecision, parse_iso8601};
///
/// let value = parse_iso8601("2021-05").into_value().unwrap();
/// assert_eq!(value.precision(), DatePrecision::Month);
/// assert!(value.date().is_none());
/// ```
pub fn parse_iso8601(value: &str) -> DateTimeValidation {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "NA" || trimmed == "." {
        return DateTimeValidation::Empty;
    }
    if trimmed.contains(' ') {
        return DateTimeValidation::Invalid(DateTimeError::SpacesNotAllowed);
    }
    let (date_part, time_part) = match trimmed.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (trimmed, None),
    };
    if date_part.len() == 8 && date_part.bytes().all(|b| b.is_ascii_digit()) {
        return DateTimeValidation::Invalid(DateTimeError::BasicFormat);
    }
    let mut parsed = match parse_date_part(date_part) {
        Ok(parsed) => parsed,
        Err(err) => return DateTimeValidation::Invalid(err),
    };
    if let Some(time) = time_part {
        if parsed.day.is_none() || parsed.month.is_none() {
            return DateTimeValidation::Invalid(DateTimeError::InvalidTime);
        }
        if let Err(err) = parse_time_part(time, &mut parsed) {
            return DateTimeValidation::Invalid(err);
        }
    }
    DateTimeValidation::Valid(parsed)
}

fn parse_number(text: &str, width: usize) -> Option<u32> {
    if text.len() != width || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn parse_date_part(date: &str) -> Result<IsoDateTime, DateTimeError> {
    let year = date
        .get(..4)
        .and_then(|text| parse_number(text, 4))
        .ok_or(DateTimeError::InvalidYear)? as i32;
    let rest = &date[4..];
    let (month, day) = if rest.is_empty() {
        (None, None)
    } else if let Some(day) = rest.strip_prefix("---") {
        (None, Some(parse_number(day, 2).ok_or(DateTimeError::InvalidDay)?))
    } else {
        let rest = rest.strip_prefix('-').ok_or(DateTimeError::InvalidMonth)?;
        match rest.split_once('-') {
            None => (
                Some(parse_number(rest, 2).ok_or(DateTimeError::InvalidMonth)?),
                None,
            ),
            Some((month, day)) => (
                Some(parse_number(month, 2).ok_or(DateTimeError::InvalidMonth)?),
                Some(parse_number(day, 2).ok_or(DateTimeError::InvalidDay)?),
            ),
        }
    };
    if let Some(month) = month
        && !(1..=12).contains(&month)
    {
        return Err(DateTimeError::InvalidMonth);
    }
    if let Some(day) = day {
        let max = match month {
            Some(month) => days_in_month(year, month),
            None => 31,
        };
        if day < 1 || day > max {
            return Err(DateTimeError::InvalidDay);
        }
    }
    Ok(IsoDateTime {
        year,
        month,
        day,
        hour: None,
        minute: None,
        second: None,
    })
}

fn strip_timezone(time: &str) -> Result<&str, DateTimeError> {
    if let Some(stripped) = time.strip_suffix('Z') {
        return Ok(stripped);
    }
    if let Some(pos) = time.rfind(['+', '-']) {
        let offset = &time[pos + 1..];
        let valid = match offset.split_once(':') {
            Some((hours, minutes)) => {
                parse_number(hours, 2).is_some_and(|h| h <= 14)
                    && parse_number(minutes, 2).is_some_and(|m| m <= 59)
            }
            None => parse_number(offset, 2).is_some_and(|h| h <= 14),
        };
        if !valid {
            return Err(DateTimeError::InvalidTimezone);
        }
        return Ok(&time[..pos]);
    }
    Ok(time)
}

fn parse_time_part(time: &str, parsed: &mut IsoDateTime) -> Result<(), DateTimeError> {
    let time = strip_timezone(time)?;
    let mut parts = time.split(':');
    let hour = parts
        .next()
        .and_then(|text| parse_number(text, 2))
        .filter(|hour| *hour <= 23)
        .ok_or(DateTimeError::InvalidTime)?;
    parsed.hour = Some(hour);
    if let Some(minute) = parts.next() {
        let minute = parse_number(minute, 2)
            .filter(|minute| *minute <= 59)
            .ok_or(DateTimeError::InvalidTime)?;
        parsed.minute = Some(minute);
    }
    if let Some(second) = parts.next() {
        let whole = second.split_once('.').map_or(second, |(whole, frac)| {
            if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
                ""
            } else {
                whole
            }
        });
        let second = parse_number(whole, 2)
            .filter(|second| *second <= 59)
            .ok_or(DateTimeError::InvalidTime)?;
        parsed.second = Some(second);
    }
    if parts.next().is_some() {
        return Err(DateTimeError::InvalidTime);
    }
    Ok(())
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(31, |last| last.day())
}

/// Returns the calendar date of a value whose year, month and day are known.
///
/// Partial, malformed and missing values yield `None`; callers treat that as
/// "this record does not qualify".
///
/// ```
/// use adam_core::datetime::complete_date;
///
/// assert!(complete_date("2021-05-01T10:30").is_some());
/// assert!(complete_date("2021-05").is_none());
/// assert!(complete_date("not a date").is_none());
/// ```
pub fn complete_date(value: &str) -> Option<NaiveDate> {
    parse_iso8601(&normalize_separator(value))
        .into_value()?
        .date()
}

/// Accepts `YYYY-MM-DD hh:mm:ss` as written by spreadsheet and dataframe
/// exports by swapping the single space for the `T` designator.
fn normalize_separator(value: &str) -> String {
    let trimmed = value.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() > 11 && bytes[10] == b' ' && trimmed[11..].find(' ').is_none() {
        format!("{}T{}", &trimmed[..10], &trimmed[11..])
    } else {
        trimmed.to_string()
    }
}

/// How to fill unknown month/day components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputeMode {
    /// January / first of the month.
    First,
    /// December / last day of the month.
    Last,
}

/// Completes a partial date; a value without a year cannot be imputed.
///
/// ```
/// use chrono::NaiveDate;
/// use adam_core::datetime::{ImputeMode, impute_date};
///
/// assert_eq!(impute_date("2020-02", ImputeMode::Last), NaiveDate::from_ymd_opt(2020, 2, 29));
/// assert_eq!(impute_date("2020", ImputeMode::First), NaiveDate::from_ymd_opt(2020, 1, 1));
/// ```
pub fn impute_date(value: &str, mode: ImputeMode) -> Option<NaiveDate> {
    let parsed = parse_iso8601(&normalize_separator(value)).into_value()?;
    if let Some(date) = parsed.date() {
        return Some(date);
    }
    let month = parsed.month.unwrap_or(match mode {
        ImputeMode::First => 1,
        ImputeMode::Last => 12,
    });
    let day = match (parsed.day, mode) {
        (Some(day), _) => day.min(days_in_month(parsed.year, month)),
        (None, ImputeMode::First) => 1,
        (None, ImputeMode::Last) => days_in_month(parsed.year, month),
    };
    NaiveDate::from_ymd_opt(parsed.year, month, day)
}

/// Formats a date as an ISO 8601 `YYYY-MM-DD` string.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

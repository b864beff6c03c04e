//! Polars `AnyValue` and cell helpers.
//!
//! Source tables arrive with whatever dtypes CSV inference picked, so every
//! consumer reads cells through these helpers instead of matching dtypes.

use polars::prelude::{AnyValue, DataFrame};

/// Converts a Polars `AnyValue` to a `String` representation.
///
/// Returns an empty string for `Null`; floats are printed without trailing
/// zeros so `3.0` and `3` compare equal as text.
///
/// # Examples
///
/// ```
/// use polars::prelude::AnyValue;
/// use adam_common::any_to_string;
///
/// assert_eq!(any_to_string(AnyValue::Null), "");
/// assert_eq!(any_to_string(AnyValue::Int64(7)), "7");
/// assert_eq!(any_to_string(AnyValue::String("MILD")), "MILD");
/// ```
pub fn any_to_string(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Int8(v) => v.to_string(),
        AnyValue::Int16(v) => v.to_string(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt8(v) => v.to_string(),
        AnyValue::UInt16(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        AnyValue::Float64(v) => format_numeric(v),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Boolean(b) => if b { "Y" } else { "N" }.to_string(),
        other => other.to_string(),
    }
}

/// Converts `AnyValue` to `String`, returning `None` for blank or missing values.
pub fn any_to_string_non_empty(value: AnyValue<'_>) -> Option<String> {
    let s = any_to_string(value);
    if is_missing_token(&s) { None } else { Some(s) }
}

/// Formats a floating-point number as a string without trailing zeros.
///
/// ```
/// use adam_common::format_numeric;
///
/// assert_eq!(format_numeric(1.0), "1");
/// assert_eq!(format_numeric(2.50), "2.5");
/// ```
pub fn format_numeric(v: f64) -> String {
    let s = format!("{v}");
    if !s.contains('.') {
        return s;
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Returns true for the tokens exported clinical tables use for "no value".
///
/// Blank cells, R's `NA` and SAS's numeric missing `.` all count.
pub fn is_missing_token(value: &str) -> bool {
    matches!(value.trim(), "" | "NA" | ".")
}

/// Converts an `AnyValue` to `f64`, returning `None` for non-numeric or null values.
pub fn any_to_f64(value: AnyValue<'_>) -> Option<f64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(f64::from(v)),
        AnyValue::Int16(v) => Some(f64::from(v)),
        AnyValue::Int32(v) => Some(f64::from(v)),
        AnyValue::Int64(v) => Some(v as f64),
        AnyValue::UInt8(v) => Some(f64::from(v)),
        AnyValue::UInt16(v) => Some(f64::from(v)),
        AnyValue::UInt32(v) => Some(f64::from(v)),
        AnyValue::UInt64(v) => Some(v as f64),
        AnyValue::Float32(v) => Some(f64::from(v)),
        AnyValue::Float64(v) => Some(v),
        AnyValue::String(s) => parse_f64(s),
        AnyValue::StringOwned(s) => parse_f64(&s),
        _ => None,
    }
}

/// Converts an `AnyValue` to `i64`, returning `None` for non-integer or null values.
///
/// Floats are accepted only when they carry no fractional part, so a
/// sequence number read as `3.0` still resolves to `3`.
pub fn any_to_i64(value: AnyValue<'_>) -> Option<i64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(i64::from(v)),
        AnyValue::Int16(v) => Some(i64::from(v)),
        AnyValue::Int32(v) => Some(i64::from(v)),
        AnyValue::Int64(v) => Some(v),
        AnyValue::UInt8(v) => Some(i64::from(v)),
        AnyValue::UInt16(v) => Some(i64::from(v)),
        AnyValue::UInt32(v) => Some(i64::from(v)),
        AnyValue::UInt64(v) => i64::try_from(v).ok(),
        AnyValue::Float32(v) => whole_f64(f64::from(v)),
        AnyValue::Float64(v) => whole_f64(v),
        AnyValue::String(s) => parse_i64(s),
        AnyValue::StringOwned(s) => parse_i64(&s),
        _ => None,
    }
}

fn whole_f64(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 {
        Some(v as i64)
    } else {
        None
    }
}

/// Parses a string as `f64`, returning `None` for invalid or missing strings.
pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if is_missing_token(trimmed) {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Parses a string as `i64`, returning `None` for invalid or missing strings.
pub fn parse_i64(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if is_missing_token(trimmed) {
        return None;
    }
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(whole_f64))
}

/// Reads one cell as text; a missing column or row yields an empty string.
pub fn cell_string(df: &DataFrame, name: &str, idx: usize) -> String {
    match df.column(name) {
        Ok(column) => any_to_string(column.get(idx).unwrap_or(AnyValue::Null)),
        Err(_) => String::new(),
    }
}

/// Reads one cell as an integer (sequence numbers, doses).
pub fn cell_i64(df: &DataFrame, name: &str, idx: usize) -> Option<i64> {
    let column = df.column(name).ok()?;
    any_to_i64(column.get(idx).unwrap_or(AnyValue::Null))
}

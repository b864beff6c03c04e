//! Shared utilities for the ADaM derivation crates.
//!
//! Cell access and `AnyValue` conversions used by ingestion, the event
//! resolver and the query executor.

pub mod values;

pub use values::{
    any_to_f64, any_to_i64, any_to_string, any_to_string_non_empty, cell_i64, cell_string,
    format_numeric, is_missing_token, parse_f64, parse_i64,
};

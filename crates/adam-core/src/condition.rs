//! Row-level evaluation of [`Condition`]s against Polars DataFrames.

use adam_common::{cell_string, is_missing_token, parse_f64};
use adam_model::{Condition, DeriveError, Result};
use polars::prelude::DataFrame;

use crate::datetime::complete_date;

/// Fails with `MissingColumn` when `df` lacks any of `columns`.
pub fn ensure_columns<'a>(
    df: &DataFrame,
    dataset: &str,
    columns: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    for column in columns {
        if df.column(column).is_err() {
            return Err(DeriveError::MissingColumn {
                dataset: dataset.to_string(),
                column: column.to_string(),
                available: df
                    .get_column_names()
                    .iter()
                    .map(|name| name.to_string())
                    .collect(),
            });
        }
    }
    Ok(())
}

fn text_eq(cell: &str, value: &str) -> bool {
    cell.trim().eq_ignore_ascii_case(value.trim())
}

/// Evaluates `condition` for row `idx`.
///
/// Columns are assumed present; call [`ensure_columns`] first.
pub fn row_matches(condition: &Condition, df: &DataFrame, idx: usize) -> bool {
    match condition {
        Condition::Always => true,
        Condition::NotMissing { column } => !is_missing_token(&cell_string(df, column, idx)),
        Condition::Equals { column, value } => {
            let cell = cell_string(df, column, idx);
            !is_missing_token(&cell) && text_eq(&cell, value)
        }
        Condition::NotEquals { column, value } => {
            let cell = cell_string(df, column, idx);
            !is_missing_token(&cell) && !text_eq(&cell, value)
        }
        Condition::OneOf { column, values } => {
            let cell = cell_string(df, column, idx);
            !is_missing_token(&cell) && values.iter().any(|value| text_eq(&cell, value))
        }
        Condition::Contains { column, value } => {
            let cell = cell_string(df, column, idx);
            !is_missing_token(&cell)
                && cell
                    .to_uppercase()
                    .contains(value.trim().to_uppercase().as_str())
        }
        Condition::GreaterThan { column, threshold } => {
            parse_f64(&cell_string(df, column, idx)).is_some_and(|number| number > *threshold)
        }
        Condition::NumberEquals { column, value } => {
            parse_f64(&cell_string(df, column, idx)).is_some_and(|number| number == *value)
        }
        Condition::CompleteDate { column } => complete_date(&cell_string(df, column, idx)).is_some(),
        Condition::All { conditions } => conditions.iter().all(|c| row_matches(c, df, idx)),
        Condition::Any { conditions } => conditions.iter().any(|c| row_matches(c, df, idx)),
        Condition::Not { condition } => !row_matches(condition, df, idx),
    }
}

/// Row indices of `df` satisfying `condition`, in source order.
pub fn matching_rows(condition: &Condition, df: &DataFrame, dataset: &str) -> Result<Vec<usize>> {
    ensure_columns(df, dataset, condition.columns())?;
    Ok((0..df.height())
        .filter(|idx| row_matches(condition, df, *idx))
        .collect())
}

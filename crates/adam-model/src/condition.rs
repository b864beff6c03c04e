//! Qualifying conditions for event rules.
//!
//! A condition is plain data: it names columns and literal values and is
//! evaluated row by row by the resolver. Rule sets can therefore be written
//! in JSON as well as in code.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Predicate over a single source record.
///
/// Text comparisons trim both sides and ignore ASCII case. A missing cell
/// (blank, `NA` or `.`) never satisfies a value comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    /// Every record qualifies.
    #[default]
    Always,
    /// The cell holds a value.
    NotMissing { column: String },
    /// The cell equals `value`.
    Equals { column: String, value: String },
    /// The cell holds a value different from `value`.
    NotEquals { column: String, value: String },
    /// The cell equals one of `values`.
    OneOf { column: String, values: Vec<String> },
    /// The cell contains `value` as a substring.
    Contains { column: String, value: String },
    /// The cell parses as a number strictly greater than `threshold`.
    GreaterThan { column: String, threshold: f64 },
    /// The cell parses as a number equal to `value`.
    NumberEquals { column: String, value: f64 },
    /// The cell is an ISO 8601 value with year, month and day present.
    CompleteDate { column: String },
    /// All nested conditions hold (true when empty).
    All { conditions: Vec<Condition> },
    /// At least one nested condition holds (false when empty).
    Any { conditions: Vec<Condition> },
    /// The nested condition does not hold.
    Not { condition: Box<Condition> },
}

impl Condition {
    pub fn not_missing(column: impl Into<String>) -> Self {
        Self::NotMissing {
            column: column.into(),
        }
    }

    pub fn equals(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn not_equals(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::NotEquals {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn one_of<I, S>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Contains {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn greater_than(column: impl Into<String>, threshold: f64) -> Self {
        Self::GreaterThan {
            column: column.into(),
            threshold,
        }
    }

    pub fn number_equals(column: impl Into<String>, value: f64) -> Self {
        Self::NumberEquals {
            column: column.into(),
            value,
        }
    }

    pub fn complete_date(column: impl Into<String>) -> Self {
        Self::CompleteDate {
            column: column.into(),
        }
    }

    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self::All {
            conditions: conditions.into_iter().collect(),
        }
    }

    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self::Any {
            conditions: conditions.into_iter().collect(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: Condition) -> Self {
        Self::Not {
            condition: Box::new(condition),
        }
    }

    /// Conjunction that flattens nested `All` nodes.
    pub fn and(self, other: Condition) -> Self {
        let mut conditions = match self {
            Self::All { conditions } => conditions,
            Self::Always => Vec::new(),
            other => vec![other],
        };
        match other {
            Self::All {
                conditions: nested,
            } => conditions.extend(nested),
            Self::Always => {}
            other => conditions.push(other),
        }
        Self::All { conditions }
    }

    /// Every column the condition reads, for up-front schema checks.
    pub fn columns(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::Always => {}
            Self::NotMissing { column }
            | Self::Equals { column, .. }
            | Self::NotEquals { column, .. }
            | Self::OneOf { column, .. }
            | Self::Contains { column, .. }
            | Self::GreaterThan { column, .. }
            | Self::NumberEquals { column, .. }
            | Self::CompleteDate { column } => {
                out.insert(column.as_str());
            }
            Self::All { conditions } | Self::Any { conditions } => {
                for condition in conditions {
                    condition.collect_columns(out);
                }
            }
            Self::Not { condition } => condition.collect_columns(out),
        }
    }
}

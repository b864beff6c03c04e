//! Event rule definitions.
//!
//! An [`EventRule`] describes where a candidate date comes from: the source
//! table, which records qualify, which column carries the date, and how
//! records from the same rule are ordered among themselves. Rules are
//! immutable descriptors; their position in a rule list is their `event_nr`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::error::{DeriveError, Result};

/// Where a rule reads its records from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventSource {
    /// A named input table (e.g. `VS`, `AE`).
    Dataset { name: String },
    /// The dataset under construction, as derived so far.
    Snapshot,
}

impl EventSource {
    pub fn dataset(name: impl Into<String>) -> Self {
        Self::Dataset { name: name.into() }
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self, Self::Snapshot)
    }

    /// Display label used in logs and errors.
    pub fn label(&self) -> &str {
        match self {
            Self::Dataset { name } => name,
            Self::Snapshot => "snapshot",
        }
    }
}

/// Traceability attached to a resolved value.
///
/// Mirrors the ADaM `--DOM` / `--SEQ` / `--VAR` triple: the domain the date
/// came from, the column holding the record's sequence number, and the
/// variable the date was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub domain: String,
    pub seq_column: Option<String>,
    pub variable: String,
}

impl Provenance {
    pub fn new(domain: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            seq_column: None,
            variable: variable.into(),
        }
    }

    pub fn with_seq_column(mut self, column: impl Into<String>) -> Self {
        self.seq_column = Some(column.into());
        self
    }
}

/// One candidate-event definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRule {
    /// Stable identifier reported alongside the resolved value.
    pub id: String,
    pub source: EventSource,
    /// Records failing this predicate never become candidates.
    #[serde(default)]
    pub condition: Condition,
    /// Column holding the ISO 8601 date that becomes the output value.
    pub date_column: String,
    /// Secondary key columns, compared only between records of this rule.
    #[serde(default)]
    pub order: Vec<String>,
    pub provenance: Provenance,
}

impl EventRule {
    /// Creates a rule with no condition, no secondary order, and provenance
    /// pointing at the source and date column.
    pub fn new(id: impl Into<String>, source: EventSource, date_column: impl Into<String>) -> Self {
        let date_column = date_column.into();
        let domain = match &source {
            EventSource::Dataset { name } => name.to_uppercase(),
            EventSource::Snapshot => "SNAPSHOT".to_string(),
        };
        Self {
            id: id.into(),
            provenance: Provenance::new(domain, date_column.clone()),
            source,
            condition: Condition::Always,
            date_column,
            order: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_order<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Every column this rule reads from its source, besides the subject key.
    pub fn required_columns(&self) -> BTreeSet<&str> {
        let mut columns = self.condition.columns();
        columns.insert(self.date_column.as_str());
        for column in &self.order {
            columns.insert(column.as_str());
        }
        if let Some(seq) = &self.provenance.seq_column {
            columns.insert(seq.as_str());
        }
        columns
    }
}

/// Checks that rule ids are unique, so provenance stays unambiguous.
pub fn validate_rules(rules: &[EventRule]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for rule in rules {
        if !seen.insert(rule.id.as_str()) {
            return Err(DeriveError::DuplicateRule(rule.id.clone()));
        }
    }
    Ok(())
}

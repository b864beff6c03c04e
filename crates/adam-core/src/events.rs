//! Extreme-event resolution across several source tables.
//!
//! Each [`EventRule`] contributes candidate dates per subject; the resolver
//! pools the candidates of all rules and keeps, per subject, the earliest
//! ([`Selection::First`]) or latest ([`Selection::Last`]) one.
//!
//! Ranking of two candidates for the same subject:
//!
//! 1. the date, in the selection direction;
//! 2. on equal dates, the rule declared earlier (lower `event_nr`) wins,
//!    whatever the selection;
//! 3. within one rule, the rule's `order` columns in the selection
//!    direction, then the row position.
//!
//! Records whose date is missing, partial or malformed are dropped from
//! their rule and counted in [`RuleStats`]; they never fail the call.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use adam_common::{cell_i64, cell_string, is_missing_token, parse_f64};
use adam_model::{
    DeriveError, EventRule, EventSource, KeyColumns, Result, Selection, SubjectKey,
    validate_rules,
};
use chrono::NaiveDate;
use polars::prelude::{DataFrame, IntoColumn, NamedFrom, PolarsError, Series};
use serde::Serialize;
use tracing::{debug, info_span};

use crate::condition::{ensure_columns, row_matches};
use crate::datetime::{complete_date, format_date};

pub(crate) fn frame_error(err: PolarsError) -> DeriveError {
    DeriveError::Frame(err.to_string())
}

/// Named input tables plus an optional snapshot of the dataset being built.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    datasets: BTreeMap<String, DataFrame>,
    snapshot: Option<DataFrame>,
    keys: KeyColumns,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dataset; names are matched case-insensitively.
    pub fn with_dataset(mut self, name: impl AsRef<str>, df: DataFrame) -> Self {
        self.insert(name, df);
        self
    }

    pub fn insert(&mut self, name: impl AsRef<str>, df: DataFrame) {
        self.datasets.insert(name.as_ref().to_uppercase(), df);
    }

    pub fn with_snapshot(mut self, df: DataFrame) -> Self {
        self.snapshot = Some(df);
        self
    }

    pub fn set_snapshot(&mut self, df: DataFrame) {
        self.snapshot = Some(df);
    }

    pub fn with_keys(mut self, keys: KeyColumns) -> Self {
        self.keys = keys;
        self
    }

    pub fn keys(&self) -> &KeyColumns {
        &self.keys
    }

    pub fn dataset(&self, name: &str) -> Option<&DataFrame> {
        self.datasets.get(&name.to_uppercase())
    }

    pub fn snapshot(&self) -> Option<&DataFrame> {
        self.snapshot.as_ref()
    }

    fn frame_for(&self, rule: &EventRule) -> Result<&DataFrame> {
        match &rule.source {
            EventSource::Dataset { name } => {
                self.dataset(name).ok_or_else(|| DeriveError::UnknownDataset {
                    rule: rule.id.clone(),
                    dataset: name.clone(),
                })
            }
            EventSource::Snapshot => self.snapshot().ok_or_else(|| DeriveError::MissingSnapshot {
                rule: rule.id.clone(),
            }),
        }
    }
}

/// The winning candidate for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEvent {
    pub date: NaiveDate,
    /// 1-based position of the contributing rule.
    pub event_nr: usize,
    pub rule_id: String,
    pub domain: String,
    pub seq: Option<i64>,
    pub variable: String,
}

/// Per-rule accounting of how many records survived each step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleStats {
    pub rule_id: String,
    pub event_nr: usize,
    pub source_rows: usize,
    pub qualified: usize,
    /// Qualifying records dropped for a missing, partial or malformed date.
    pub unusable_dates: usize,
    /// Qualifying records dropped for a blank subject identifier.
    pub blank_subjects: usize,
    pub candidates: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum SortValue {
    Missing,
    Number(f64),
    Text(String),
}

impl SortValue {
    fn parse(cell: &str) -> Self {
        if is_missing_token(cell) {
            Self::Missing
        } else if let Some(number) = parse_f64(cell) {
            Self::Number(number)
        } else {
            Self::Text(cell.trim().to_string())
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Missing => 0,
            Self::Number(_) => 1,
            Self::Text(_) => 2,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    date: NaiveDate,
    event_nr: usize,
    order: Vec<SortValue>,
    row: usize,
    seq: Option<i64>,
}

fn compare_order(a: &[SortValue], b: &[SortValue]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.compare(y))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// `Greater` when `a` should be selected over `b`.
fn preference(a: &Candidate, b: &Candidate, mode: Selection) -> Ordering {
    let directed = |ord: Ordering| match mode {
        Selection::Last => ord,
        Selection::First => ord.reverse(),
    };
    directed(a.date.cmp(&b.date))
        .then_with(|| b.event_nr.cmp(&a.event_nr))
        .then_with(|| directed(compare_order(&a.order, &b.order)))
        .then_with(|| directed(a.row.cmp(&b.row)))
}

fn subject_key(df: &DataFrame, keys: &KeyColumns, idx: usize) -> SubjectKey {
    SubjectKey::new(
        cell_string(df, &keys.study, idx).trim(),
        cell_string(df, &keys.subject, idx).trim(),
    )
}

fn collect_candidates(
    rule: &EventRule,
    event_nr: usize,
    df: &DataFrame,
    keys: &KeyColumns,
    pool: &mut BTreeMap<SubjectKey, Candidate>,
    mode: Selection,
) -> Result<RuleStats> {
    let label = rule.source.label();
    ensure_columns(df, label, keys.as_slice())?;
    ensure_columns(df, label, rule.required_columns())?;

    let mut stats = RuleStats {
        rule_id: rule.id.clone(),
        event_nr,
        source_rows: df.height(),
        ..RuleStats::default()
    };
    for idx in 0..df.height() {
        if !row_matches(&rule.condition, df, idx) {
            continue;
        }
        stats.qualified += 1;
        let Some(date) = complete_date(&cell_string(df, &rule.date_column, idx)) else {
            stats.unusable_dates += 1;
            continue;
        };
        let subject = subject_key(df, keys, idx);
        if subject.is_blank() {
            stats.blank_subjects += 1;
            continue;
        }
        stats.candidates += 1;
        let candidate = Candidate {
            date,
            event_nr,
            order: rule
                .order
                .iter()
                .map(|column| SortValue::parse(&cell_string(df, column, idx)))
                .collect(),
            row: idx,
            seq: rule
                .provenance
                .seq_column
                .as_deref()
                .and_then(|column| cell_i64(df, column, idx)),
        };
        match pool.get_mut(&subject) {
            Some(current) => {
                if preference(&candidate, current, mode).is_gt() {
                    *current = candidate;
                }
            }
            None => {
                pool.insert(subject, candidate);
            }
        }
    }
    debug!(
        rule = %rule.id,
        event_nr,
        source = label,
        source_rows = stats.source_rows,
        qualified = stats.qualified,
        unusable_dates = stats.unusable_dates,
        candidates = stats.candidates,
        "evaluated event rule"
    );
    Ok(stats)
}

/// Selects, per subject, the extreme qualifying date across all `rules`.
///
/// Rules reading named datasets are evaluated before rules reading the
/// snapshot; the result does not depend on that order because ranking only
/// uses `event_nr`. An empty rule list yields an empty result.
///
/// # Errors
///
/// Configuration problems only: duplicate rule ids, an unknown dataset, a
/// snapshot rule without a snapshot, or a referenced column that does not
/// exist.
pub fn resolve(sources: &SourceSet, rules: &[EventRule], mode: Selection) -> Result<ResolvedEvents> {
    let span = info_span!("resolve_events", rules = rules.len(), mode = %mode);
    let _guard = span.enter();
    validate_rules(rules)?;

    let ordered = rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| !rule.source.is_snapshot())
        .chain(rules.iter().enumerate().filter(|(_, rule)| rule.source.is_snapshot()));

    let mut pool: BTreeMap<SubjectKey, Candidate> = BTreeMap::new();
    let mut stats = Vec::with_capacity(rules.len());
    for (position, rule) in ordered {
        let df = sources.frame_for(rule)?;
        stats.push(collect_candidates(
            rule,
            position + 1,
            df,
            sources.keys(),
            &mut pool,
            mode,
        )?);
    }
    stats.sort_by_key(|s| s.event_nr);

    let values = pool
        .into_iter()
        .map(|(subject, candidate)| {
            let rule = &rules[candidate.event_nr - 1];
            let event = ResolvedEvent {
                date: candidate.date,
                event_nr: candidate.event_nr,
                rule_id: rule.id.clone(),
                domain: rule.provenance.domain.clone(),
                seq: candidate.seq,
                variable: rule.provenance.variable.clone(),
            };
            (subject, event)
        })
        .collect::<BTreeMap<_, _>>();
    debug!(subjects = values.len(), "resolved events");

    Ok(ResolvedEvents {
        mode,
        keys: sources.keys().clone(),
        values,
        stats,
    })
}

/// Output column names for merging resolved values onto a roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumns {
    pub date: String,
    pub domain: Option<String>,
    pub seq: Option<String>,
    pub variable: Option<String>,
}

impl OutputColumns {
    /// Only the date column, no traceability variables.
    pub fn date_only(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            domain: None,
            seq: None,
            variable: None,
        }
    }

    /// Date column plus `<prefix>DOM`, `<prefix>SEQ` and `<prefix>VAR`.
    pub fn with_traceability(date: impl Into<String>, prefix: &str) -> Self {
        Self {
            date: date.into(),
            domain: Some(format!("{prefix}DOM")),
            seq: Some(format!("{prefix}SEQ")),
            variable: Some(format!("{prefix}VAR")),
        }
    }
}

/// Result of one resolution: at most one event per subject.
#[derive(Debug, Clone)]
pub struct ResolvedEvents {
    pub mode: Selection,
    keys: KeyColumns,
    values: BTreeMap<SubjectKey, ResolvedEvent>,
    pub stats: Vec<RuleStats>,
}

impl ResolvedEvents {
    pub fn get(&self, subject: &SubjectKey) -> Option<&ResolvedEvent> {
        self.values.get(subject)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Subjects in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&SubjectKey, &ResolvedEvent)> {
        self.values.iter()
    }

    /// Count of resolved subjects per contributing rule id.
    pub fn counts_by_rule(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for event in self.values.values() {
            *counts.entry(event.rule_id.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// One row per resolved subject: key columns, then the output columns.
    pub fn to_frame(&self, columns: &OutputColumns) -> Result<DataFrame> {
        let studies: Vec<&str> = self.values.keys().map(|k| k.study_id.as_str()).collect();
        let subjects: Vec<&str> = self.values.keys().map(|k| k.usubjid.as_str()).collect();
        let events: Vec<Option<&ResolvedEvent>> = self.values.values().map(Some).collect();
        let mut frame = DataFrame::new(vec![
            Series::new(self.keys.study.as_str().into(), studies).into_column(),
            Series::new(self.keys.subject.as_str().into(), subjects).into_column(),
        ])
        .map_err(frame_error)?;
        add_event_columns(&mut frame, &events, columns)?;
        Ok(frame)
    }

    /// Left-merges the resolved values onto `roster`.
    ///
    /// Every roster row is kept in order; subjects without a resolved event
    /// get nulls. Existing output columns are replaced, so re-running a
    /// derivation on its own output is stable.
    pub fn merge_onto(&self, roster: &DataFrame, columns: &OutputColumns) -> Result<DataFrame> {
        ensure_columns(roster, "roster", self.keys.as_slice())?;
        let events: Vec<Option<&ResolvedEvent>> = (0..roster.height())
            .map(|idx| self.values.get(&subject_key(roster, &self.keys, idx)))
            .collect();
        let mut merged = roster.clone();
        add_event_columns(&mut merged, &events, columns)?;
        Ok(merged)
    }
}

fn add_event_columns(
    frame: &mut DataFrame,
    events: &[Option<&ResolvedEvent>],
    columns: &OutputColumns,
) -> Result<()> {
    let dates: Vec<Option<String>> = events
        .iter()
        .map(|event| event.map(|e| format_date(e.date)))
        .collect();
    frame
        .with_column(Series::new(columns.date.as_str().into(), dates))
        .map_err(frame_error)?;
    if let Some(name) = &columns.domain {
        let values: Vec<Option<String>> =
            events.iter().map(|e| e.map(|e| e.domain.clone())).collect();
        frame
            .with_column(Series::new(name.as_str().into(), values))
            .map_err(frame_error)?;
    }
    if let Some(name) = &columns.seq {
        let values: Vec<Option<i64>> = events.iter().map(|e| e.and_then(|e| e.seq)).collect();
        frame
            .with_column(Series::new(name.as_str().into(), values))
            .map_err(frame_error)?;
    }
    if let Some(name) = &columns.variable {
        let values: Vec<Option<String>> = events
            .iter()
            .map(|e| e.map(|e| e.variable.clone()))
            .collect();
        frame
            .with_column(Series::new(name.as_str().into(), values))
            .map_err(frame_error)?;
    }
    Ok(())
}

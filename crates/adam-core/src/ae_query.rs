//! Natural-language lookups over an AE dataset.
//!
//! A question is mapped to a single `(column, value, match type)` filter by
//! matching its words against the AE column catalogue, then the filter runs
//! against the AE frame and reports the distinct subjects it hit.

use std::collections::HashSet;

use adam_common::{cell_string, is_missing_token};
use adam_model::{AeSchema, DeriveError, Result};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::condition::ensure_columns;

const SUBJECT_COLUMN: &str = "USUBJID";
const SAMPLE_ROWS: usize = 5;

/// Words that never carry the searched value.
const FILLER_WORDS: &[&str] = &[
    "a", "adverse", "all", "an", "and", "any", "are", "did", "do", "event", "events", "experience",
    "experienced", "experiencing", "find", "for", "from", "had", "has", "have", "how", "in", "is",
    "list", "many", "me", "number", "of", "on", "or", "participants", "patient", "patients",
    "reported", "reporting", "show", "study", "subject", "subjects", "suffered", "the", "there",
    "those", "were", "what", "which", "who", "with",
];

/// Causality grades recorded in `AEREL`.
const CAUSALITY_VALUES: &[&str] = &["PROBABLE", "POSSIBLE", "REMOTE", "NONE"];

/// Filler words kept inside a class name such as "blood and lymphatic system".
const SOC_CONNECTORS: &[&str] = &["and", "of"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Whole-cell equality, ignoring case.
    Exact,
    /// Substring match, ignoring case.
    Contains,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Contains => "contains",
        }
    }
}

/// A single-column filter derived from a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AeQuery {
    pub target_column: String,
    pub filter_value: String,
    pub match_type: MatchType,
    pub reasoning: String,
}

impl AeQuery {
    pub fn new(
        target_column: impl Into<String>,
        filter_value: impl Into<String>,
        match_type: MatchType,
    ) -> Self {
        Self {
            target_column: target_column.into(),
            filter_value: filter_value.into(),
            match_type,
            reasoning: String::new(),
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    fn matches(&self, cell: &str) -> bool {
        if is_missing_token(cell) {
            return false;
        }
        let cell = cell.trim().to_uppercase();
        let value = self.filter_value.trim().to_uppercase();
        match self.match_type {
            MatchType::Exact => cell == value,
            MatchType::Contains => cell.contains(value.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AeQueryResult {
    pub unique_subject_count: usize,
    /// Distinct subjects in first-seen order.
    pub subject_ids: Vec<String>,
    pub total_records: usize,
    /// First matching records, all columns, missing cells as `null`.
    #[serde(rename = "sample_data")]
    pub sample: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AeQueryResponse {
    pub question: String,
    pub parsed_query: AeQuery,
    pub results: AeQueryResult,
}

fn words(question: &str) -> Vec<String> {
    question
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn phrase_in(question: &str, words: &[String], phrase: &str) -> bool {
    let phrase = phrase.to_lowercase();
    if phrase.contains(' ') {
        question.contains(phrase.as_str())
    } else {
        words.iter().any(|word| *word == phrase)
    }
}

fn content_words<'a>(words: &'a [String], also_skip: &[&str]) -> Vec<&'a str> {
    words
        .iter()
        .map(String::as_str)
        .filter(|word| !FILLER_WORDS.contains(word) && !also_skip.contains(word))
        .collect()
}

fn closed_value_query(schema: &AeSchema, words: &[String]) -> Option<AeQuery> {
    let has_word = |value: &str| words.iter().any(|word| word.eq_ignore_ascii_case(value));
    let catalogued = schema
        .columns
        .iter()
        .filter(|column| column.name != "AESER")
        .find_map(|column| {
            let value = column
                .values
                .iter()
                .find(|value| value.len() > 1 && has_word(**value))?;
            Some(
                AeQuery::new(column.name, *value, MatchType::Exact).with_reasoning(format!(
                    "`{}` is a valid {} value",
                    value.to_lowercase(),
                    column.label.to_lowercase()
                )),
            )
        });
    catalogued.or_else(|| {
        let column = schema.column("AEREL")?;
        let value = CAUSALITY_VALUES.iter().find(|value| has_word(**value))?;
        Some(
            AeQuery::new(column.name, *value, MatchType::Exact).with_reasoning(format!(
                "`{}` is a causality grade",
                value.to_lowercase()
            )),
        )
    })
}

fn serious_query(schema: &AeSchema, question: &str, words: &[String]) -> Option<AeQuery> {
    let column = schema.column("AESER")?;
    let phrase = column
        .use_for
        .iter()
        .find(|phrase| phrase_in(question, words, phrase))?;
    let negated = question.contains("non-serious")
        || question.contains("not serious")
        || question.contains("nonserious");
    let value = if negated { "N" } else { "Y" };
    Some(
        AeQuery::new(column.name, value, MatchType::Exact)
            .with_reasoning(format!("`{phrase}` refers to the serious event flag")),
    )
}

/// The class name written before "disorder(s)", e.g. "nervous system" or
/// "skin and subcutaneous tissue".
fn soc_qualifier(words: &[String]) -> Option<String> {
    let end = words.iter().position(|word| word.starts_with("disorder"))?;
    let is_filler = |at: usize| FILLER_WORDS.contains(&words[at].as_str());
    let mut start = end;
    while start > 0 {
        let prev = start - 1;
        let joins_class_name = SOC_CONNECTORS.contains(&words[prev].as_str())
            && start < end
            && prev > 0
            && !is_filler(prev - 1);
        if is_filler(prev) && !joins_class_name {
            break;
        }
        start = prev;
    }
    (start < end).then(|| words[start..end].join(" "))
}

fn body_system_query(schema: &AeSchema, question: &str, words: &[String]) -> Option<AeQuery> {
    let column = schema.column("AESOC")?;
    let phrase = column
        .use_for
        .iter()
        .copied()
        .find(|phrase| phrase_in(question, words, phrase))
        .or_else(|| {
            words
                .iter()
                .any(|word| word.starts_with("disorder"))
                .then_some("disorders")
        })?;
    let phrase_words: Vec<String> = column
        .use_for
        .iter()
        .flat_map(|phrase| phrase.split(' '))
        .chain(["disorder", "disorders", "class"])
        .map(str::to_lowercase)
        .collect();
    let phrase_words: Vec<&str> = phrase_words.iter().map(String::as_str).collect();
    let value = soc_qualifier(words)
        .unwrap_or_else(|| content_words(words, &phrase_words).join(" "));
    if value.is_empty() {
        return None;
    }
    Some(
        AeQuery::new(column.name, value.to_uppercase(), MatchType::Contains)
            .with_reasoning(format!("`{phrase}` refers to the system organ class")),
    )
}

fn term_query(words: &[String]) -> Option<AeQuery> {
    let value = content_words(words, &[]).join(" ");
    if value.is_empty() {
        return None;
    }
    Some(
        AeQuery::new("AETERM", value.to_uppercase(), MatchType::Contains)
            .with_reasoning("no categorical column matched; searching the reported term"),
    )
}

/// Maps a free-text question onto a single AE filter.
///
/// Checked in order: closed value sets (severity, causality), the serious
/// flag, body-system phrases, then the remaining words against `AETERM`.
/// Returns `None` when the question has no searchable words left.
///
/// ```
/// use adam_core::ae_query::{MatchType, parse_question};
/// use adam_model::AE_SCHEMA;
///
/// let query = parse_question("How many patients had severe adverse events?", &AE_SCHEMA).unwrap();
/// assert_eq!(query.target_column, "AESEV");
/// assert_eq!(query.filter_value, "SEVERE");
/// assert_eq!(query.match_type, MatchType::Exact);
/// ```
pub fn parse_question(question: &str, schema: &AeSchema) -> Option<AeQuery> {
    let lowered = question.to_lowercase();
    let words = words(question);
    let query = closed_value_query(schema, &words)
        .or_else(|| serious_query(schema, &lowered, &words))
        .or_else(|| body_system_query(schema, &lowered, &words))
        .or_else(|| term_query(&words));
    if let Some(query) = &query {
        debug!(
            column = %query.target_column,
            value = %query.filter_value,
            match_type = query.match_type.as_str(),
            "parsed AE question"
        );
    }
    query
}

fn sample_row(ae: &DataFrame, idx: usize) -> Map<String, Value> {
    ae.get_column_names()
        .iter()
        .map(|name| {
            let cell = cell_string(ae, name, idx);
            let value = if is_missing_token(&cell) {
                Value::Null
            } else {
                Value::String(cell)
            };
            (name.to_string(), value)
        })
        .collect()
}

/// Runs `query` against an AE frame.
pub fn execute_query(ae: &DataFrame, query: &AeQuery) -> Result<AeQueryResult> {
    ensure_columns(
        ae,
        "AE",
        [query.target_column.as_str(), SUBJECT_COLUMN],
    )?;
    let mut seen = HashSet::new();
    let mut subject_ids = Vec::new();
    let mut sample = Vec::new();
    let mut total_records = 0;
    for idx in 0..ae.height() {
        if !query.matches(&cell_string(ae, &query.target_column, idx)) {
            continue;
        }
        total_records += 1;
        let subject = cell_string(ae, SUBJECT_COLUMN, idx).trim().to_string();
        if !is_missing_token(&subject) && seen.insert(subject.clone()) {
            subject_ids.push(subject);
        }
        if sample.len() < SAMPLE_ROWS {
            sample.push(sample_row(ae, idx));
        }
    }
    Ok(AeQueryResult {
        unique_subject_count: subject_ids.len(),
        subject_ids,
        total_records,
        sample,
    })
}

/// Parses `question` and runs it against `ae`.
pub fn ask(question: &str, ae: &DataFrame, schema: &AeSchema) -> Result<AeQueryResponse> {
    let parsed_query = parse_question(question, schema)
        .ok_or_else(|| DeriveError::UnmappedQuestion(question.to_string()))?;
    let results = execute_query(ae, &parsed_query)?;
    Ok(AeQueryResponse {
        question: question.to_string(),
        parsed_query,
        results,
    })
}

#[cfg(test)]
mod tests {
    use adam_model::AE_SCHEMA;

    use super::*;

    fn parse(question: &str) -> AeQuery {
        parse_question(question, &AE_SCHEMA).unwrap()
    }

    #[test]
    fn severity_words_map_to_exact_aesev() {
        let query = parse("Any MILD events?");
        assert_eq!(query.target_column, "AESEV");
        assert_eq!(query.filter_value, "MILD");
        assert_eq!(query.match_type, MatchType::Exact);
    }

    #[test]
    fn serious_phrases_map_to_aeser() {
        assert_eq!(parse("List subjects with an SAE").filter_value, "Y");
        let query = parse("How many non-serious events were reported?");
        assert_eq!(query.target_column, "AESER");
        assert_eq!(query.filter_value, "N");
    }

    #[test]
    fn disorders_map_to_soc_contains() {
        let query = parse("Show me subjects with cardiac disorders");
        assert_eq!(query.target_column, "AESOC");
        assert_eq!(query.filter_value, "CARDIAC");
        assert_eq!(query.match_type, MatchType::Contains);
    }

    #[test]
    fn multi_word_class_names_are_kept_whole() {
        let query = parse("Show me subjects with nervous system disorders");
        assert_eq!(query.filter_value, "NERVOUS SYSTEM");
        let query = parse("Which patients had skin and subcutaneous tissue disorders?");
        assert_eq!(query.filter_value, "SKIN AND SUBCUTANEOUS TISSUE");
        let query = parse("Any infections and infestations disorders?");
        assert_eq!(query.filter_value, "INFECTIONS AND INFESTATIONS");
    }

    #[test]
    fn causality_grades_map_to_exact_aerel() {
        let query = parse("Which subjects had events with possible relationship?");
        assert_eq!(query.target_column, "AEREL");
        assert_eq!(query.filter_value, "POSSIBLE");
        assert_eq!(query.match_type, MatchType::Exact);
    }

    #[test]
    fn free_text_falls_back_to_term() {
        let query = parse("Which patients experienced headache?");
        assert_eq!(query.target_column, "AETERM");
        assert_eq!(query.filter_value, "HEADACHE");
        assert_eq!(query.match_type, MatchType::Contains);
    }

    #[test]
    fn filler_only_question_is_unmapped() {
        assert!(parse_question("How many patients?", &AE_SCHEMA).is_none());
    }

    #[test]
    fn matching_ignores_case_and_missing_cells() {
        let exact = AeQuery::new("AESEV", "severe", MatchType::Exact);
        assert!(exact.matches("SEVERE"));
        assert!(!exact.matches("SEVERE PAIN"));
        assert!(!exact.matches("NA"));
        let contains = AeQuery::new("AETERM", "head", MatchType::Contains);
        assert!(contains.matches("Headache"));
        assert!(!contains.matches(""));
    }
}

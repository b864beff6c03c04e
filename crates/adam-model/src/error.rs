use thiserror::Error;

/// Errors raised while configuring or running a derivation.
///
/// Bad cell values never surface here; they only drop the affected record.
#[derive(Debug, Error)]
pub enum DeriveError {
    #[error("rule `{rule}` references unknown dataset `{dataset}`")]
    UnknownDataset { rule: String, dataset: String },

    #[error("rule `{rule}` reads the output snapshot but none was provided")]
    MissingSnapshot { rule: String },

    #[error("column `{column}` not found in {dataset} (available: {})", available.join(", "))]
    MissingColumn {
        dataset: String,
        column: String,
        available: Vec<String>,
    },

    #[error("invalid selection mode `{0}` (expected `first` or `last`)")]
    InvalidSelection(String),

    #[error("duplicate rule id `{0}`")]
    DuplicateRule(String),

    #[error("could not map question to an AE column: {0}")]
    UnmappedQuestion(String),

    #[error("dataframe error: {0}")]
    Frame(String),
}

pub type Result<T> = std::result::Result<T, DeriveError>;

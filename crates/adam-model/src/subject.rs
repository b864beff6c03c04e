use std::fmt;

use serde::{Deserialize, Serialize};

/// Composite identity of a trial participant.
///
/// Ordering is by study, then subject, which keeps derived outputs in a
/// stable roster-independent order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectKey {
    pub study_id: String,
    pub usubjid: String,
}

impl SubjectKey {
    pub fn new(study_id: impl Into<String>, usubjid: impl Into<String>) -> Self {
        Self {
            study_id: study_id.into(),
            usubjid: usubjid.into(),
        }
    }

    /// A key is usable only when the subject identifier is present.
    pub fn is_blank(&self) -> bool {
        self.usubjid.trim().is_empty()
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.study_id, self.usubjid)
    }
}

/// Column names that make up the subject key in every source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyColumns {
    pub study: String,
    pub subject: String,
}

impl Default for KeyColumns {
    fn default() -> Self {
        Self {
            study: "STUDYID".to_string(),
            subject: "USUBJID".to_string(),
        }
    }
}

impl KeyColumns {
    pub fn as_slice(&self) -> [&str; 2] {
        [self.study.as_str(), self.subject.as_str()]
    }
}

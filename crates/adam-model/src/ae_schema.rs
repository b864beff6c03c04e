//! Column catalogue for the adverse-event (AE) domain.
//!
//! Each entry carries the phrases a reader typically uses when asking about
//! the column ("how severe", "body system", ...). The AE query parser matches
//! questions against these phrases.

use std::fmt::Write as _;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AeValueType {
    String,
    Datetime,
    Integer,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AeColumn {
    pub name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub value_type: AeValueType,
    /// Closed value set, empty for free text.
    pub values: &'static [&'static str],
    pub use_for: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AeSchema {
    pub dataset_name: &'static str,
    pub description: &'static str,
    pub columns: &'static [AeColumn],
}

impl AeSchema {
    pub fn column(&self, name: &str) -> Option<&AeColumn> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    /// Plain-text rendering of the catalogue, one block per column.
    pub fn describe(&self) -> String {
        let mut out = format!("{} DATASET SCHEMA:\n\n", self.dataset_name.to_uppercase());
        for column in self.columns {
            let _ = writeln!(out, "Column: {}", column.name);
            let _ = writeln!(out, "  Label: {}", column.label);
            let _ = writeln!(out, "  Description: {}", column.description);
            if !column.values.is_empty() {
                let _ = writeln!(out, "  Valid Values: {}", column.values.join(", "));
            }
            let _ = writeln!(
                out,
                "  Use for questions about: {}\n",
                column.use_for.join(", ")
            );
        }
        out
    }
}

pub const AE_SCHEMA: AeSchema = AeSchema {
    dataset_name: "Adverse Events (AE)",
    description: "Contains adverse event records from clinical trials",
    columns: &[
        AeColumn {
            name: "USUBJID",
            label: "Unique Subject Identifier",
            description: "Unique identifier for each patient/subject in the study",
            value_type: AeValueType::String,
            values: &[],
            use_for: &["subject identification", "patient ID", "participant"],
        },
        AeColumn {
            name: "AETERM",
            label: "Reported Term for the Adverse Event",
            description:
                "The verbatim term used to identify the adverse event, specific condition or symptom",
            value_type: AeValueType::String,
            values: &[],
            use_for: &[
                "specific condition",
                "symptom",
                "adverse event name",
                "what happened",
                "condition name",
                "event term",
            ],
        },
        AeColumn {
            name: "AEDECOD",
            label: "Dictionary-Derived Term",
            description: "Standardized/coded term for the adverse event from MedDRA dictionary",
            value_type: AeValueType::String,
            values: &[],
            use_for: &["coded term", "standard term", "MedDRA term", "preferred term"],
        },
        AeColumn {
            name: "AESOC",
            label: "Primary System Organ Class",
            description:
                "The body system or organ class affected (e.g., CARDIAC DISORDERS, NERVOUS SYSTEM DISORDERS)",
            value_type: AeValueType::String,
            values: &[],
            use_for: &[
                "body system",
                "organ class",
                "system organ class",
                "SOC",
                "organ",
                "body part",
                "system",
            ],
        },
        AeColumn {
            name: "AEBODSYS",
            label: "Body System or Organ Class",
            description: "Body system affected by the adverse event",
            value_type: AeValueType::String,
            values: &[],
            use_for: &["body system", "organ system"],
        },
        AeColumn {
            name: "AESEV",
            label: "Severity/Intensity",
            description: "The severity or intensity of the adverse event (MILD, MODERATE, SEVERE)",
            value_type: AeValueType::String,
            values: &["MILD", "MODERATE", "SEVERE"],
            use_for: &[
                "severity",
                "intensity",
                "how severe",
                "how bad",
                "seriousness level",
                "grade",
            ],
        },
        AeColumn {
            name: "AESER",
            label: "Serious Event",
            description: "Whether the adverse event is serious (Y/N)",
            value_type: AeValueType::String,
            values: &["Y", "N"],
            use_for: &["serious", "SAE", "serious adverse event"],
        },
        AeColumn {
            name: "AEREL",
            label: "Causality/Relationship to Treatment",
            description:
                "Relationship of adverse event to study treatment (PROBABLE, POSSIBLE, REMOTE, NONE)",
            value_type: AeValueType::String,
            values: &[],
            use_for: &[
                "related",
                "causality",
                "relationship",
                "drug related",
                "treatment related",
                "caused by",
            ],
        },
        AeColumn {
            name: "AEOUT",
            label: "Outcome of Adverse Event",
            description: "The outcome/resolution of the adverse event",
            value_type: AeValueType::String,
            values: &[],
            use_for: &["outcome", "resolved", "resolution", "result", "recovered"],
        },
        AeColumn {
            name: "AEACN",
            label: "Action Taken with Study Treatment",
            description: "Action taken with study treatment due to the adverse event",
            value_type: AeValueType::String,
            values: &[],
            use_for: &["action taken", "treatment action", "drug action", "dose action"],
        },
        AeColumn {
            name: "AESTDTC",
            label: "Start Date/Time of Adverse Event",
            description: "When the adverse event started",
            value_type: AeValueType::Datetime,
            values: &[],
            use_for: &["start date", "onset date", "when started", "beginning"],
        },
        AeColumn {
            name: "AEENDTC",
            label: "End Date/Time of Adverse Event",
            description: "When the adverse event ended/resolved",
            value_type: AeValueType::Datetime,
            values: &[],
            use_for: &["end date", "resolution date", "when ended", "when resolved"],
        },
        AeColumn {
            name: "AESTDY",
            label: "Study Day of Start of Adverse Event",
            description: "Study day when adverse event started (relative to reference date)",
            value_type: AeValueType::Integer,
            values: &[],
            use_for: &["study day", "day of onset", "which day"],
        },
        AeColumn {
            name: "AELLT",
            label: "Lowest Level Term",
            description: "MedDRA Lowest Level Term for the adverse event",
            value_type: AeValueType::String,
            values: &[],
            use_for: &["lowest level term", "LLT"],
        },
        AeColumn {
            name: "AEHLT",
            label: "High Level Term",
            description: "MedDRA High Level Term grouping",
            value_type: AeValueType::String,
            values: &[],
            use_for: &["high level term", "HLT"],
        },
        AeColumn {
            name: "AEHLGT",
            label: "High Level Group Term",
            description: "MedDRA High Level Group Term",
            value_type: AeValueType::String,
            values: &[],
            use_for: &["high level group", "HLGT"],
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let column = AE_SCHEMA.column("aesev").expect("AESEV present");
        assert_eq!(column.values, &["MILD", "MODERATE", "SEVERE"]);
        assert!(AE_SCHEMA.column("VSDTC").is_none());
    }

    #[test]
    fn causality_and_organ_class_are_free_text() {
        let aerel = AE_SCHEMA.column("AEREL").expect("AEREL present");
        assert!(aerel.values.is_empty());
        assert!(aerel.description.contains("PROBABLE, POSSIBLE, REMOTE, NONE"));
        let aesoc = AE_SCHEMA.column("AESOC").expect("AESOC present");
        assert!(aesoc.use_for.contains(&"system"));
        assert!(aesoc.use_for.contains(&"body part"));
    }

    #[test]
    fn describe_lists_valid_values_only_for_closed_sets() {
        let text = AE_SCHEMA.describe();
        assert!(text.starts_with("ADVERSE EVENTS (AE) DATASET SCHEMA:"));
        assert!(text.contains("Valid Values: MILD, MODERATE, SEVERE"));
        let aeterm_block = text
            .split("Column: ")
            .find(|block| block.starts_with("AETERM"))
            .expect("AETERM block");
        assert!(!aeterm_block.contains("Valid Values"));
    }
}

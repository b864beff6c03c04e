//! Data model for ADaM subject-level derivations.
//!
//! Everything here is plain data: subject keys, selection modes, event rule
//! descriptors and their qualifying conditions, plus the AE column
//! catalogue. Evaluation lives in `adam-core`.

pub mod ae_schema;
pub mod condition;
pub mod error;
pub mod rule;
pub mod selection;
pub mod subject;

pub use ae_schema::{AE_SCHEMA, AeColumn, AeSchema, AeValueType};
pub use condition::Condition;
pub use error::{DeriveError, Result};
pub use rule::{EventRule, EventSource, Provenance, validate_rules};
pub use selection::Selection;
pub use subject::{KeyColumns, SubjectKey};

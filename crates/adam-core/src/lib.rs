//! Derivation engine for ADaM subject-level datasets.
//!
//! [`events::resolve`] pools dated candidates from several source tables and
//! keeps one extreme event per subject. [`adsl`] builds on it for treatment
//! dates and the last known alive date; [`ae_query`] answers single-filter
//! questions over an AE table.

pub mod adsl;
pub mod ae_query;
pub mod condition;
pub mod datetime;
pub mod events;

pub use adsl::{
    AdslBuild, DerivationOptions, LastAlive, TreatmentDates, adsl_roster, build_adsl,
    derive_last_alive, derive_treatment_dates, last_alive_rules, treatment_end_rules,
    treatment_start_rules, valid_dose,
};
pub use ae_query::{AeQuery, AeQueryResponse, AeQueryResult, MatchType, ask, execute_query, parse_question};
pub use condition::{matching_rows, row_matches};
pub use datetime::{ImputeMode, complete_date, format_date, impute_date, parse_iso8601};
pub use events::{OutputColumns, ResolvedEvent, ResolvedEvents, RuleStats, SourceSet, resolve};

//! Subject-level analysis dataset (ADSL) derivations.
//!
//! The roster comes from DM. Treatment dates come from valid-dose exposure
//! records, and the last known alive date pools vital signs, adverse events,
//! disposition and the treatment end date already derived on ADSL itself.

use adam_common::{cell_string, is_missing_token};
use adam_model::{
    Condition, DeriveError, EventRule, EventSource, KeyColumns, Provenance, Result, Selection,
    SubjectKey,
};
use polars::prelude::{DataFrame, NamedFrom, Series};
use tracing::{info, info_span, warn};

use crate::condition::ensure_columns;
use crate::events::{OutputColumns, ResolvedEvents, SourceSet, frame_error, resolve};

/// DM variables carried onto ADSL when present.
pub const DM_CARRIED_VARIABLES: &[&str] = &[
    "STUDYID", "USUBJID", "SUBJID", "SITEID", "COUNTRY", "AGE", "AGEU", "SEX", "RACE", "ETHNIC",
    "ARMCD", "ARM", "ACTARMCD", "ACTARM", "RFSTDTC", "RFENDTC", "RFICDTC", "DTHDTC", "DTHFL",
];

/// Domains read by [`build_adsl`] besides DM.
pub const SOURCE_DOMAINS: &[&str] = &["EX", "AE", "VS", "DS"];

/// Library-side settings for ADSL derivations.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivationOptions {
    /// Selection applied to the last-alive rule pool.
    pub mode: Selection,
    pub keys: KeyColumns,
    pub last_alive_column: String,
    /// Prefix of the traceability variables (`LALVDOM`, `LALVSEQ`, `LALVVAR`).
    pub traceability_prefix: String,
    /// Last-alive rules in tie-break order; [`last_alive_rules`] by default.
    pub rules: Vec<EventRule>,
}

impl Default for DerivationOptions {
    fn default() -> Self {
        Self {
            mode: Selection::Last,
            keys: KeyColumns::default(),
            last_alive_column: "LSTALVDT".to_string(),
            traceability_prefix: "LALV".to_string(),
            rules: last_alive_rules(),
        }
    }
}

impl DerivationOptions {
    pub fn with_mode(mut self, mode: Selection) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_keys(mut self, keys: KeyColumns) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_rules(mut self, rules: Vec<EventRule>) -> Self {
        self.rules = rules;
        self
    }

    fn last_alive_columns(&self) -> OutputColumns {
        OutputColumns::with_traceability(
            self.last_alive_column.as_str(),
            &self.traceability_prefix,
        )
    }
}

/// `EXDOSE > 0`, or a zero dose of a placebo treatment.
pub fn valid_dose() -> Condition {
    Condition::any([
        Condition::greater_than("EXDOSE", 0.0),
        Condition::all([
            Condition::number_equals("EXDOSE", 0.0),
            Condition::contains("EXTRT", "PLACEBO"),
        ]),
    ])
}

fn ex_provenance(variable: &str) -> Provenance {
    Provenance::new("EX", variable).with_seq_column("EXSEQ")
}

/// First valid-dose exposure start.
pub fn treatment_start_rules() -> Vec<EventRule> {
    vec![
        EventRule::new("ex_start", EventSource::dataset("EX"), "EXSTDTC")
            .with_condition(valid_dose())
            .with_order(["EXSEQ"])
            .with_provenance(ex_provenance("EXSTDTC")),
    ]
}

/// Last valid-dose exposure end; records without a complete end date
/// contribute their start date instead.
pub fn treatment_end_rules() -> Vec<EventRule> {
    vec![
        EventRule::new("ex_end", EventSource::dataset("EX"), "EXENDTC")
            .with_condition(valid_dose())
            .with_order(["EXSEQ"])
            .with_provenance(ex_provenance("EXENDTC")),
        EventRule::new("ex_start_as_end", EventSource::dataset("EX"), "EXSTDTC")
            .with_condition(valid_dose().and(Condition::not(Condition::complete_date("EXENDTC"))))
            .with_order(["EXSEQ"])
            .with_provenance(ex_provenance("EXSTDTC")),
    ]
}

/// The last-known-alive rule set, in tie-break order.
pub fn last_alive_rules() -> Vec<EventRule> {
    vec![
        EventRule::new("vs", EventSource::dataset("VS"), "VSDTC")
            .with_condition(Condition::any([
                Condition::not_missing("VSSTRESN"),
                Condition::not_missing("VSSTRESC"),
            ]))
            .with_order(["VSSEQ"])
            .with_provenance(Provenance::new("VS", "VSDTC").with_seq_column("VSSEQ")),
        EventRule::new("ae_start", EventSource::dataset("AE"), "AESTDTC")
            .with_order(["AESEQ"])
            .with_provenance(Provenance::new("AE", "AESTDTC").with_seq_column("AESEQ")),
        EventRule::new("ae_end", EventSource::dataset("AE"), "AEENDTC")
            .with_order(["AESEQ"])
            .with_provenance(Provenance::new("AE", "AEENDTC").with_seq_column("AESEQ")),
        EventRule::new("ds", EventSource::dataset("DS"), "DSSTDTC")
            .with_order(["DSSEQ"])
            .with_provenance(Provenance::new("DS", "DSSTDTC").with_seq_column("DSSEQ")),
        EventRule::new("adsl_trtedt", EventSource::Snapshot, "TRTEDT")
            .with_condition(Condition::not_missing("TRTEDT"))
            .with_provenance(Provenance::new("ADSL", "TRTEDT")),
    ]
}

/// Builds the ADSL roster: one row per DM record with the carried variables
/// plus `TRT01P` / `TRT01A` from the planned and actual arms.
pub fn adsl_roster(dm: &DataFrame, keys: &KeyColumns) -> Result<DataFrame> {
    ensure_columns(dm, "DM", keys.as_slice())?;
    let carried: Vec<&str> = DM_CARRIED_VARIABLES
        .iter()
        .copied()
        .filter(|name| dm.column(name).is_ok())
        .collect();
    let mut selection: Vec<&str> = keys.as_slice().to_vec();
    selection.extend(carried.iter().filter(|name| !selection_contains(keys, name)));
    let mut roster = dm.select(selection).map_err(frame_error)?;
    for (target, source) in [("TRT01P", "ARM"), ("TRT01A", "ACTARM")] {
        if dm.column(source).is_err() {
            continue;
        }
        let values: Vec<Option<String>> = (0..dm.height())
            .map(|idx| {
                let value = cell_string(dm, source, idx);
                (!is_missing_token(&value)).then_some(value)
            })
            .collect();
        roster
            .with_column(Series::new(target.into(), values))
            .map_err(frame_error)?;
    }
    Ok(roster)
}

fn selection_contains(keys: &KeyColumns, name: &str) -> bool {
    keys.as_slice().contains(&name)
}

/// Treatment dates derived onto an ADSL roster.
#[derive(Debug, Clone)]
pub struct TreatmentDates {
    pub data: DataFrame,
    pub start: ResolvedEvents,
    pub end: ResolvedEvents,
}

/// Adds `TRTSDT`, `TRTEDT`, `TRTDURD` and `SAFFL` to `adsl` from `ex`.
pub fn derive_treatment_dates(
    adsl: &DataFrame,
    ex: &DataFrame,
    options: &DerivationOptions,
) -> Result<TreatmentDates> {
    let sources = SourceSet::new()
        .with_keys(options.keys.clone())
        .with_dataset("EX", ex.clone());
    let start = resolve(&sources, &treatment_start_rules(), Selection::First)?;
    let end = resolve(&sources, &treatment_end_rules(), Selection::Last)?;

    let mut data = start.merge_onto(adsl, &OutputColumns::date_only("TRTSDT"))?;
    data = end.merge_onto(&data, &OutputColumns::date_only("TRTEDT"))?;

    let mut durations: Vec<Option<i64>> = Vec::with_capacity(data.height());
    let mut safety: Vec<Option<&str>> = Vec::with_capacity(data.height());
    for idx in 0..data.height() {
        let subject = SubjectKey::new(
            cell_string(&data, &options.keys.study, idx).trim(),
            cell_string(&data, &options.keys.subject, idx).trim(),
        );
        let first = start.get(&subject).map(|event| event.date);
        let last = end.get(&subject).map(|event| event.date);
        durations.push(match (first, last) {
            (Some(first), Some(last)) if last >= first => Some((last - first).num_days() + 1),
            _ => None,
        });
        safety.push(first.map(|_| "Y"));
    }
    data.with_column(Series::new("TRTDURD".into(), durations))
        .map_err(frame_error)?;
    data.with_column(Series::new("SAFFL".into(), safety))
        .map_err(frame_error)?;
    Ok(TreatmentDates { data, start, end })
}

/// Last known alive date merged onto ADSL, with the resolution behind it.
#[derive(Debug, Clone)]
pub struct LastAlive {
    pub data: DataFrame,
    pub events: ResolvedEvents,
}

/// Derives the last known alive date onto `adsl` using `options.rules`.
///
/// `adsl` is also the snapshot source, so it must already carry `TRTEDT`
/// for the `adsl_trtedt` rule. Rules whose dataset is absent from `sources`
/// are skipped with a warning.
pub fn derive_last_alive(
    adsl: &DataFrame,
    sources: &SourceSet,
    options: &DerivationOptions,
) -> Result<LastAlive> {
    let rules: Vec<EventRule> = options
        .rules
        .iter()
        .filter(|rule| match &rule.source {
            EventSource::Dataset { name } if sources.dataset(name).is_none() => {
                warn!(rule = %rule.id, dataset = %name, "source dataset absent; rule skipped");
                false
            }
            _ => true,
        })
        .cloned()
        .collect();
    let mut sources = sources.clone().with_keys(options.keys.clone());
    sources.set_snapshot(adsl.clone());
    let events = resolve(&sources, &rules, options.mode)?;
    let data = events.merge_onto(adsl, &options.last_alive_columns())?;
    Ok(LastAlive { data, events })
}

/// Everything produced by [`build_adsl`].
#[derive(Debug, Clone)]
pub struct AdslBuild {
    pub data: DataFrame,
    pub treatment: TreatmentDates,
    pub last_alive: ResolvedEvents,
}

/// Runs the ADSL pipeline: roster, treatment dates, last known alive date.
///
/// `sources` must contain `EX`; `AE`, `VS` and `DS` are optional.
pub fn build_adsl(
    dm: &DataFrame,
    sources: &SourceSet,
    options: &DerivationOptions,
) -> Result<AdslBuild> {
    let span = info_span!("build_adsl", subjects = dm.height());
    let _guard = span.enter();

    let roster = adsl_roster(dm, &options.keys)?;
    let ex = sources
        .dataset("EX")
        .ok_or_else(|| DeriveError::UnknownDataset {
            rule: "ex_start".to_string(),
            dataset: "EX".to_string(),
        })?;
    let treatment = derive_treatment_dates(&roster, ex, options)?;
    info!(treated = treatment.start.len(), "derived treatment dates");

    let last_alive = derive_last_alive(&treatment.data, sources, options)?;
    info!(
        resolved = last_alive.events.len(),
        roster = roster.height(),
        "derived last known alive date"
    );
    Ok(AdslBuild {
        data: last_alive.data,
        treatment,
        last_alive: last_alive.events,
    })
}

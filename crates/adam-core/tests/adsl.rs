//! End-to-end ADSL derivation over small hand-built domains.

use adam_common::{cell_i64, cell_string};
use adam_core::adsl::{DerivationOptions, build_adsl, derive_last_alive, last_alive_rules};
use adam_core::events::SourceSet;
use adam_model::{Selection, SubjectKey};
use polars::prelude::{Column, DataFrame, IntoColumn, NamedFrom, Series};

fn frame(columns: &[(&str, Vec<&str>)]) -> DataFrame {
    let columns: Vec<Column> = columns
        .iter()
        .map(|(name, values)| Series::new((*name).into(), values.clone()).into_column())
        .collect();
    DataFrame::new(columns).unwrap()
}

fn dm() -> DataFrame {
    frame(&[
        ("STUDYID", vec!["CDISC01"; 4]),
        ("USUBJID", vec!["01", "02", "03", "04"]),
        ("AGE", vec!["63", "71", "58", "80"]),
        ("ARM", vec!["Xanomeline", "Placebo", "Xanomeline", "Screen Failure"]),
        ("ACTARM", vec!["Xanomeline", "Placebo", "Xanomeline", ""]),
        ("DOMAIN", vec!["DM"; 4]),
    ])
}

fn ex() -> DataFrame {
    frame(&[
        ("STUDYID", vec!["CDISC01"; 4]),
        ("USUBJID", vec!["01", "01", "02", "03"]),
        ("EXSEQ", vec!["1", "2", "1", "1"]),
        ("EXTRT", vec!["XANOMELINE", "XANOMELINE", "PLACEBO", "XANOMELINE"]),
        ("EXDOSE", vec!["54", "54", "0", "0"]),
        ("EXSTDTC", vec!["2014-01-02", "2014-02-02", "2014-03-01", "2014-04-01"]),
        ("EXENDTC", vec!["2014-02-01", "", "2014-03-10", "2014-04-05"]),
    ])
}

fn vs() -> DataFrame {
    frame(&[
        ("STUDYID", vec!["CDISC01"; 3]),
        ("USUBJID", vec!["01", "01", "03"]),
        ("VSSEQ", vec!["5", "6", "1"]),
        ("VSSTRESN", vec!["120", "", "80"]),
        ("VSSTRESC", vec!["120", "", "80"]),
        ("VSDTC", vec!["2014-02-10", "2014-03-01", "2014-04"]),
    ])
}

fn ae() -> DataFrame {
    frame(&[
        ("STUDYID", vec!["CDISC01"]),
        ("USUBJID", vec!["02"]),
        ("AESEQ", vec!["1"]),
        ("AESTDTC", vec!["2014-03-05"]),
        ("AEENDTC", vec!["2014-03-12"]),
    ])
}

fn ds() -> DataFrame {
    frame(&[
        ("STUDYID", vec!["CDISC01"]),
        ("USUBJID", vec!["03"]),
        ("DSSEQ", vec!["1"]),
        ("DSSTDTC", vec!["2014-04-02"]),
    ])
}

fn sources() -> SourceSet {
    SourceSet::new()
        .with_dataset("EX", ex())
        .with_dataset("VS", vs())
        .with_dataset("AE", ae())
        .with_dataset("DS", ds())
}

fn row(df: &DataFrame, usubjid: &str) -> usize {
    (0..df.height())
        .find(|idx| cell_string(df, "USUBJID", *idx) == usubjid)
        .unwrap()
}

#[test]
fn roster_keeps_dm_rows_and_carried_variables() {
    let build = build_adsl(&dm(), &sources(), &DerivationOptions::default()).unwrap();
    let data = &build.data;
    assert_eq!(data.height(), 4);
    assert!(data.column("DOMAIN").is_err());
    assert_eq!(cell_string(data, "TRT01P", row(data, "02")), "Placebo");
    assert_eq!(data.column("TRT01A").unwrap().null_count(), 1);
}

#[test]
fn treatment_dates_use_valid_doses_only() {
    let build = build_adsl(&dm(), &sources(), &DerivationOptions::default()).unwrap();
    let data = &build.data;

    let first = row(data, "01");
    assert_eq!(cell_string(data, "TRTSDT", first), "2014-01-02");
    // The second exposure has no end date, so its start closes treatment.
    assert_eq!(cell_string(data, "TRTEDT", first), "2014-02-02");
    assert_eq!(cell_i64(data, "TRTDURD", first), Some(32));
    assert_eq!(cell_string(data, "SAFFL", first), "Y");

    let placebo = row(data, "02");
    assert_eq!(cell_string(data, "TRTSDT", placebo), "2014-03-01");
    assert_eq!(cell_string(data, "TRTEDT", placebo), "2014-03-10");
    assert_eq!(cell_i64(data, "TRTDURD", placebo), Some(10));

    // Zero dose of active drug is not a valid dose.
    let untreated = row(data, "03");
    assert!(cell_string(data, "TRTSDT", untreated).is_empty());
    assert!(cell_string(data, "SAFFL", untreated).is_empty());
    assert_eq!(
        build
            .treatment
            .start
            .get(&SubjectKey::new("CDISC01", "03")),
        None
    );
}

#[test]
fn last_alive_pools_domains_and_treatment_end() {
    let build = build_adsl(&dm(), &sources(), &DerivationOptions::default()).unwrap();
    let data = &build.data;

    let first = row(data, "01");
    assert_eq!(cell_string(data, "LSTALVDT", first), "2014-02-10");
    assert_eq!(cell_string(data, "LALVDOM", first), "VS");
    assert_eq!(cell_i64(data, "LALVSEQ", first), Some(5));
    assert_eq!(cell_string(data, "LALVVAR", first), "VSDTC");

    let placebo = row(data, "02");
    assert_eq!(cell_string(data, "LSTALVDT", placebo), "2014-03-12");
    assert_eq!(cell_string(data, "LALVVAR", placebo), "AEENDTC");

    // Only a partial VS date and a DS record.
    let untreated = row(data, "03");
    assert_eq!(cell_string(data, "LSTALVDT", untreated), "2014-04-02");
    assert_eq!(cell_string(data, "LALVDOM", untreated), "DS");

    let screen_failure = row(data, "04");
    assert!(cell_string(data, "LSTALVDT", screen_failure).is_empty());
    assert_eq!(cell_i64(data, "LALVSEQ", screen_failure), None);

    assert_eq!(build.last_alive.len(), 3);
}

#[test]
fn first_mode_picks_earliest_alive_date() {
    let options = DerivationOptions::default().with_mode(Selection::First);
    let build = build_adsl(&dm(), &sources(), &options).unwrap();
    let data = &build.data;
    assert_eq!(cell_string(data, "LSTALVDT", row(data, "02")), "2014-03-05");
    assert_eq!(cell_string(data, "LALVVAR", row(data, "02")), "AESTDTC");
}

#[test]
fn treatment_end_from_snapshot_outranks_earlier_records() {
    let sources = SourceSet::new().with_dataset("EX", ex()).with_dataset(
        "VS",
        frame(&[
            ("STUDYID", vec!["CDISC01"]),
            ("USUBJID", vec!["02"]),
            ("VSSEQ", vec!["1"]),
            ("VSSTRESN", vec!["70"]),
            ("VSSTRESC", vec!["70"]),
            ("VSDTC", vec!["2014-03-02"]),
        ]),
    );
    let build = build_adsl(&dm(), &sources, &DerivationOptions::default()).unwrap();
    let data = &build.data;
    let placebo = row(data, "02");
    assert_eq!(cell_string(data, "LSTALVDT", placebo), "2014-03-10");
    assert_eq!(cell_string(data, "LALVDOM", placebo), "ADSL");
    assert_eq!(cell_string(data, "LALVVAR", placebo), "TRTEDT");
}

#[test]
fn rerunning_last_alive_on_its_output_is_stable() {
    let options = DerivationOptions::default();
    let build = build_adsl(&dm(), &sources(), &options).unwrap();
    let again = derive_last_alive(&build.data, &sources(), &options).unwrap();
    assert_eq!(again.data.width(), build.data.width());
    assert!(again.data.equals_missing(&build.data));
}

#[test]
fn missing_exposure_is_a_configuration_error() {
    let sources = SourceSet::new().with_dataset("VS", vs());
    assert!(build_adsl(&dm(), &sources, &DerivationOptions::default()).is_err());
}

#[test]
fn last_alive_rules_are_declared_in_tie_break_order() {
    let ids: Vec<String> = last_alive_rules().into_iter().map(|rule| rule.id).collect();
    assert_eq!(ids, vec!["vs", "ae_start", "ae_end", "ds", "adsl_trtedt"]);
}

#[test]
fn custom_rules_replace_the_default_pool() {
    let ds_only: Vec<_> = last_alive_rules()
        .into_iter()
        .filter(|rule| rule.id == "ds")
        .collect();
    let options = DerivationOptions::default().with_rules(ds_only);
    let build = build_adsl(&dm(), &sources(), &options).unwrap();
    let data = &build.data;
    assert!(cell_string(data, "LSTALVDT", row(data, "01")).is_empty());
    assert_eq!(cell_string(data, "LSTALVDT", row(data, "03")), "2014-04-02");
    assert_eq!(build.last_alive.len(), 1);
}

#[test]
fn placebo_dose_written_as_decimal_zero_counts_as_treated() {
    let dm = frame(&[
        ("STUDYID", vec!["CDISC01"]),
        ("USUBJID", vec!["05"]),
        ("ARM", vec!["Placebo"]),
        ("ACTARM", vec!["Placebo"]),
    ]);
    let ex = frame(&[
        ("STUDYID", vec!["CDISC01"]),
        ("USUBJID", vec!["05"]),
        ("EXSEQ", vec!["1"]),
        ("EXTRT", vec!["PLACEBO"]),
        ("EXDOSE", vec!["0.0"]),
        ("EXSTDTC", vec!["2014-01-02"]),
        ("EXENDTC", vec!["2014-01-20"]),
    ]);
    let sources = SourceSet::new().with_dataset("EX", ex);
    let build = build_adsl(&dm, &sources, &DerivationOptions::default()).unwrap();
    let data = &build.data;
    assert_eq!(cell_string(data, "TRTSDT", 0), "2014-01-02");
    assert_eq!(cell_string(data, "TRTEDT", 0), "2014-01-20");
    assert_eq!(cell_string(data, "SAFFL", 0), "Y");
}

//! Resolver behavior across several sources, snapshots and selection modes.

use std::collections::BTreeMap;

use adam_core::events::{OutputColumns, SourceSet, resolve};
use adam_model::{Condition, DeriveError, EventRule, EventSource, Provenance, Selection, SubjectKey};
use chrono::NaiveDate;
use polars::prelude::{Column, DataFrame, IntoColumn, NamedFrom, Series};
use proptest::prelude::*;

fn frame(columns: &[(&str, Vec<&str>)]) -> DataFrame {
    let columns: Vec<Column> = columns
        .iter()
        .map(|(name, values)| Series::new((*name).into(), values.clone()).into_column())
        .collect();
    DataFrame::new(columns).unwrap()
}

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

fn subject(usubjid: &str) -> SubjectKey {
    SubjectKey::new("S1", usubjid)
}

fn vs_rule() -> EventRule {
    EventRule::new("vs", EventSource::dataset("VS"), "VSDTC")
        .with_order(["VSSEQ"])
        .with_provenance(Provenance::new("VS", "VSDTC").with_seq_column("VSSEQ"))
}

fn ae_rule() -> EventRule {
    EventRule::new("ae", EventSource::dataset("AE"), "AESTDTC")
        .with_order(["AESEQ"])
        .with_provenance(Provenance::new("AE", "AESTDTC").with_seq_column("AESEQ"))
}

#[test]
fn equal_dates_resolve_to_the_earlier_rule() {
    let vs = frame(&[
        ("STUDYID", vec!["S1"]),
        ("USUBJID", vec!["S"]),
        ("VSSEQ", vec!["7"]),
        ("VSDTC", vec!["2021-03-01"]),
    ]);
    let ae = frame(&[
        ("STUDYID", vec!["S1"]),
        ("USUBJID", vec!["S"]),
        ("AESEQ", vec!["3"]),
        ("AESTDTC", vec!["2021-03-01T10:00"]),
    ]);
    let sources = SourceSet::new().with_dataset("VS", vs).with_dataset("AE", ae);

    for mode in [Selection::Last, Selection::First] {
        let resolved = resolve(&sources, &[vs_rule(), ae_rule()], mode).unwrap();
        let event = resolved.get(&subject("S")).unwrap();
        assert_eq!(event.date, date("2021-03-01"));
        assert_eq!(event.event_nr, 1);
        assert_eq!(event.domain, "VS");
        assert_eq!(event.seq, Some(7));
    }

    // Swapping declaration order swaps the winner.
    let resolved = resolve(&sources, &[ae_rule(), vs_rule()], Selection::Last).unwrap();
    let event = resolved.get(&subject("S")).unwrap();
    assert_eq!(event.domain, "AE");
    assert_eq!(event.seq, Some(3));
}

#[test]
fn snapshot_candidate_beats_earlier_domain_record() {
    let vs = frame(&[
        ("STUDYID", vec!["S1"]),
        ("USUBJID", vec!["S"]),
        ("VSSEQ", vec!["1"]),
        ("VSDTC", vec!["2021-05-01"]),
    ]);
    let adsl = frame(&[
        ("STUDYID", vec!["S1"]),
        ("USUBJID", vec!["S"]),
        ("TRTEDT", vec!["2021-06-15"]),
    ]);
    let snapshot_rule = EventRule::new("adsl", EventSource::Snapshot, "TRTEDT")
        .with_condition(Condition::not_missing("TRTEDT"))
        .with_provenance(Provenance::new("ADSL", "TRTEDT"));
    let sources = SourceSet::new()
        .with_dataset("VS", vs)
        .with_snapshot(adsl.clone());

    let resolved = resolve(&sources, &[vs_rule(), snapshot_rule], Selection::Last).unwrap();
    let event = resolved.get(&subject("S")).unwrap();
    assert_eq!(event.date, date("2021-06-15"));
    assert_eq!(event.domain, "ADSL");
    assert_eq!(event.seq, None);

    let merged = resolved
        .merge_onto(&adsl, &OutputColumns::with_traceability("LSTALVDT", "LALV"))
        .unwrap();
    let names: Vec<String> = merged
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    assert_eq!(
        names,
        vec!["STUDYID", "USUBJID", "TRTEDT", "LSTALVDT", "LALVDOM", "LALVSEQ", "LALVVAR"]
    );
    assert_eq!(
        adam_common::cell_string(&merged, "LSTALVDT", 0),
        "2021-06-15"
    );
    assert_eq!(adam_common::cell_string(&merged, "LALVVAR", 0), "TRTEDT");
}

#[test]
fn partial_date_is_never_selected() {
    let vs = frame(&[
        ("STUDYID", vec!["S1", "S1"]),
        ("USUBJID", vec!["P", "Q"]),
        ("VSSEQ", vec!["1", "1"]),
        ("VSDTC", vec!["2021-05", "2021-05-02"]),
    ]);
    let sources = SourceSet::new().with_dataset("VS", vs);
    let resolved = resolve(&sources, &[vs_rule()], Selection::Last).unwrap();

    assert!(resolved.get(&subject("P")).is_none());
    assert_eq!(resolved.get(&subject("Q")).unwrap().date, date("2021-05-02"));
    assert_eq!(resolved.stats[0].unusable_dates, 1);
    assert_eq!(resolved.stats[0].candidates, 1);

    let roster = frame(&[("STUDYID", vec!["S1", "S1"]), ("USUBJID", vec!["P", "Q"])]);
    let merged = resolved
        .merge_onto(&roster, &OutputColumns::date_only("LSTALVDT"))
        .unwrap();
    assert_eq!(merged.height(), 2);
    assert_eq!(merged.column("LSTALVDT").unwrap().null_count(), 1);
}

#[test]
fn condition_filters_before_dates_are_read() {
    let vs = frame(&[
        ("STUDYID", vec!["S1", "S1"]),
        ("USUBJID", vec!["S", "S"]),
        ("VSSEQ", vec!["1", "2"]),
        ("VSSTRESN", vec!["120", ""]),
        ("VSDTC", vec!["2021-01-01", "2021-02-01"]),
    ]);
    let rule = vs_rule().with_condition(Condition::not_missing("VSSTRESN"));
    let sources = SourceSet::new().with_dataset("VS", vs);
    let resolved = resolve(&sources, &[rule], Selection::Last).unwrap();
    let event = resolved.get(&subject("S")).unwrap();
    assert_eq!(event.date, date("2021-01-01"));
    assert_eq!(resolved.stats[0].qualified, 1);
}

#[test]
fn same_rule_ties_follow_order_columns_in_mode_direction() {
    let vs = frame(&[
        ("STUDYID", vec!["S1", "S1", "S1"]),
        ("USUBJID", vec!["S", "S", "S"]),
        ("VSSEQ", vec!["2", "10", "1"]),
        ("VSDTC", vec!["2021-01-01", "2021-01-01", "2021-01-01"]),
    ]);
    let sources = SourceSet::new().with_dataset("VS", vs);
    let last = resolve(&sources, &[vs_rule()], Selection::Last).unwrap();
    assert_eq!(last.get(&subject("S")).unwrap().seq, Some(10));
    let first = resolve(&sources, &[vs_rule()], Selection::First).unwrap();
    assert_eq!(first.get(&subject("S")).unwrap().seq, Some(1));
}

#[test]
fn empty_rules_and_empty_sources_resolve_to_nothing() {
    let resolved = resolve(&SourceSet::new(), &[], Selection::Last).unwrap();
    assert!(resolved.is_empty());

    let empty_vs = frame(&[
        ("STUDYID", vec![]),
        ("USUBJID", vec![]),
        ("VSSEQ", vec![]),
        ("VSDTC", vec![]),
    ]);
    let sources = SourceSet::new().with_dataset("VS", empty_vs);
    let resolved = resolve(&sources, &[vs_rule()], Selection::First).unwrap();
    assert!(resolved.is_empty());
    assert_eq!(resolved.stats[0].source_rows, 0);

    let roster = frame(&[("STUDYID", vec![]), ("USUBJID", vec![])]);
    let merged = resolved
        .merge_onto(&roster, &OutputColumns::date_only("LSTALVDT"))
        .unwrap();
    assert_eq!(merged.height(), 0);
    assert!(merged.column("LSTALVDT").is_ok());
}

#[test]
fn configuration_errors_fail_the_call() {
    let vs = frame(&[
        ("STUDYID", vec!["S1"]),
        ("USUBJID", vec!["S"]),
        ("VSDTC", vec!["2021-01-01"]),
    ]);
    let sources = SourceSet::new().with_dataset("VS", vs);

    let err = resolve(&sources, &[ae_rule()], Selection::Last).unwrap_err();
    assert!(matches!(err, DeriveError::UnknownDataset { ref dataset, .. } if dataset == "AE"));

    let snapshot_rule = EventRule::new("adsl", EventSource::Snapshot, "TRTEDT");
    let err = resolve(&sources, &[snapshot_rule], Selection::Last).unwrap_err();
    assert!(matches!(err, DeriveError::MissingSnapshot { .. }));

    // VSSEQ is required by the rule's order and provenance.
    let err = resolve(&sources, &[vs_rule()], Selection::Last).unwrap_err();
    assert!(matches!(err, DeriveError::MissingColumn { ref column, .. } if column == "VSSEQ"));

    let err = resolve(&sources, &[vs_rule(), vs_rule()], Selection::Last).unwrap_err();
    assert!(matches!(err, DeriveError::DuplicateRule(ref id) if id == "vs"));
}

#[test]
fn dataset_names_are_case_insensitive() {
    let vs = frame(&[
        ("STUDYID", vec!["S1"]),
        ("USUBJID", vec!["S"]),
        ("VSSEQ", vec!["1"]),
        ("VSDTC", vec!["2021-01-01"]),
    ]);
    let sources = SourceSet::new().with_dataset("vs", vs);
    let resolved = resolve(&sources, &[vs_rule()], Selection::Last).unwrap();
    assert_eq!(resolved.len(), 1);
}

// Each record: (subject index, source A or B, date text).
fn arb_records() -> impl Strategy<Value = Vec<(usize, bool, String)>> {
    let complete = (2019i32..2023, 1u32..13, 1u32..29)
        .prop_map(|(y, m, d)| format!("{y:04}-{m:02}-{d:02}"));
    let partial = (2019i32..2023, 1u32..13).prop_map(|(y, m)| format!("{y:04}-{m:02}"));
    let junk = prop::sample::select(vec!["", "NA", "2021-02-30", "not a date"])
        .prop_map(String::from);
    let text = prop_oneof![6 => complete, 2 => partial, 1 => junk];
    prop::collection::vec((0usize..5, any::<bool>(), text), 0..40)
}

fn source_frame(records: &[&(usize, bool, String)], date_column: &str) -> DataFrame {
    let studies: Vec<&str> = records.iter().map(|_| "S1").collect();
    let subjects: Vec<String> = records.iter().map(|(s, _, _)| format!("P{s}")).collect();
    let seqs: Vec<String> = (1..=records.len()).map(|n| n.to_string()).collect();
    let dates: Vec<&str> = records.iter().map(|(_, _, d)| d.as_str()).collect();
    DataFrame::new(vec![
        Series::new("STUDYID".into(), studies).into_column(),
        Series::new("USUBJID".into(), subjects).into_column(),
        Series::new("SEQ".into(), seqs).into_column(),
        Series::new(date_column.into(), dates).into_column(),
    ])
    .unwrap()
}

proptest! {
    #[test]
    fn resolved_value_is_the_extreme_complete_date(
        records in arb_records(),
        last in any::<bool>(),
    ) {
        let mode = if last { Selection::Last } else { Selection::First };
        let a: Vec<&(usize, bool, String)> = records.iter().filter(|r| r.1).collect();
        let b: Vec<&(usize, bool, String)> = records.iter().filter(|r| !r.1).collect();
        let sources = SourceSet::new()
            .with_dataset("A", source_frame(&a, "ADTC"))
            .with_dataset("B", source_frame(&b, "BDTC"));
        let rules = [
            EventRule::new("a", EventSource::dataset("A"), "ADTC").with_order(["SEQ"]),
            EventRule::new("b", EventSource::dataset("B"), "BDTC").with_order(["SEQ"]),
        ];

        let mut expected: BTreeMap<String, NaiveDate> = BTreeMap::new();
        for (s, _, text) in &records {
            let Ok(parsed) = NaiveDate::parse_from_str(text, "%Y-%m-%d") else { continue };
            if text.len() != 10 {
                continue;
            }
            expected
                .entry(format!("P{s}"))
                .and_modify(|current| {
                    if (last && parsed > *current) || (!last && parsed < *current) {
                        *current = parsed;
                    }
                })
                .or_insert(parsed);
        }

        let resolved = resolve(&sources, &rules, mode).unwrap();
        prop_assert_eq!(resolved.len(), expected.len());
        for s in 0..5 {
            let id = format!("P{s}");
            let got = resolved.get(&subject(&id)).map(|event| event.date);
            prop_assert_eq!(got, expected.get(&id).copied());
        }

        let again = resolve(&sources, &rules, mode).unwrap();
        let first_pass: Vec<_> = resolved.iter().collect();
        let second_pass: Vec<_> = again.iter().collect();
        prop_assert_eq!(first_pass, second_pass);
    }
}

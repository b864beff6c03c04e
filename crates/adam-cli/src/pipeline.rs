//! File-level orchestration: study folder in, ADSL CSV out.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use tracing::{info, info_span, trace};

use adam_core::adsl::{AdslBuild, DerivationOptions, SOURCE_DOMAINS, build_adsl};
use adam_core::ae_query::{AeQuery, AeQueryResponse, ask, execute_query};
use adam_core::events::SourceSet;
use adam_ingest::{load_study_tables, read_csv_table};
use adam_model::{AE_SCHEMA, EventRule, validate_rules};

use crate::logging::redact_value;

/// Domains read from the study folder; DM and EX are mandatory.
pub const STUDY_DOMAINS: &[&str] = &["DM", "EX", "AE", "VS", "DS"];

pub fn default_output_path(study_folder: &Path) -> PathBuf {
    study_folder.join("adsl.csv")
}

/// Reads a JSON array of event rules and checks their ids are unique.
pub fn load_rules(path: &Path) -> Result<Vec<EventRule>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read rules file {}", path.display()))?;
    let rules: Vec<EventRule> = serde_json::from_str(&text)
        .with_context(|| format!("parse rules file {}", path.display()))?;
    validate_rules(&rules).with_context(|| format!("validate rules in {}", path.display()))?;
    Ok(rules)
}

/// Writes `df` as a headed CSV, creating parent folders as needed.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output folder {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("create output file {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Outcome of one `adsl` run.
#[derive(Debug)]
pub struct AdslRun {
    pub study_folder: PathBuf,
    /// `None` for dry runs.
    pub output: Option<PathBuf>,
    /// Domains found in the study folder.
    pub loaded: Vec<String>,
    pub build: AdslBuild,
    pub elapsed_ms: u128,
}

/// Loads the study, derives ADSL and writes it unless `output` is `None`.
pub fn run_adsl(
    study_folder: &Path,
    options: &DerivationOptions,
    output: Option<&Path>,
) -> Result<AdslRun> {
    let span = info_span!("adsl", study_folder = %study_folder.display());
    let _guard = span.enter();
    let start = Instant::now();

    let study = info_span!("ingest")
        .in_scope(|| load_study_tables(study_folder, STUDY_DOMAINS))
        .with_context(|| format!("load study folder {}", study_folder.display()))?;
    let dm = study.require("DM")?;
    study.require("EX")?;

    let mut sources = SourceSet::new().with_keys(options.keys.clone());
    for name in SOURCE_DOMAINS {
        if let Some(df) = study.get(name) {
            sources.insert(name, df.clone());
        }
    }

    let build = info_span!("derive")
        .in_scope(|| build_adsl(dm, &sources, options))
        .context("derive ADSL")?;
    for (subject, event) in build.last_alive.iter() {
        trace!(
            usubjid = redact_value(&subject.usubjid),
            date = %event.date,
            rule = %event.rule_id,
            "last alive date"
        );
    }

    let output = match output {
        Some(path) => {
            let mut data = build.data.clone();
            info_span!("output").in_scope(|| write_csv(&mut data, path))?;
            info!(path = %path.display(), rows = data.height(), "wrote ADSL");
            Some(path.to_path_buf())
        }
        None => None,
    };

    Ok(AdslRun {
        study_folder: study_folder.to_path_buf(),
        output,
        loaded: study.names().map(str::to_string).collect(),
        build,
        elapsed_ms: start.elapsed().as_millis(),
    })
}

/// Answers a question, or runs an explicit filter when `filter` is given.
pub fn run_ae_query(
    ae_csv: &Path,
    question: Option<&str>,
    filter: Option<AeQuery>,
) -> Result<AeQueryResponse> {
    let ae = read_csv_table(ae_csv).with_context(|| format!("load {}", ae_csv.display()))?;
    match (filter, question) {
        (Some(query), question) => {
            let results = execute_query(&ae, &query).context("run AE filter")?;
            Ok(AeQueryResponse {
                question: question.unwrap_or_default().to_string(),
                parsed_query: query,
                results,
            })
        }
        (None, Some(question)) => ask(question, &ae, &AE_SCHEMA).context("answer AE question"),
        (None, None) => bail!("either a question or --column/--value is required"),
    }
}

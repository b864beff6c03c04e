use anyhow::{Context, Result};

use adam_cli::pipeline::{AdslRun, default_output_path, load_rules, run_adsl, run_ae_query};
use adam_core::adsl::{DerivationOptions, last_alive_rules};
use adam_core::ae_query::{AeQuery, AeQueryResponse};
use adam_model::EventRule;

use crate::cli::{AdslArgs, AeQueryArgs, RulesArgs};

pub fn run_adsl_command(args: &AdslArgs) -> Result<AdslRun> {
    let mut options = DerivationOptions::default().with_mode(args.mode.into());
    if let Some(path) = &args.rules {
        options = options.with_rules(load_rules(path)?);
    }
    let output = if args.dry_run {
        None
    } else {
        Some(
            args.output
                .clone()
                .unwrap_or_else(|| default_output_path(&args.study_folder)),
        )
    };
    run_adsl(&args.study_folder, &options, output.as_deref())
}

pub fn run_ae_query_command(args: &AeQueryArgs) -> Result<AeQueryResponse> {
    let filter = match (&args.column, &args.value) {
        (Some(column), Some(value)) => Some(
            AeQuery::new(column.to_uppercase(), value, args.match_type.into())
                .with_reasoning("explicit --column/--value filter"),
        ),
        _ => None,
    };
    run_ae_query(&args.ae_csv, args.question.as_deref(), filter)
}

pub fn run_rules_command(args: &RulesArgs) -> Result<Vec<EventRule>> {
    match &args.rules {
        Some(path) => load_rules(path),
        None => Ok(last_alive_rules()),
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{text}");
    Ok(())
}

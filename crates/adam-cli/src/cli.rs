//! Argument definitions for the `adam` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use adam_core::ae_query::MatchType;
use adam_model::Selection;

#[derive(Parser)]
#[command(
    name = "adam",
    version,
    about = "Derive ADaM subject-level variables from SDTM CSV domains",
    long_about = "Derive ADaM subject-level variables from SDTM CSV domains.\n\n\
                  Builds ADSL with treatment dates and the last known alive date,\n\
                  and answers single-filter questions over an AE table."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format.
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow subject identifiers in trace-level logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build ADSL from a study folder of SDTM CSV files.
    Adsl(AdslArgs),

    /// Answer a question about an AE CSV file.
    AeQuery(AeQueryArgs),

    /// Print the last-alive rule set.
    Rules(RulesArgs),
}

#[derive(Parser)]
pub struct AdslArgs {
    /// Folder containing DM, EX and optionally AE, VS, DS CSV files.
    #[arg(value_name = "STUDY_FOLDER")]
    pub study_folder: PathBuf,

    /// Keep the earliest or the latest candidate date per subject.
    #[arg(long = "mode", value_enum, default_value = "last")]
    pub mode: ModeArg,

    /// Output CSV path (default: <STUDY_FOLDER>/adsl.csv).
    #[arg(long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// JSON file with a replacement last-alive rule list.
    #[arg(long = "rules", value_name = "PATH")]
    pub rules: Option<PathBuf>,

    /// Derive and summarize without writing the output file.
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Parser)]
pub struct AeQueryArgs {
    /// AE domain CSV file.
    #[arg(value_name = "AE_CSV")]
    pub ae_csv: PathBuf,

    /// Free-text question, e.g. "Which patients experienced headache?".
    #[arg(value_name = "QUESTION", required_unless_present = "column")]
    pub question: Option<String>,

    /// Filter this column directly instead of parsing a question.
    #[arg(long = "column", requires = "value")]
    pub column: Option<String>,

    /// Value to match in --column.
    #[arg(long = "value", requires = "column")]
    pub value: Option<String>,

    /// How --value is compared.
    #[arg(long = "match", value_enum, default_value = "contains")]
    pub match_type: MatchArg,

    /// Print the full response as JSON.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Parser)]
pub struct RulesArgs {
    /// Show rules from this JSON file instead of the built-in set.
    #[arg(long = "rules", value_name = "PATH")]
    pub rules: Option<PathBuf>,

    /// Print the rules as JSON.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    First,
    Last,
}

impl From<ModeArg> for Selection {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::First => Selection::First,
            ModeArg::Last => Selection::Last,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum MatchArg {
    Exact,
    Contains,
}

impl From<MatchArg> for MatchType {
    fn from(value: MatchArg) -> Self {
        match value {
            MatchArg::Exact => MatchType::Exact,
            MatchArg::Contains => MatchType::Contains,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

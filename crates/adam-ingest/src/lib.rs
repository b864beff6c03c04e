//! Study data ingestion.
//!
//! Finds the domain CSV files of a study folder and loads them into Polars
//! DataFrames with text columns.
//!
//! ```ignore
//! use std::path::Path;
//! use adam_ingest::load_study_tables;
//!
//! let study = load_study_tables(Path::new("data/cdiscpilot01"), &["DM", "EX", "AE"])?;
//! let dm = study.require("DM")?;
//! ```

mod csv;
mod discovery;
mod error;

pub use csv::read_csv_table;
pub use discovery::{
    StudyTables, discover_tables, list_csv_files, load_study_tables, table_name,
};
pub use error::{IngestError, Result};

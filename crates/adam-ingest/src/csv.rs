//! CSV reading into Polars DataFrames.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use polars::prelude::{CsvReadOptions, DataFrame, SerReader};
use tracing::debug;

use crate::error::{IngestError, Result};

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IngestError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            IngestError::FileRead {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

/// Returns true when the file has at least one non-blank line.
fn has_header_line(path: &Path) -> Result<bool> {
    let reader = BufReader::new(open(path)?);
    for line in reader.lines() {
        let line = line.map_err(|e| IngestError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let cleaned = line.strip_prefix('\u{feff}').unwrap_or(&line);
        if !cleaned.trim().is_empty() {
            return Ok(true);
        }
    }
    Ok(false)
}

fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

/// Reads a CSV file into a DataFrame with every column typed as text.
///
/// Clinical exports mix `NA`, `.` and blanks into numeric columns, so type
/// inference is disabled and conversion is left to the consumer. Header
/// names are trimmed and stripped of a byte-order mark.
pub fn read_csv_table(path: &Path) -> Result<DataFrame> {
    if !has_header_line(path)? {
        return Err(IngestError::EmptyCsv {
            path: path.to_path_buf(),
        });
    }

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .finish()
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    for name in names {
        let normalized = normalize_header(&name);
        if normalized != name {
            df.rename(&name, normalized.as_str().into())?;
        }
    }

    debug!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "loaded csv table"
    );
    Ok(df)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_read_csv_table_reads_text_columns() {
        let file = create_temp_csv("USUBJID,VSSEQ,VSSTRESN\n01-701-1015,1,NA\n01-701-1015,2,120\n");
        let df = read_csv_table(file.path()).unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
        let seq = df.column("VSSEQ").unwrap();
        assert_eq!(seq.dtype(), &polars::prelude::DataType::String);
    }

    #[test]
    fn test_read_csv_table_trims_headers() {
        let file = create_temp_csv("\u{feff}USUBJID , AETERM\n01-701-1015,HEADACHE\n");
        let df = read_csv_table(file.path()).unwrap();

        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        assert_eq!(names, vec!["USUBJID", "AETERM"]);
    }

    #[test]
    fn test_read_csv_table_empty_file() {
        let file = create_temp_csv("\n  \n");
        let result = read_csv_table(file.path());

        assert!(matches!(result, Err(IngestError::EmptyCsv { .. })));
    }

    #[test]
    fn test_read_csv_table_missing_file() {
        let result = read_csv_table(Path::new("/nonexistent/dm.csv"));

        assert!(matches!(result, Err(IngestError::FileNotFound { .. })));
    }
}

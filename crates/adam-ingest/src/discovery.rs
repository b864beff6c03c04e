//! Study folder discovery and table loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use tracing::{info, warn};

use crate::csv::read_csv_table;
use crate::error::{IngestError, Result};

/// Lists all CSV files in a directory, sorted by filename.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry_result in entries {
        let entry = entry_result.map_err(|e| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Table name a file is known by: the upper-cased stem, with any
/// `<study>_` prefix dropped (`CDISCPILOT01_AE.csv` is `AE`).
pub fn table_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?.trim().to_uppercase();
    if stem.is_empty() {
        return None;
    }
    let name = stem.rsplit('_').next().unwrap_or(&stem);
    if name.is_empty() {
        Some(stem)
    } else {
        Some(name.to_string())
    }
}

/// Maps table names to the CSV files that provide them.
///
/// When two files resolve to the same name the first by filename wins and
/// the rest are reported.
pub fn discover_tables(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut tables: BTreeMap<String, PathBuf> = BTreeMap::new();
    for path in list_csv_files(dir)? {
        let Some(name) = table_name(&path) else {
            continue;
        };
        if let Some(existing) = tables.get(&name) {
            warn!(
                table = %name,
                kept = %existing.display(),
                ignored = %path.display(),
                "duplicate table file"
            );
            continue;
        }
        tables.insert(name, path);
    }
    Ok(tables)
}

/// Tables loaded from one study folder, keyed by upper-case table name.
#[derive(Debug, Clone, Default)]
pub struct StudyTables {
    pub folder: PathBuf,
    pub tables: BTreeMap<String, DataFrame>,
}

impl StudyTables {
    pub fn get(&self, name: &str) -> Option<&DataFrame> {
        self.tables.get(&name.to_uppercase())
    }

    /// Returns the table or a `MissingTable` error naming the folder.
    pub fn require(&self, name: &str) -> Result<&DataFrame> {
        self.get(name).ok_or_else(|| IngestError::MissingTable {
            name: name.to_uppercase(),
            folder: self.folder.clone(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn into_tables(self) -> BTreeMap<String, DataFrame> {
        self.tables
    }
}

/// Loads the named tables that exist in `dir`. Absent names are skipped;
/// callers decide which ones are mandatory via [`StudyTables::require`].
pub fn load_study_tables(dir: &Path, names: &[&str]) -> Result<StudyTables> {
    let discovered = discover_tables(dir)?;
    let mut tables = BTreeMap::new();
    for name in names {
        let key = name.to_uppercase();
        let Some(path) = discovered.get(&key) else {
            continue;
        };
        let df = read_csv_table(path)?;
        tables.insert(key, df);
    }
    info!(
        folder = %dir.display(),
        loaded = tables.len(),
        requested = names.len(),
        "loaded study tables"
    );
    Ok(StudyTables {
        folder: dir.to_path_buf(),
        tables,
    })
}

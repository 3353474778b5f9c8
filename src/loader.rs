// src/loader.rs
// Resolves a source path (single file or directory) into one dataset.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use crate::csv_handler::CSVHandler;
use crate::data_types::Dataset;
use crate::encoding::EncodingChain;
use crate::error::{Result, SyncError};
use crate::excel_handler;
use crate::parquet_handler;

/// Tabular formats the loader knows how to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Tsv,
    Workbook,
    Parquet,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(SourceFormat::Csv),
            "tsv" => Some(SourceFormat::Tsv),
            "xlsx" | "xlsm" | "xls" | "ods" => Some(SourceFormat::Workbook),
            "parquet" => Some(SourceFormat::Parquet),
            _ => None,
        }
    }
}

pub struct Loader {
    encodings: EncodingChain,
}

impl Loader {
    pub fn new(encodings: EncodingChain) -> Self {
        Loader { encodings }
    }

    /// Loads `path`.
    ///
    /// A missing path is `PathNotFound`. A single file with an unknown
    /// extension yields an empty dataset. Inside a directory, unknown,
    /// unreadable, or undecodable entries are skipped with a warning.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn load(&self, path: &Path) -> Result<Dataset> {
        if !path.exists() {
            return Err(SyncError::PathNotFound(path.to_path_buf()));
        }

        if path.is_dir() {
            return self.load_directory(path);
        }

        match SourceFormat::from_path(path) {
            Some(format) => self.parse(path, format),
            None => {
                warn!(path = %path.display(), "{}", SyncError::UnsupportedFormat(path.to_path_buf()));
                Ok(Dataset::empty())
            }
        }
    }

    fn load_directory(&self, dir: &Path) -> Result<Dataset> {
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut combined: Option<Dataset> = None;

        for entry in entries {
            let Some(format) = SourceFormat::from_path(&entry) else {
                debug!(path = %entry.display(), "skipping unrecognised entry");
                continue;
            };

            let part = match self.parse(&entry, format) {
                Ok(part) => part,
                Err(error) => {
                    warn!(path = %entry.display(), %error, "skipping unreadable entry");
                    continue;
                }
            };

            if part.columns().is_empty() {
                warn!(path = %entry.display(), "skipping entry without a header row");
                continue;
            }

            match combined.as_mut() {
                None => combined = Some(part),
                Some(base) => append_aligned(base, part, &entry),
            }
        }

        Ok(combined.unwrap_or_default())
    }

    fn parse(&self, path: &Path, format: SourceFormat) -> Result<Dataset> {
        let handler = CSVHandler::new(&self.encodings);
        let data = match format {
            SourceFormat::Csv => handler.read_csv(path)?,
            SourceFormat::Tsv => handler.read_tsv(path)?,
            SourceFormat::Workbook => excel_handler::read_workbook(path)?,
            SourceFormat::Parquet => parquet_handler::read_parquet(path)?,
        };
        debug!(
            path = %path.display(),
            rows = data.row_count(),
            columns = data.column_count(),
            "parsed source file"
        );
        Ok(data)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Loader::new(EncodingChain::default())
    }
}

/// Appends `part` to `base`, mapping its columns by name onto the frozen
/// column set of `base`. Missing columns are filled with empty strings and
/// unknown ones are dropped.
fn append_aligned(base: &mut Dataset, part: Dataset, source: &Path) {
    if part.columns() == base.columns() {
        let (_, rows) = part.into_parts();
        base.extend_rows(rows);
        return;
    }

    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (index, name) in part.columns().iter().enumerate() {
        positions.entry(name.as_str()).or_insert(index);
    }

    let dropped: Vec<&str> = part
        .columns()
        .iter()
        .map(String::as_str)
        .filter(|name| !base.columns().iter().any(|c| c == name))
        .collect();
    let missing: Vec<&str> = base
        .columns()
        .iter()
        .map(String::as_str)
        .filter(|name| !positions.contains_key(name))
        .collect();
    warn!(
        path = %source.display(),
        ?dropped,
        ?missing,
        "column set differs from the first file; aligning by name"
    );

    let mapping: Vec<Option<usize>> = base
        .columns()
        .iter()
        .map(|name| positions.get(name.as_str()).copied())
        .collect();

    let aligned: Vec<Vec<String>> = part
        .rows()
        .iter()
        .map(|row| {
            mapping
                .iter()
                .map(|index| index.map(|i| row[i].clone()).unwrap_or_default())
                .collect()
        })
        .collect();
    base.extend_rows(aligned);
}

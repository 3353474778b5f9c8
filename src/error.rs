// src/error.rs
use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type covering the failures that can occur while loading local data,
/// talking to the spreadsheet service, or reading the configuration.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid configuration or credentials. Aborts the whole run.
    #[error("configuration error: {0}")]
    Config(String),

    /// The source path of a target does not exist.
    #[error("source path not found: {0}")]
    PathNotFound(PathBuf),

    /// None of the candidate encodings could decode the file.
    #[error("could not decode {path} with any of the configured encodings ({tried})")]
    Decoding { path: PathBuf, tried: String },

    /// The file extension is not a recognised tabular format.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Auth, network, or quota failure talking to the spreadsheet service.
    #[error("remote access error: {0}")]
    RemoteAccess(String),

    /// The named tab does not exist in the spreadsheet.
    #[error("tab not found: {0}")]
    TabNotFound(String),

    /// Wrapper for IO failures such as reading source files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV input.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Errors bubbled up from the workbook reader.
    #[error("spreadsheet file error: {0}")]
    Excel(#[from] calamine::Error),

    /// Malformed or unreadable Parquet file.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Raised when JSON parsing fails (configuration, service account key).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<google_sheets4::Error> for SyncError {
    fn from(error: google_sheets4::Error) -> Self {
        SyncError::RemoteAccess(error.to_string())
    }
}

impl SyncError {
    /// Errors that abort the whole run rather than a single target.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Config(_))
    }
}

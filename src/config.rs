// src/config.rs
// Run configuration: which local paths feed which spreadsheet tabs.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::encoding::{EncodingChain, DEFAULT_ENCODINGS};
use crate::error::{Result, SyncError};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// One (spreadsheet, tab, source path) unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub spreadsheet: String,
    pub tab: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TabEntry {
    pub tab: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpreadsheetEntry {
    /// URL or bare spreadsheet ID.
    pub spreadsheet: String,
    #[serde(default)]
    pub tabs: Vec<TabEntry>,
}

impl SpreadsheetEntry {
    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.tabs.iter().map(|entry| Target {
            spreadsheet: self.spreadsheet.clone(),
            tab: entry.tab.clone(),
            path: entry.path.clone(),
        })
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_encodings() -> Vec<String> {
    DEFAULT_ENCODINGS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Service account key file.
    #[serde(default)]
    pub credentials: Option<PathBuf>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Encoding labels tried in order when decoding text sources.
    #[serde(default = "default_encodings")]
    pub encodings: Vec<String>,
    pub spreadsheets: Vec<SpreadsheetEntry>,
}

impl SyncConfig {
    pub fn new(spreadsheets: Vec<SpreadsheetEntry>) -> Self {
        SyncConfig {
            credentials: None,
            batch_size: DEFAULT_BATCH_SIZE,
            encodings: default_encodings(),
            spreadsheets,
        }
    }

    /// Reads a JSON config file. Relative paths inside it are resolved
    /// against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_json(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: SyncConfig = serde_json::from_str(text)
            .map_err(|e| SyncError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SyncError::Config("batch_size must be at least 1".into()));
        }
        EncodingChain::from_labels(&self.encodings)?;

        for book in &self.spreadsheets {
            if book.spreadsheet.trim().is_empty() {
                return Err(SyncError::Config("spreadsheet identifier is empty".into()));
            }
            let mut seen = HashSet::new();
            for entry in &book.tabs {
                if entry.tab.trim().is_empty() {
                    return Err(SyncError::Config(format!(
                        "empty tab name in spreadsheet {}",
                        book.spreadsheet
                    )));
                }
                if !seen.insert(entry.tab.as_str()) {
                    return Err(SyncError::Config(format!(
                        "tab '{}' is listed twice for spreadsheet {}",
                        entry.tab, book.spreadsheet
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn encoding_chain(&self) -> Result<EncodingChain> {
        EncodingChain::from_labels(&self.encodings)
    }

    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.spreadsheets.iter().flat_map(SpreadsheetEntry::targets)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        if let Some(credentials) = self.credentials.as_mut() {
            if credentials.is_relative() {
                *credentials = base.join(&*credentials);
            }
        }
        for entry in self.spreadsheets.iter_mut().flat_map(|b| b.tabs.iter_mut()) {
            if entry.path.is_relative() {
                entry.path = base.join(&entry.path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{
        "credentials": "auth/credentials.json",
        "spreadsheets": [
            {
                "spreadsheet": "https://docs.google.com/spreadsheets/d/abc/edit",
                "tabs": [
                    { "tab": "clients", "path": "data/clients.csv" },
                    { "tab": "process", "path": "/srv/process/" }
                ]
            }
        ]
    }"#;

    #[test]
    fn defaults_apply() {
        let config = SyncConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.encodings, vec!["utf-8", "windows-1252"]);
        assert_eq!(config.targets().count(), 2);
    }

    #[test]
    fn targets_keep_configuration_order() {
        let config = SyncConfig::from_json(SAMPLE).unwrap();
        let tabs: Vec<String> = config.targets().map(|t| t.tab).collect();
        assert_eq!(tabs, vec!["clients", "process"]);
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sync.json");
        fs::write(&path, SAMPLE).unwrap();

        let config = SyncConfig::from_file(&path).unwrap();
        assert_eq!(
            config.credentials.as_deref(),
            Some(dir.path().join("auth/credentials.json").as_path())
        );
        let paths: Vec<PathBuf> = config.targets().map(|t| t.path).collect();
        assert_eq!(paths[0], dir.path().join("data/clients.csv"));
        assert_eq!(paths[1], PathBuf::from("/srv/process/"));
    }

    #[test]
    fn duplicate_tab_names_are_rejected() {
        let json = r#"{"spreadsheets": [{"spreadsheet": "abc", "tabs": [
            {"tab": "a", "path": "x.csv"}, {"tab": "a", "path": "y.csv"}]}]}"#;
        let err = SyncConfig::from_json(json).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn same_tab_name_in_different_spreadsheets_is_fine() {
        let json = r#"{"spreadsheets": [
            {"spreadsheet": "one", "tabs": [{"tab": "a", "path": "x.csv"}]},
            {"spreadsheet": "two", "tabs": [{"tab": "a", "path": "y.csv"}]}]}"#;
        assert!(SyncConfig::from_json(json).is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let json = r#"{"batch_size": 0, "spreadsheets": []}"#;
        assert!(matches!(SyncConfig::from_json(json), Err(SyncError::Config(_))));
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let json = r#"{"encodings": ["utf-8", "nope"], "spreadsheets": []}"#;
        assert!(matches!(SyncConfig::from_json(json), Err(SyncError::Config(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let json = r#"{"spreadsheets": [], "batchsize": 10}"#;
        assert!(SyncConfig::from_json(json).is_err());
    }
}

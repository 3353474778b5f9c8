// src/csv_handler.rs
use std::fs;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::warn;

use crate::data_types::Dataset;
use crate::encoding::EncodingChain;
use crate::error::Result;

pub struct CSVHandler<'a> {
    encodings: &'a EncodingChain,
}

impl<'a> CSVHandler<'a> {
    pub fn new(encodings: &'a EncodingChain) -> Self {
        CSVHandler { encodings }
    }

    /// Reads a comma/semicolon/pipe/tab separated file, sniffing the delimiter.
    pub fn read_csv(&self, path: &Path) -> Result<Dataset> {
        let bytes = fs::read(path)?;
        let (content, _) = self.encodings.decode(path, &bytes)?;
        let delimiter = Self::detect_delimiter(&content);
        Self::parse(path, &content, delimiter)
    }

    pub fn read_tsv(&self, path: &Path) -> Result<Dataset> {
        let bytes = fs::read(path)?;
        let (content, _) = self.encodings.decode(path, &bytes)?;
        Self::parse(path, &content, b'\t')
    }

    fn parse(path: &Path, content: &str, delimiter: u8) -> Result<Dataset> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        if headers.is_empty() {
            return Ok(Dataset::empty());
        }

        let width = headers.len();
        let mut rows = Vec::new();
        let mut overflowing = 0usize;

        for result in reader.records() {
            let record = result?;
            if record.len() > width {
                overflowing += 1;
            }
            rows.push(record.iter().take(width).map(String::from).collect());
        }

        if overflowing > 0 {
            warn!(
                path = %path.display(),
                rows = overflowing,
                "rows wider than the header were truncated"
            );
        }

        Ok(Dataset::new(headers, rows))
    }

    /// Picks the candidate delimiter that splits the first lines most
    /// consistently into more than one field. Defaults to comma.
    fn detect_delimiter(content: &str) -> u8 {
        let candidates: &[u8] = &[b',', b';', b'\t', b'|'];
        let sample: Vec<&str> = content.lines().filter(|l| !l.is_empty()).take(10).collect();

        let mut best = b',';
        let mut best_score = 0usize;

        for &delimiter in candidates {
            let counts: Vec<usize> = sample
                .iter()
                .map(|line| {
                    ReaderBuilder::new()
                        .delimiter(delimiter)
                        .has_headers(false)
                        .flexible(true)
                        .from_reader(line.as_bytes())
                        .records()
                        .next()
                        .and_then(|record| record.ok())
                        .map_or(1, |record| record.len())
                })
                .collect();

            let first = counts.first().copied().unwrap_or(0);
            if first <= 1 {
                continue;
            }

            let consistent = counts.iter().filter(|&&count| count == first).count();
            let score = consistent * first;
            if score > best_score {
                best_score = score;
                best = delimiter;
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn detects_semicolon() {
        let content = "Name;Age;City\nAlice;30;Paris\nBob;25;London\n";
        assert_eq!(CSVHandler::detect_delimiter(content), b';');
    }

    #[test]
    fn semicolon_wins_over_quoted_commas() {
        let content = "Name;Address\n\"Doe, Jane\";\"1 Main St, Apt 4\"\nBob;\"456 Elm\"\n";
        assert_eq!(CSVHandler::detect_delimiter(content), b';');
    }

    #[test]
    fn single_column_defaults_to_comma() {
        assert_eq!(CSVHandler::detect_delimiter("id\n1\n2\n"), b',');
    }

    #[test]
    fn reads_values_as_text_and_pads_short_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("people.csv");
        fs::write(&path, "id,name,score\n1,Alice,1.0\n2,Bob\n").unwrap();

        let encodings = EncodingChain::default();
        let data = CSVHandler::new(&encodings).read_csv(&path).unwrap();

        assert_eq!(data.columns(), strings(&["id", "name", "score"]).as_slice());
        assert_eq!(data.rows()[0], strings(&["1", "Alice", "1.0"]));
        assert_eq!(data.rows()[1], strings(&["2", "Bob", ""]));
    }

    #[test]
    fn wide_rows_are_truncated_to_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.csv");
        fs::write(&path, "a,b\n1,2,3\n").unwrap();

        let encodings = EncodingChain::default();
        let data = CSVHandler::new(&encodings).read_csv(&path).unwrap();
        assert_eq!(data.rows(), &[strings(&["1", "2"])]);
    }

    #[test]
    fn empty_file_has_no_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").unwrap();

        let encodings = EncodingChain::default();
        let data = CSVHandler::new(&encodings).read_csv(&path).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn tsv_uses_tab_delimiter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.tsv");
        fs::write(&path, "a\tb\nx,y\tz\n").unwrap();

        let encodings = EncodingChain::default();
        let data = CSVHandler::new(&encodings).read_tsv(&path).unwrap();
        assert_eq!(data.rows(), &[strings(&["x,y", "z"])]);
    }

    #[test]
    fn latin1_file_decodes_through_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        fs::write(&path, b"city\nM\xE1laga\n").unwrap();

        let encodings = EncodingChain::default();
        let data = CSVHandler::new(&encodings).read_csv(&path).unwrap();
        assert_eq!(data.rows()[0], strings(&["Málaga"]));
    }
}

// src/data_types.rs

/// Normalized in-memory table used for both local and remote content.
///
/// Every row has exactly `columns.len()` cells; missing values are stored as
/// empty strings. Equality is structural: same column sequence and same rows,
/// value for value, in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn empty() -> Self {
        Dataset::default()
    }

    /// Builds a dataset, padding short rows with empty strings and truncating
    /// cells beyond the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Dataset { columns, rows }
    }

    /// Builds a dataset from cells that may be absent.
    pub fn from_optional(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Option::unwrap_or_default).collect())
            .collect();
        Dataset::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<String>>) {
        (self.columns, self.rows)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    /// Appends rows that already follow this dataset's column order.
    pub(crate) fn extend_rows(&mut self, rows: impl IntoIterator<Item = Vec<String>>) {
        let width = self.columns.len();
        self.rows.extend(rows.into_iter().map(|mut row| {
            row.resize(width, String::new());
            row
        }));
    }
}

/// Decides whether local and remote content are the same.
///
/// The synchronizer only asks this question, so a cheaper comparison (hashes,
/// cached fingerprints) can be dropped in without touching its control flow.
pub trait ContentComparison {
    fn matches(&self, local: &Dataset, remote: &Dataset) -> bool;
}

/// Full value-by-value comparison. O(rows x columns).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl ContentComparison for ExactMatch {
    fn matches(&self, local: &Dataset, remote: &Dataset) -> bool {
        local == remote
    }
}

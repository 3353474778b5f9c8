// src/remote.rs
// Spreadsheet service abstraction and the remote tab reader.

use tracing::{debug, instrument};

use crate::data_types::Dataset;
use crate::error::{Result, SyncError};

/// An opened spreadsheet document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: String,
}

/// A tab inside a [`Book`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabRef {
    pub sheet_id: i32,
    pub title: String,
}

/// Operations the synchronizer needs from a spreadsheet backend.
///
/// Row indices are 1-based, as in the spreadsheet UI. `delete_tab` reports a
/// tab that vanished in the meantime as [`SyncError::TabNotFound`].
#[allow(async_fn_in_trait)]
pub trait SpreadsheetService {
    async fn open(&self, identifier: &str) -> Result<Book>;

    async fn get_tab(&self, book: &Book, name: &str) -> Result<Option<TabRef>>;

    async fn delete_tab(&self, book: &Book, tab: &TabRef) -> Result<()>;

    async fn create_tab(&self, book: &Book, name: &str, rows: usize, cols: usize) -> Result<TabRef>;

    async fn write_rows(&self, book: &Book, tab: &TabRef, rows: &[Vec<String>], start_row: usize) -> Result<()>;

    async fn write_row(&self, book: &Book, tab: &TabRef, row: &[String], index: usize) -> Result<()> {
        self.write_rows(book, tab, &[row.to_vec()], index).await
    }

    /// Raw cell text of the whole tab. Trailing empty cells and rows may be
    /// omitted by the backend.
    async fn read_all_values(&self, book: &Book, tab: &TabRef) -> Result<Vec<Vec<String>>>;
}

/// Reads a tab as a dataset, or `None` when the tab does not exist.
///
/// The first row is the header. Rows are padded to the widest row so that
/// cells the backend left out compare as empty strings.
#[instrument(level = "debug", skip(service, book), fields(book = %book.id))]
pub async fn fetch_tab<S: SpreadsheetService>(
    service: &S,
    book: &Book,
    tab_name: &str,
) -> Result<Option<Dataset>> {
    let Some(tab) = service.get_tab(book, tab_name).await? else {
        debug!("tab not present");
        return Ok(None);
    };

    let values = service.read_all_values(book, &tab).await?;
    Ok(Some(values_to_dataset(values)))
}

pub(crate) fn values_to_dataset(values: Vec<Vec<String>>) -> Dataset {
    let width = values.iter().map(Vec::len).max().unwrap_or(0);
    let mut rows = values.into_iter();
    let Some(mut header) = rows.next() else {
        return Dataset::empty();
    };
    header.resize(width, String::new());
    Dataset::new(header, rows.collect())
}

/// True when an error only says the tab is already gone.
pub(crate) fn is_not_found(error: &SyncError) -> bool {
    matches!(error, SyncError::TabNotFound(_))
}

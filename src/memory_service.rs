// src/memory_service.rs
// In-memory spreadsheet backend.
//
// Mirrors what the Sheets API exposes to this crate: tabs addressed by title
// and numeric id, 1-based row writes, and reads that omit trailing empty
// cells and rows. Every mutating call is recorded so callers can inspect the
// exact write sequence.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::{Result, SyncError};
use crate::remote::{Book, SpreadsheetService, TabRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DeleteTab { title: String },
    CreateTab { title: String, rows: usize, cols: usize },
    WriteRows { title: String, start_row: usize, count: usize },
}

#[derive(Debug, Default)]
struct MemoryTab {
    sheet_id: i32,
    title: String,
    rows: usize,
    cols: usize,
    cells: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
struct State {
    books: BTreeMap<String, Vec<MemoryTab>>,
    next_sheet_id: i32,
    calls: Vec<Call>,
    fail_writes_after: Option<usize>,
    vanish_before_delete: bool,
}

#[derive(Debug, Default)]
pub struct MemorySheets {
    state: Mutex<State>,
}

impl MemorySheets {
    pub fn new() -> Self {
        MemorySheets::default()
    }

    /// Registers an empty spreadsheet so that `open` succeeds for it.
    pub fn add_book(&self, id: &str) {
        self.lock().books.entry(id.to_string()).or_default();
    }

    /// Seeds a tab with raw cell values.
    pub fn put_tab(&self, book: &str, title: &str, values: Vec<Vec<String>>) {
        let mut state = self.lock();
        state.next_sheet_id += 1;
        let sheet_id = state.next_sheet_id;
        let rows = values.len();
        let cols = values.iter().map(Vec::len).max().unwrap_or(0);
        let tabs = state.books.entry(book.to_string()).or_default();
        tabs.retain(|tab| tab.title != title);
        tabs.push(MemoryTab {
            sheet_id,
            title: title.to_string(),
            rows,
            cols,
            cells: values,
        });
    }

    /// Cell values of a tab as stored, without trimming.
    pub fn tab_values(&self, book: &str, title: &str) -> Option<Vec<Vec<String>>> {
        let state = self.lock();
        state
            .books
            .get(book)?
            .iter()
            .find(|tab| tab.title == title)
            .map(|tab| tab.cells.clone())
    }

    /// Grid dimensions (rows, cols) a tab was created with.
    pub fn tab_size(&self, book: &str, title: &str) -> Option<(usize, usize)> {
        let state = self.lock();
        state
            .books
            .get(book)?
            .iter()
            .find(|tab| tab.title == title)
            .map(|tab| (tab.rows, tab.cols))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Makes every `write_rows` call after the first `n` fail.
    pub fn fail_writes_after(&self, n: usize) {
        self.lock().fail_writes_after = Some(n);
    }

    /// Makes the next `delete_tab` find its tab already gone, as when
    /// someone removes it between our lookup and our delete.
    pub fn vanish_before_delete(&self) {
        self.lock().vanish_before_delete = true;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-call; the data is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn find_tab<'a>(state: &'a mut State, book: &Book, sheet_id: i32) -> Option<&'a mut MemoryTab> {
    state
        .books
        .get_mut(&book.id)?
        .iter_mut()
        .find(|tab| tab.sheet_id == sheet_id)
}

impl SpreadsheetService for MemorySheets {
    async fn open(&self, identifier: &str) -> Result<Book> {
        let state = self.lock();
        if state.books.contains_key(identifier) {
            Ok(Book {
                id: identifier.to_string(),
            })
        } else {
            Err(SyncError::RemoteAccess(format!(
                "spreadsheet '{identifier}' not found"
            )))
        }
    }

    async fn get_tab(&self, book: &Book, name: &str) -> Result<Option<TabRef>> {
        let state = self.lock();
        let tabs = state
            .books
            .get(&book.id)
            .ok_or_else(|| SyncError::RemoteAccess(format!("unknown spreadsheet '{}'", book.id)))?;
        Ok(tabs.iter().find(|tab| tab.title == name).map(|tab| TabRef {
            sheet_id: tab.sheet_id,
            title: tab.title.clone(),
        }))
    }

    async fn delete_tab(&self, book: &Book, tab: &TabRef) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::DeleteTab {
            title: tab.title.clone(),
        });
        let vanish = std::mem::take(&mut state.vanish_before_delete);
        let tabs = state
            .books
            .get_mut(&book.id)
            .ok_or_else(|| SyncError::RemoteAccess(format!("unknown spreadsheet '{}'", book.id)))?;
        let before = tabs.len();
        tabs.retain(|t| t.sheet_id != tab.sheet_id);
        if vanish || tabs.len() == before {
            return Err(SyncError::TabNotFound(tab.title.clone()));
        }
        Ok(())
    }

    async fn create_tab(&self, book: &Book, name: &str, rows: usize, cols: usize) -> Result<TabRef> {
        let mut state = self.lock();
        state.calls.push(Call::CreateTab {
            title: name.to_string(),
            rows,
            cols,
        });
        state.next_sheet_id += 1;
        let sheet_id = state.next_sheet_id;
        let tabs = state
            .books
            .get_mut(&book.id)
            .ok_or_else(|| SyncError::RemoteAccess(format!("unknown spreadsheet '{}'", book.id)))?;
        if tabs.iter().any(|tab| tab.title == name) {
            return Err(SyncError::RemoteAccess(format!(
                "a sheet with the name \"{name}\" already exists"
            )));
        }
        tabs.push(MemoryTab {
            sheet_id,
            title: name.to_string(),
            rows,
            cols,
            cells: vec![vec![String::new(); cols]; rows],
        });
        Ok(TabRef {
            sheet_id,
            title: name.to_string(),
        })
    }

    async fn write_rows(&self, book: &Book, tab: &TabRef, rows: &[Vec<String>], start_row: usize) -> Result<()> {
        let mut state = self.lock();
        let writes_so_far = state
            .calls
            .iter()
            .filter(|call| matches!(call, Call::WriteRows { .. }))
            .count();
        if state.fail_writes_after.is_some_and(|limit| writes_so_far >= limit) {
            return Err(SyncError::RemoteAccess("quota exceeded".into()));
        }
        state.calls.push(Call::WriteRows {
            title: tab.title.clone(),
            start_row,
            count: rows.len(),
        });

        let target = find_tab(&mut state, book, tab.sheet_id)
            .ok_or_else(|| SyncError::TabNotFound(tab.title.clone()))?;
        if start_row == 0 {
            return Err(SyncError::RemoteAccess("row indices start at 1".into()));
        }
        for (offset, row) in rows.iter().enumerate() {
            let index = start_row - 1 + offset;
            if target.cells.len() <= index {
                target.cells.resize(index + 1, Vec::new());
                target.rows = target.rows.max(index + 1);
            }
            let cells = &mut target.cells[index];
            if cells.len() < row.len() {
                cells.resize(row.len(), String::new());
                target.cols = target.cols.max(row.len());
            }
            cells[..row.len()].clone_from_slice(row);
        }
        Ok(())
    }

    async fn read_all_values(&self, book: &Book, tab: &TabRef) -> Result<Vec<Vec<String>>> {
        let mut state = self.lock();
        let target = find_tab(&mut state, book, tab.sheet_id)
            .ok_or_else(|| SyncError::TabNotFound(tab.title.clone()))?;

        let mut values: Vec<Vec<String>> = target
            .cells
            .iter()
            .map(|row| {
                let used = row.iter().rposition(|cell| !cell.is_empty()).map_or(0, |i| i + 1);
                row[..used].to_vec()
            })
            .collect();
        while values.last().is_some_and(Vec::is_empty) {
            values.pop();
        }
        Ok(values)
    }
}

// src/synchronizer.rs
// Compare-then-replace logic for a single tab.

use tracing::{debug, info, instrument, warn};

use crate::config::DEFAULT_BATCH_SIZE;
use crate::data_types::{ContentComparison, Dataset, ExactMatch};
use crate::error::Result;
use crate::remote::{self, Book, SpreadsheetService};

/// What the comparison concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Remote tab does not exist.
    Create,
    /// Remote tab exists with different content.
    Replace,
    Unchanged,
}

impl Decision {
    pub fn needs_write(self) -> bool {
        !matches!(self, Decision::Unchanged)
    }
}

pub struct Synchronizer<C = ExactMatch> {
    comparison: C,
    batch_size: usize,
    dry_run: bool,
}

impl Synchronizer<ExactMatch> {
    pub fn new(batch_size: usize) -> Self {
        Synchronizer::with_comparison(ExactMatch, batch_size)
    }
}

impl Default for Synchronizer<ExactMatch> {
    fn default() -> Self {
        Synchronizer::new(DEFAULT_BATCH_SIZE)
    }
}

impl<C: ContentComparison> Synchronizer<C> {
    pub fn with_comparison(comparison: C, batch_size: usize) -> Self {
        Synchronizer {
            comparison,
            batch_size: batch_size.max(1),
            dry_run: false,
        }
    }

    /// Compare only; never touch the remote tab.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn decide(&self, local: &Dataset, remote: Option<&Dataset>) -> Decision {
        match remote {
            None => Decision::Create,
            Some(remote) if self.comparison.matches(local, remote) => Decision::Unchanged,
            Some(_) => Decision::Replace,
        }
    }

    /// Brings the tab in line with `local` and returns what was decided.
    /// In dry-run mode the decision is returned without writing.
    #[instrument(level = "debug", skip(self, service, book, local, remote), fields(book = %book.id))]
    pub async fn sync<S: SpreadsheetService>(
        &self,
        service: &S,
        book: &Book,
        tab_name: &str,
        local: &Dataset,
        remote: Option<&Dataset>,
    ) -> Result<Decision> {
        let decision = self.decide(local, remote);
        debug!(?decision, "compared");

        if decision.needs_write() && !self.dry_run {
            self.replace(service, book, tab_name, local).await?;
        }
        Ok(decision)
    }

    /// Deletes the tab if present, recreates it sized to the data, writes the
    /// header at row 1 and the data rows in batches from row 2.
    ///
    /// Nothing is rolled back if a step fails part-way.
    pub async fn replace<S: SpreadsheetService>(
        &self,
        service: &S,
        book: &Book,
        tab_name: &str,
        local: &Dataset,
    ) -> Result<()> {
        if let Some(existing) = service.get_tab(book, tab_name).await? {
            match service.delete_tab(book, &existing).await {
                Ok(()) => debug!(sheet_id = existing.sheet_id, "deleted existing tab"),
                Err(error) if remote::is_not_found(&error) => {
                    warn!("tab vanished before delete; continuing")
                }
                Err(error) => return Err(error),
            }
        }

        let rows = (local.row_count() + 1).max(1);
        let cols = local.column_count().max(1);
        let tab = service.create_tab(book, tab_name, rows, cols).await?;
        debug!(sheet_id = tab.sheet_id, rows, cols, "created tab");

        if local.column_count() > 0 {
            service.write_row(book, &tab, local.columns(), 1).await?;
        }

        for (index, start_row, chunk) in batches(local.rows(), self.batch_size) {
            debug!(batch = index, start_row, size = chunk.len(), "writing batch");
            service.write_rows(book, &tab, chunk, start_row).await?;
        }

        info!(rows = local.row_count(), columns = local.column_count(), "tab replaced");
        Ok(())
    }
}

/// Splits data rows into `(batch index, 1-based start row, rows)` with the
/// header occupying row 1.
fn batches(rows: &[Vec<String>], batch_size: usize) -> impl Iterator<Item = (usize, usize, &[Vec<String>])> {
    rows.chunks(batch_size)
        .enumerate()
        .map(move |(index, chunk)| (index, index * batch_size + 2, chunk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_service::{Call, MemorySheets};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn numbered(rows: usize) -> Dataset {
        Dataset::new(
            strings(&["n", "label"]),
            (0..rows).map(|i| vec![i.to_string(), format!("row {i}")]).collect(),
        )
    }

    #[test]
    fn batches_cover_rows_once_in_order() {
        let data = numbered(250);
        let plan: Vec<(usize, usize)> = batches(data.rows(), 100)
            .map(|(_, start, chunk)| (start, chunk.len()))
            .collect();
        assert_eq!(plan, vec![(2, 100), (102, 100), (202, 50)]);

        let flattened: Vec<&Vec<String>> = batches(data.rows(), 100)
            .flat_map(|(_, _, chunk)| chunk.iter())
            .collect();
        assert_eq!(flattened.len(), 250);
        assert!(flattened.iter().zip(data.rows()).all(|(a, b)| *a == b));
    }

    #[test]
    fn decision_rules() {
        let sync = Synchronizer::new(100);
        let local = numbered(2);
        assert_eq!(sync.decide(&local, None), Decision::Create);
        assert_eq!(sync.decide(&local, Some(&numbered(2))), Decision::Unchanged);
        assert_eq!(sync.decide(&local, Some(&numbered(3))), Decision::Replace);
    }

    #[test]
    fn custom_comparison_is_honoured() {
        struct Always;
        impl ContentComparison for Always {
            fn matches(&self, _: &Dataset, _: &Dataset) -> bool {
                true
            }
        }
        let sync = Synchronizer::with_comparison(Always, 10);
        assert_eq!(sync.decide(&numbered(1), Some(&numbered(5))), Decision::Unchanged);
        assert_eq!(sync.decide(&numbered(1), None), Decision::Create);
    }

    #[tokio::test]
    async fn replace_writes_header_then_batches() {
        let sheets = MemorySheets::new();
        sheets.put_tab("book", "data", vec![strings(&["old"]), strings(&["stale"])]);
        let book = sheets.open("book").await.unwrap();
        let local = numbered(250);

        Synchronizer::new(100)
            .replace(&sheets, &book, "data", &local)
            .await
            .unwrap();

        assert_eq!(
            sheets.calls(),
            vec![
                Call::DeleteTab { title: "data".into() },
                Call::CreateTab { title: "data".into(), rows: 251, cols: 2 },
                Call::WriteRows { title: "data".into(), start_row: 1, count: 1 },
                Call::WriteRows { title: "data".into(), start_row: 2, count: 100 },
                Call::WriteRows { title: "data".into(), start_row: 102, count: 100 },
                Call::WriteRows { title: "data".into(), start_row: 202, count: 50 },
            ]
        );

        let values = sheets.tab_values("book", "data").unwrap();
        assert_eq!(values.len(), 251);
        assert_eq!(values[0], strings(&["n", "label"]));
        assert_eq!(values[1], strings(&["0", "row 0"]));
        assert_eq!(values[250], strings(&["249", "row 249"]));
    }

    #[tokio::test]
    async fn tab_vanishing_before_delete_is_still_rewritten() {
        let sheets = MemorySheets::new();
        sheets.put_tab("book", "data", vec![strings(&["old"]), strings(&["stale"])]);
        sheets.vanish_before_delete();
        let book = sheets.open("book").await.unwrap();
        let local = numbered(250);

        Synchronizer::new(100)
            .replace(&sheets, &book, "data", &local)
            .await
            .unwrap();

        assert_eq!(
            sheets.calls(),
            vec![
                Call::DeleteTab { title: "data".into() },
                Call::CreateTab { title: "data".into(), rows: 251, cols: 2 },
                Call::WriteRows { title: "data".into(), start_row: 1, count: 1 },
                Call::WriteRows { title: "data".into(), start_row: 2, count: 100 },
                Call::WriteRows { title: "data".into(), start_row: 102, count: 100 },
                Call::WriteRows { title: "data".into(), start_row: 202, count: 50 },
            ]
        );
        let values = sheets.tab_values("book", "data").unwrap();
        assert_eq!(values.len(), 251);
        assert_eq!(values[0], strings(&["n", "label"]));
        assert_eq!(values[250], strings(&["249", "row 249"]));
    }

    #[tokio::test]
    async fn missing_tab_is_created_without_delete() {
        let sheets = MemorySheets::new();
        sheets.add_book("book");
        let book = sheets.open("book").await.unwrap();

        let decision = Synchronizer::new(100)
            .sync(&sheets, &book, "fresh", &numbered(3), None)
            .await
            .unwrap();

        assert_eq!(decision, Decision::Create);
        assert!(!sheets
            .calls()
            .iter()
            .any(|call| matches!(call, Call::DeleteTab { .. })));
        assert_eq!(sheets.tab_size("book", "fresh"), Some((4, 2)));
    }

    #[tokio::test]
    async fn empty_dataset_creates_minimal_tab() {
        let sheets = MemorySheets::new();
        sheets.add_book("book");
        let book = sheets.open("book").await.unwrap();

        Synchronizer::new(100)
            .replace(&sheets, &book, "blank", &Dataset::empty())
            .await
            .unwrap();

        assert_eq!(
            sheets.calls(),
            vec![Call::CreateTab { title: "blank".into(), rows: 1, cols: 1 }]
        );
    }

    #[tokio::test]
    async fn dry_run_leaves_remote_untouched() {
        let sheets = MemorySheets::new();
        sheets.add_book("book");
        let book = sheets.open("book").await.unwrap();

        let decision = Synchronizer::new(100)
            .dry_run(true)
            .sync(&sheets, &book, "fresh", &numbered(3), None)
            .await
            .unwrap();

        assert_eq!(decision, Decision::Create);
        assert!(sheets.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_batch_propagates_and_leaves_partial_write() {
        let sheets = MemorySheets::new();
        sheets.add_book("book");
        let book = sheets.open("book").await.unwrap();
        sheets.fail_writes_after(2);

        let result = Synchronizer::new(10)
            .replace(&sheets, &book, "data", &numbered(30))
            .await;

        assert!(result.is_err());
        let values = sheets.tab_values("book", "data").unwrap();
        assert_eq!(values[0], strings(&["n", "label"]));
        assert_eq!(values[10], strings(&["9", "row 9"]));
        assert_eq!(values[11], strings(&["", ""]));
    }
}

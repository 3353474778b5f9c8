// src/runner.rs
// Drives every configured target through load, fetch, compare and write.

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{SpreadsheetEntry, SyncConfig, Target};
use crate::data_types::{ContentComparison, ExactMatch};
use crate::error::{Result, SyncError};
use crate::loader::Loader;
use crate::remote::{self, Book, SpreadsheetService};
use crate::synchronizer::{Decision, Synchronizer};

/// Terminal state of one target after a run.
#[derive(Debug)]
pub enum Outcome {
    /// Source path missing; nothing was read or written.
    Skipped(PathBuf),
    NoChange,
    Replaced { rows: usize, created: bool },
    /// Dry run found a difference.
    WouldReplace { rows: usize, created: bool },
    Failed(SyncError),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Skipped(_) => "skipped",
            Outcome::NoChange => "no-change",
            Outcome::Replaced { .. } => "replaced",
            Outcome::WouldReplace { .. } => "would-replace",
            Outcome::Failed(_) => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct TargetReport {
    pub target: Target,
    pub outcome: Outcome,
}

impl fmt::Display for TargetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} <- {}", self.outcome.label(), self.target.tab, self.target.path.display())?;
        match &self.outcome {
            Outcome::Skipped(path) => write!(f, ": path not found ({})", path.display()),
            Outcome::NoChange => Ok(()),
            Outcome::Replaced { rows, created } | Outcome::WouldReplace { rows, created } => {
                let verb = if *created { "new tab" } else { "content changed" };
                write!(f, ": {verb}, {rows} rows")
            }
            Outcome::Failed(error) => write!(f, ": {error}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub targets: Vec<TargetReport>,
}

impl RunReport {
    pub fn count(&self, label: &str) -> usize {
        self.targets.iter().filter(|t| t.outcome.label() == label).count()
    }

    pub fn failures(&self) -> usize {
        self.targets.iter().filter(|t| t.outcome.is_failure()).count()
    }

    pub fn find(&self, tab: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|t| t.target.tab == tab)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
}

/// Processes every target of `config` in order.
///
/// Only an invalid configuration aborts the run. A spreadsheet that cannot
/// be opened fails its own targets; any other error fails just its target.
pub async fn run<S: SpreadsheetService>(
    service: &S,
    config: &SyncConfig,
    options: RunOptions,
) -> Result<RunReport> {
    run_with(service, config, options, ExactMatch).await
}

/// Same as [`run`] with a custom content comparison.
pub async fn run_with<S: SpreadsheetService, C: ContentComparison>(
    service: &S,
    config: &SyncConfig,
    options: RunOptions,
    comparison: C,
) -> Result<RunReport> {
    config.validate()?;
    let loader = Loader::new(config.encoding_chain()?);
    let synchronizer =
        Synchronizer::with_comparison(comparison, config.batch_size).dry_run(options.dry_run);

    let mut report = RunReport::default();
    for entry in &config.spreadsheets {
        let span = info_span!("spreadsheet", id = %entry.spreadsheet);
        process_spreadsheet(service, &loader, &synchronizer, entry, &mut report)
            .instrument(span)
            .await;
    }

    info!(
        targets = report.targets.len(),
        replaced = report.count("replaced"),
        unchanged = report.count("no-change"),
        skipped = report.count("skipped"),
        failed = report.failures(),
        "run finished"
    );
    Ok(report)
}

async fn process_spreadsheet<S: SpreadsheetService, C: ContentComparison>(
    service: &S,
    loader: &Loader,
    synchronizer: &Synchronizer<C>,
    entry: &SpreadsheetEntry,
    report: &mut RunReport,
) {
    info!(tabs = entry.tabs.len(), "processing spreadsheet");

    let book = match service.open(&entry.spreadsheet).await {
        Ok(book) => book,
        Err(error) => {
            error!(%error, "cannot open spreadsheet; failing its targets");
            let message = match error {
                SyncError::RemoteAccess(message) => message,
                other => other.to_string(),
            };
            report.targets.extend(entry.targets().map(|target| TargetReport {
                target,
                outcome: Outcome::Failed(SyncError::RemoteAccess(message.clone())),
            }));
            return;
        }
    };

    for target in entry.targets() {
        let span = info_span!("target", tab = %target.tab, path = %target.path.display());
        let outcome = process_target(service, loader, synchronizer, &book, &target)
            .instrument(span)
            .await;
        report.targets.push(TargetReport { target, outcome });
    }
}

/// `PENDING -> LOADED -> COMPARED -> {NO_CHANGE | REPLACED | FAILED}`, or
/// `SKIPPED` straight from `PENDING` when the source path is missing.
async fn process_target<S: SpreadsheetService, C: ContentComparison>(
    service: &S,
    loader: &Loader,
    synchronizer: &Synchronizer<C>,
    book: &Book,
    target: &Target,
) -> Outcome {
    let local = match loader.load(&target.path) {
        Ok(local) => local,
        Err(SyncError::PathNotFound(path)) => {
            warn!(path = %path.display(), "source path not found; skipping");
            return Outcome::Skipped(path);
        }
        Err(error) => {
            error!(%error, "failed to load source");
            return Outcome::Failed(error);
        }
    };
    debug!(rows = local.row_count(), columns = local.column_count(), "loaded");

    let remote = match remote::fetch_tab(service, book, &target.tab).await {
        Ok(remote) => remote,
        Err(error) => {
            error!(%error, "failed to read remote tab");
            return Outcome::Failed(error);
        }
    };

    let rows = local.row_count();
    match synchronizer
        .sync(service, book, &target.tab, &local, remote.as_ref())
        .await
    {
        Ok(Decision::Unchanged) => {
            info!("no changes");
            Outcome::NoChange
        }
        Ok(decision) => {
            let created = decision == Decision::Create;
            if synchronizer.is_dry_run() {
                info!(created, "would replace");
                Outcome::WouldReplace { rows, created }
            } else {
                info!(created, rows, "replaced");
                Outcome::Replaced { rows, created }
            }
        }
        Err(error) => {
            error!(%error, "failed to replace tab");
            Outcome::Failed(error)
        }
    }
}

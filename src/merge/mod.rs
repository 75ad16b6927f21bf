pub mod group;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::progress::{Phase, ProgressReporter};
use crate::table::TableStore;

pub use group::{discover_groups, group_files, DirectoryGroups, MergeGroup};

#[derive(Debug, Clone, PartialEq)]
pub enum MergeState {
    /// No continuation files; the main file was not touched.
    NoSecondaries,
    /// Dry run: the group would be merged.
    WouldMerge,
    Merged,
    MergeFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteResult {
    Deleted,
    DeleteFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    pub path: PathBuf,
    pub result: DeleteResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub main_path: PathBuf,
    pub secondaries: Vec<PathBuf>,
    pub state: MergeState,
    pub rows_written: usize,
    pub deletions: Vec<DeleteOutcome>,
}

#[derive(Debug, Clone, Default)]
pub struct MergeSummary {
    pub processed: usize,
    pub merged: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Groups a dry run would have merged.
    pub pending: usize,
    pub delete_failures: usize,
    pub orphans: Vec<PathBuf>,
    pub outcomes: Vec<MergeOutcome>,
    pub cancelled: bool,
}

impl MergeSummary {
    pub fn failures(&self) -> impl Iterator<Item = &MergeOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, MergeState::MergeFailed(_)))
    }

    pub fn has_errors(&self) -> bool {
        self.failed > 0 || self.delete_failures > 0
    }
}

/// Folds `"{name} (n).csv"` continuation files back into `"{name}.csv"`.
///
/// For each group the main rows come first, then every secondary in
/// ascending suffix order; the result is sorted on the sort column and
/// written over the main file. Secondaries are deleted only after that
/// write succeeded. A failing group never stops the others.
pub struct SecondaryMerger {
    dir: PathBuf,
    sort_column: String,
    dry_run: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl SecondaryMerger {
    pub fn new(dir: &Path, sort_column: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            sort_column: sort_column.to_string(),
            dry_run: false,
            cancel: None,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Checked between merge groups.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Errors only when the directory itself cannot be listed; per-group
    /// failures are recorded in the summary.
    pub fn run(
        &self,
        store: &dyn TableStore,
        reporter: &dyn ProgressReporter,
    ) -> Result<MergeSummary> {
        let start = Instant::now();
        let DirectoryGroups { groups, orphans } = discover_groups(&self.dir)?;
        info!(
            "Processing {} main files in {}",
            groups.len(),
            self.dir.display()
        );

        let total = groups.len();
        reporter.on_phase_start(Phase::Merge, total);

        let mut summary = MergeSummary {
            orphans,
            ..Default::default()
        };

        for group in groups {
            if self.is_cancelled() {
                warn!("Merge cancelled after {} groups", summary.processed);
                summary.cancelled = true;
                break;
            }

            let outcome = self.process_group(&group, store);
            match outcome.state {
                MergeState::NoSecondaries => summary.unchanged += 1,
                MergeState::Merged => summary.merged += 1,
                MergeState::WouldMerge => summary.pending += 1,
                MergeState::MergeFailed(_) => summary.failed += 1,
            }
            summary.delete_failures += outcome
                .deletions
                .iter()
                .filter(|d| matches!(d.result, DeleteResult::DeleteFailed(_)))
                .count();
            summary.outcomes.push(outcome);
            summary.processed += 1;
            reporter.on_progress(summary.processed, total);
        }

        reporter.on_phase_complete(
            Phase::Merge,
            summary.failed + summary.delete_failures,
            start.elapsed().as_secs_f64(),
        );
        info!(
            "Total files processed: {}, files merged: {}, failed: {}",
            summary.processed, summary.merged, summary.failed
        );
        Ok(summary)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn process_group(&self, group: &MergeGroup, store: &dyn TableStore) -> MergeOutcome {
        let mut outcome = MergeOutcome {
            main_path: group.main_path.clone(),
            secondaries: group.secondary_paths.clone(),
            state: MergeState::NoSecondaries,
            rows_written: 0,
            deletions: Vec::new(),
        };

        if !group.has_secondaries() {
            debug!("{}: no secondary files found", group.main_path.display());
            return outcome;
        }

        info!(
            "{}: found {} secondary files",
            group.main_path.display(),
            group.secondary_paths.len()
        );

        if self.dry_run {
            outcome.state = MergeState::WouldMerge;
            return outcome;
        }

        match self.merge_group(group, store) {
            Ok(rows) => {
                outcome.rows_written = rows;
                outcome.state = MergeState::Merged;
                outcome.deletions = delete_secondaries(&group.secondary_paths);
            }
            Err(e) => {
                error!("Failed to merge {}: {}", group.main_path.display(), e);
                outcome.state = MergeState::MergeFailed(e.to_string());
            }
        }
        outcome
    }

    /// Reads, concatenates, sorts and writes. Returns the rows written.
    fn merge_group(&self, group: &MergeGroup, store: &dyn TableStore) -> Result<usize> {
        let mut merged = store.read_table(&group.main_path)?;
        debug!(
            "Main file: {} ({} rows)",
            group.main_path.display(),
            merged.len()
        );

        for secondary in &group.secondary_paths {
            let table = store.read_table(secondary)?;
            debug!(
                "Secondary file: {} ({} rows)",
                secondary.display(),
                table.len()
            );
            merged.append(table);
        }

        merged.sort_by_column(&self.sort_column, &group.main_path)?;
        store.write_table(&group.main_path, &merged)?;

        info!(
            "Merged file saved: {} ({} total rows)",
            group.main_path.display(),
            merged.len()
        );
        Ok(merged.len())
    }
}

fn delete_secondaries(paths: &[PathBuf]) -> Vec<DeleteOutcome> {
    paths
        .iter()
        .map(|path| {
            let result = match fs::remove_file(path) {
                Ok(()) => {
                    debug!("Deleted: {}", path.display());
                    DeleteResult::Deleted
                }
                Err(e) => {
                    error!("Error deleting {}: {}", path.display(), e);
                    DeleteResult::DeleteFailed(e.to_string())
                }
            };
            DeleteOutcome {
                path: path.clone(),
                result,
            }
        })
        .collect()
}

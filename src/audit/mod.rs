pub mod existence;
pub mod reconcile;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::codec::SourceId;
use crate::grid::{GridCell, GridEnumerator};
use crate::progress::ProgressReporter;
use crate::table::RowCounter;

pub use existence::ExistenceResult;
pub use reconcile::ReconcileResult;

/// An expected fingerprint file that is not on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingFile {
    pub cell: GridCell,
    pub source: SourceId,
    pub path: PathBuf,
}

/// A cell whose aggregate file does not hold the sum of its per-source rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RowMismatch {
    pub cell: GridCell,
    pub expected_sum: usize,
    pub actual_aggregate: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DatasetReport {
    pub missing: Vec<MissingFile>,
    pub mismatches: Vec<RowMismatch>,
    pub cells_checked: usize,
    /// Row reconciliation did not run because files are missing.
    pub phase2_skipped: bool,
    pub cancelled: bool,
}

impl DatasetReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.mismatches.is_empty() && !self.cancelled
    }
}

/// Checks a fingerprint directory for completeness, then for aggregate
/// row consistency.
pub struct DatasetAuditor {
    base_dir: PathBuf,
    grid: GridEnumerator,
    sources: Vec<SourceId>,
    parallel: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl DatasetAuditor {
    /// `sources` is the working list and should already end with the
    /// aggregate sentinel (see `SourceFilter::with_aggregate`).
    pub fn new(base_dir: &Path, grid: GridEnumerator, sources: Vec<SourceId>) -> Self {
        if !sources.iter().any(SourceId::is_aggregate) {
            warn!("Source list has no aggregate entry; 'all' files will not be checked for existence");
        }
        Self {
            base_dir: base_dir.to_path_buf(),
            grid,
            sources,
            parallel: false,
            cancel: None,
        }
    }

    /// Run the existence checks on the rayon thread pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Checked between grid cells; a raised flag ends the run early with a
    /// partial, `cancelled` report.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn grid(&self) -> &GridEnumerator {
        &self.grid
    }

    pub fn sources(&self) -> &[SourceId] {
        &self.sources
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Phase 1.
    pub fn check_existence(&self, reporter: &dyn ProgressReporter) -> ExistenceResult {
        existence::find_missing(self, reporter)
    }

    /// Phase 2. Only meaningful once `check_existence` found nothing missing.
    pub fn reconcile_rows(
        &self,
        counter: &dyn RowCounter,
        reporter: &dyn ProgressReporter,
    ) -> ReconcileResult {
        reconcile::find_mismatches(self, counter, reporter)
    }

    /// Runs both phases. Reconciliation is skipped when any file is missing.
    pub fn audit(&self, counter: &dyn RowCounter, reporter: &dyn ProgressReporter) -> DatasetReport {
        info!(
            "Auditing {} cells x {} sources in {}",
            self.grid.len(),
            self.sources.len(),
            self.base_dir.display()
        );

        let existence = self.check_existence(reporter);
        let mut report = DatasetReport {
            missing: existence.missing,
            mismatches: Vec::new(),
            cells_checked: existence.cells_checked,
            phase2_skipped: false,
            cancelled: existence.cancelled,
        };

        if report.cancelled {
            warn!("Audit cancelled after {} cells", report.cells_checked);
            report.phase2_skipped = true;
            return report;
        }

        if !report.missing.is_empty() {
            warn!(
                "{} expected files are missing, skipping row reconciliation",
                report.missing.len()
            );
            report.phase2_skipped = true;
            return report;
        }

        let reconciled = self.reconcile_rows(counter, reporter);
        report.mismatches = reconciled.mismatches;
        report.cells_checked = reconciled.cells_checked;
        report.cancelled = reconciled.cancelled;

        info!(
            "Audit finished: {} missing, {} mismatches",
            report.missing.len(),
            report.mismatches.len()
        );
        report
    }
}

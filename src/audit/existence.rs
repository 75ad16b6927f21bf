use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

use super::{DatasetAuditor, MissingFile};
use crate::codec::{fingerprint_path, SourceId};
use crate::grid::GridCell;
use crate::progress::{Phase, ProgressReporter};

#[derive(Debug, Clone, Default)]
pub struct ExistenceResult {
    /// In grid order, then source-list order within a cell.
    pub missing: Vec<MissingFile>,
    pub cells_checked: usize,
    pub cancelled: bool,
}

/// Tests every (cell, source) pair. Never stops at the first miss.
pub(super) fn find_missing(
    auditor: &DatasetAuditor,
    reporter: &dyn ProgressReporter,
) -> ExistenceResult {
    let start = Instant::now();
    let total = auditor.grid().len();
    reporter.on_phase_start(Phase::Existence, total);

    let result = if auditor.parallel {
        find_missing_parallel(auditor, reporter)
    } else {
        find_missing_sequential(auditor, reporter)
    };

    let duration = start.elapsed();
    reporter.on_phase_complete(Phase::Existence, result.missing.len(), duration.as_secs_f64());
    info!(
        "Existence check: {} cells, {} missing files in {:.2}s",
        result.cells_checked,
        result.missing.len(),
        duration.as_secs_f64()
    );
    result
}

fn find_missing_sequential(
    auditor: &DatasetAuditor,
    reporter: &dyn ProgressReporter,
) -> ExistenceResult {
    let total = auditor.grid().len();
    let mut result = ExistenceResult::default();

    for cell in auditor.grid() {
        if auditor.is_cancelled() {
            result.cancelled = true;
            break;
        }
        result
            .missing
            .extend(missing_in_cell(auditor.base_dir(), &cell, auditor.sources()));
        result.cells_checked += 1;
        reporter.on_progress(result.cells_checked, total);
    }

    result
}

fn find_missing_parallel(
    auditor: &DatasetAuditor,
    reporter: &dyn ProgressReporter,
) -> ExistenceResult {
    let total = auditor.grid().len();
    let done = AtomicUsize::new(0);
    let cells: Vec<GridCell> = auditor.grid().iter().collect();

    // Indexed collect keeps grid order regardless of scheduling.
    let per_cell: Vec<Option<Vec<MissingFile>>> = cells
        .par_iter()
        .map(|cell| {
            if auditor.is_cancelled() {
                return None;
            }
            let missing = missing_in_cell(auditor.base_dir(), cell, auditor.sources());
            let checked = done.fetch_add(1, Ordering::Relaxed) + 1;
            reporter.on_progress(checked, total);
            Some(missing)
        })
        .collect();

    grid_order_prefix(per_cell)
}

/// Keeps the cells before the first skipped one, so a cancelled run reports
/// a gap-free prefix of the traversal.
fn grid_order_prefix(per_cell: Vec<Option<Vec<MissingFile>>>) -> ExistenceResult {
    let mut result = ExistenceResult::default();
    for missing in per_cell {
        match missing {
            Some(missing) => {
                result.missing.extend(missing);
                result.cells_checked += 1;
            }
            None => {
                result.cancelled = true;
                break;
            }
        }
    }
    result
}

fn missing_in_cell(base_dir: &Path, cell: &GridCell, sources: &[SourceId]) -> Vec<MissingFile> {
    sources
        .iter()
        .filter_map(|source| {
            let path = fingerprint_path(base_dir, cell, source);
            if path.is_file() {
                None
            } else {
                debug!("Missing fingerprint file {}", path.display());
                Some(MissingFile {
                    cell: *cell,
                    source: source.clone(),
                    path,
                })
            }
        })
        .collect()
}

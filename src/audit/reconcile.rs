use std::time::Instant;
use tracing::{debug, info, warn};

use super::{DatasetAuditor, RowMismatch};
use crate::codec::{fingerprint_path, SourceId};
use crate::grid::GridCell;
use crate::progress::{Phase, ProgressReporter};
use crate::table::RowCounter;

#[derive(Debug, Clone, Default)]
pub struct ReconcileResult {
    pub mismatches: Vec<RowMismatch>,
    pub cells_checked: usize,
    pub cancelled: bool,
}

/// Compares, for every cell, the aggregate row count against the sum of
/// the per-source row counts. An unreadable file counts as zero rows.
pub(super) fn find_mismatches(
    auditor: &DatasetAuditor,
    counter: &dyn RowCounter,
    reporter: &dyn ProgressReporter,
) -> ReconcileResult {
    let start = Instant::now();
    let total = auditor.grid().len();
    reporter.on_phase_start(Phase::Reconciliation, total);

    let mut result = ReconcileResult::default();
    for cell in auditor.grid() {
        if auditor.is_cancelled() {
            result.cancelled = true;
            break;
        }

        if let Some(mismatch) = reconcile_cell(auditor, counter, &cell) {
            result.mismatches.push(mismatch);
        }
        result.cells_checked += 1;
        reporter.on_progress(result.cells_checked, total);
    }

    let duration = start.elapsed();
    reporter.on_phase_complete(
        Phase::Reconciliation,
        result.mismatches.len(),
        duration.as_secs_f64(),
    );
    info!(
        "Row reconciliation: {} cells, {} mismatches in {:.2}s",
        result.cells_checked,
        result.mismatches.len(),
        duration.as_secs_f64()
    );
    result
}

fn reconcile_cell(
    auditor: &DatasetAuditor,
    counter: &dyn RowCounter,
    cell: &GridCell,
) -> Option<RowMismatch> {
    let expected_sum: usize = auditor
        .sources()
        .iter()
        .filter(|source| !source.is_aggregate())
        .map(|source| rows_or_zero(auditor, counter, cell, source))
        .sum();
    let actual_aggregate = rows_or_zero(auditor, counter, cell, &SourceId::Aggregate);

    if expected_sum == actual_aggregate {
        debug!(
            "Cell ({}, {}, {}) consistent with {} rows",
            cell.x, cell.y, cell.z, actual_aggregate
        );
        None
    } else {
        warn!(
            "Cell ({}, {}, {}): sum of sources = {}, all = {}",
            cell.x, cell.y, cell.z, expected_sum, actual_aggregate
        );
        Some(RowMismatch {
            cell: *cell,
            expected_sum,
            actual_aggregate,
        })
    }
}

fn rows_or_zero(
    auditor: &DatasetAuditor,
    counter: &dyn RowCounter,
    cell: &GridCell,
    source: &SourceId,
) -> usize {
    let path = fingerprint_path(auditor.base_dir(), cell, source);
    match counter.count_rows(&path) {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Error reading file {}: {}", path.display(), e);
            0
        }
    }
}

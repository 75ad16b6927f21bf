use std::fmt;

/// Long-running passes the engine reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Existence,
    Reconciliation,
    Merge,
    Duration,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Existence => "Checking files",
            Phase::Reconciliation => "Reconciling rows",
            Phase::Merge => "Merging secondary files",
            Phase::Duration => "Checking durations",
        };
        f.write_str(label)
    }
}

/// Trait for reporting progress.
///
/// CLI implements with indicatif progress bars, tests use `SilentReporter`.
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_phase_start(&self, _phase: Phase, _total: usize) {}
    fn on_progress(&self, _done: usize, _total: usize) {}
    fn on_phase_complete(&self, _phase: Phase, _issues: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

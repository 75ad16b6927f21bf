use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::progress::{Phase, ProgressReporter};
use crate::table::TableStore;
use crate::utils::path::list_csv_files;

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const DEFAULT_MAX_DURATION_SECS: f64 = 120.0;
pub const DEFAULT_MARGIN_SECS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FileDuration {
    pub file: String,
    pub duration_secs: f64,
    /// Milliseconds since the epoch.
    pub first_timestamp: f64,
    pub last_timestamp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DurationViolation {
    pub span: FileDuration,
    pub excess_secs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DurationError {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct DurationReport {
    pub max_duration_secs: f64,
    pub margin_secs: f64,
    pub total: usize,
    pub valid: Vec<FileDuration>,
    /// Longest first.
    pub invalid: Vec<DurationViolation>,
    pub errors: Vec<DurationError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationStatus {
    AllPassed,
    Failed,
    ErrorsOnly,
}

impl DurationReport {
    pub fn status(&self) -> DurationStatus {
        if !self.invalid.is_empty() {
            DurationStatus::Failed
        } else if !self.errors.is_empty() {
            DurationStatus::ErrorsOnly
        } else {
            DurationStatus::AllPassed
        }
    }
}

/// Checks that each capture in `dir` spans no more than `max_duration_secs`
/// (plus `margin_secs`) between its earliest and latest timestamp.
pub fn check_durations(
    dir: &Path,
    max_duration_secs: f64,
    margin_secs: f64,
    store: &dyn TableStore,
    reporter: &dyn ProgressReporter,
) -> Result<DurationReport> {
    let start = Instant::now();
    let files = list_csv_files(dir)?;
    if files.is_empty() {
        warn!("No '*.csv' files found in {}", dir.display());
    }
    info!(
        "Validating {} files, maximum allowed duration {} (+ {}s margin)",
        files.len(),
        format_duration(max_duration_secs),
        margin_secs
    );

    reporter.on_phase_start(Phase::Duration, files.len());
    let mut report = DurationReport {
        max_duration_secs,
        margin_secs,
        total: files.len(),
        ..Default::default()
    };

    for (i, file) in files.iter().enumerate() {
        match measure_file(&dir.join(file), file, store) {
            Ok(span) if span.duration_secs <= max_duration_secs + margin_secs => {
                debug!("{}: {} (OK)", file, format_duration(span.duration_secs));
                report.valid.push(span);
            }
            Ok(span) => {
                let excess_secs = span.duration_secs - max_duration_secs;
                warn!(
                    "{}: {} exceeds limit by {}",
                    file,
                    format_duration(span.duration_secs),
                    format_duration(excess_secs)
                );
                report.invalid.push(DurationViolation { span, excess_secs });
            }
            Err(e) => {
                warn!("{}: {}", file, e);
                report.errors.push(DurationError {
                    file: file.clone(),
                    reason: e.to_string(),
                });
            }
        }
        reporter.on_progress(i + 1, files.len());
    }

    report
        .invalid
        .sort_by(|a, b| b.span.duration_secs.total_cmp(&a.span.duration_secs));

    reporter.on_phase_complete(
        Phase::Duration,
        report.invalid.len() + report.errors.len(),
        start.elapsed().as_secs_f64(),
    );
    Ok(report)
}

fn measure_file(path: &Path, file: &str, store: &dyn TableStore) -> Result<FileDuration> {
    let table = store.read_table(path)?;
    let index = table
        .column_index(TIMESTAMP_COLUMN)
        .ok_or_else(|| Error::MissingColumn {
            column: TIMESTAMP_COLUMN.to_string(),
            path: path.to_path_buf(),
        })?;
    if table.is_empty() {
        return Err(Error::Other("empty file".to_string()));
    }

    let mut first = f64::INFINITY;
    let mut last = f64::NEG_INFINITY;
    for value in table.column_values(index) {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let ts = value
            .parse::<f64>()
            .map_err(|_| Error::Other(format!("invalid timestamp '{}'", value)))?;
        first = first.min(ts);
        last = last.max(ts);
    }
    if !first.is_finite() || !last.is_finite() {
        return Err(Error::Other("no timestamps".to_string()));
    }

    Ok(FileDuration {
        file: file.to_string(),
        duration_secs: (last - first) / 1000.0,
        first_timestamp: first,
        last_timestamp: last,
    })
}

/// `"2m 5.0s"`, or `"45.3s"` under a minute.
pub fn format_duration(seconds: f64) -> String {
    let minutes = (seconds / 60.0).floor();
    let secs = seconds - minutes * 60.0;
    if minutes > 0.0 {
        format!("{}m {:.1}s", minutes as i64, secs)
    } else {
        format!("{:.1}s", secs)
    }
}

/// Renders an epoch-millisecond timestamp as UTC date and time.
pub fn format_timestamp(millis: f64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis as i64)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Text listing of the files exceeding the limit.
pub fn render_invalid_report(report: &DurationReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(80);
    let _ = writeln!(out, "Invalid Files - Collection Duration Exceeds Limit");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "Maximum allowed duration: {}",
        format_duration(report.max_duration_secs)
    );
    let _ = writeln!(out, "Total invalid files: {}\n", report.invalid.len());
    let _ = writeln!(out, "{:<40} {:>12} {:>12}", "File", "Duration", "Excess");
    let _ = writeln!(out, "{}", "-".repeat(65));
    for v in &report.invalid {
        let _ = writeln!(
            out,
            "{:<40} {:>12} {:>12}",
            v.span.file,
            format_duration(v.span.duration_secs),
            format_duration(v.excess_secs)
        );
    }
    let _ = writeln!(out, "\n\nDetailed Information:");
    let _ = writeln!(out, "{}\n", rule);
    for v in &report.invalid {
        let _ = writeln!(out, "File: {}", v.span.file);
        let _ = writeln!(
            out,
            "  Duration: {} (Exceeds by {})",
            format_duration(v.span.duration_secs),
            format_duration(v.excess_secs)
        );
        let _ = writeln!(
            out,
            "  First timestamp: {} ({})",
            v.span.first_timestamp,
            format_timestamp(v.span.first_timestamp)
        );
        let _ = writeln!(
            out,
            "  Last timestamp:  {} ({})\n",
            v.span.last_timestamp,
            format_timestamp(v.span.last_timestamp)
        );
    }
    out
}

pub fn export_invalid_report(report: &DurationReport, path: &Path) -> Result<()> {
    fs::write(path, render_invalid_report(report))?;
    info!("Invalid files list exported to: {}", path.display());
    Ok(())
}

mod cli;
mod logging;
mod progress_bars;

use std::path::Path;
use std::process;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use cli::{CheckArgs, Cli, Commands, ConfigArgs, DurationArgs, MergeArgs, SplitArgs};
use colored::*;
use dotenv::dotenv;
use progress_bars::CliReporter;
use rssi_grid::duration::{self, DurationStatus};
use rssi_grid::merge::{DeleteResult, MergeState};
use rssi_grid::utils::path::clean_path;
use rssi_grid::utils::prompt::prompt_confirm;
use rssi_grid::{
    split, CsvStore, DatasetAuditor, GridEnumerator, RoomSettings, SecondaryMerger, SourceFilter,
};
use tracing::{error, info, warn};

/// How a command finished, mapped onto the process exit code.
enum Outcome {
    Success,
    ValidationFailed,
    OperationalErrors,
}

impl Outcome {
    fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::ValidationFailed => 1,
            Outcome::OperationalErrors => 2,
        }
    }
}

fn main() {
    dotenv().ok();

    let guard = logging::init_logger();

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Check(args)) => run_check(&args),
        Some(Commands::Merge(args)) => run_merge(&args),
        Some(Commands::Durations(args)) => run_durations(&args),
        Some(Commands::Split(args)) => run_split(&args),
        Some(Commands::PrintConfig(args)) => run_print_config(&args),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(Outcome::Success)
        }
    };

    let code = match result {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => {
            error!("Error: {:#}", err);
            Outcome::OperationalErrors.exit_code()
        }
    };

    // process::exit skips destructors; flush the log file first.
    drop(guard);
    process::exit(code);
}

fn load_configuration(args: &ConfigArgs) -> anyhow::Result<(RoomSettings, SourceFilter)> {
    let mac_filter_file = clean_path(&args.mac_filter_file);
    let room_settings_file = clean_path(&args.room_settings_file);

    let sources = SourceFilter::load(&mac_filter_file)
        .with_context(|| format!("Error loading MAC filter file {}", mac_filter_file.display()))?;
    let room = RoomSettings::load(&room_settings_file).with_context(|| {
        format!(
            "Error loading room settings file {}",
            room_settings_file.display()
        )
    })?;
    Ok((room, sources))
}

fn run_check(args: &CheckArgs) -> anyhow::Result<Outcome> {
    let working_dir = clean_path(&args.working_dir);
    if !working_dir.is_dir() {
        bail!("Folder '{}' does not exist", working_dir.display());
    }
    let (room, sources) = load_configuration(&args.config)?;
    let grid = GridEnumerator::new(&room.offline_grid)?;

    let auditor = DatasetAuditor::new(&working_dir, grid, sources.with_aggregate())
        .with_parallel(args.parallel);
    let reporter = CliReporter::new();
    let report = auditor.audit(&CsvStore, &reporter);

    println!();
    if !report.missing.is_empty() {
        warn!(
            "{} fingerprint files do not exist:",
            format!("{}", report.missing.len()).red()
        );
        for missing in &report.missing {
            println!(" - {}", missing.path.display());
        }
        return Ok(Outcome::ValidationFailed);
    }

    if !report.mismatches.is_empty() {
        warn!(
            "{} positions have mismatched row counts:",
            format!("{}", report.mismatches.len()).red()
        );
        for m in &report.mismatches {
            println!(
                " - Position (X: {:?}, Y: {:?}, Z: {:?}): Sum = {}, All = {}",
                m.cell.x, m.cell.y, m.cell.z, m.expected_sum, m.actual_aggregate
            );
        }
        return Ok(Outcome::ValidationFailed);
    }

    info!(
        "{} {} positions checked, every file present and consistent",
        "OK".green(),
        report.cells_checked
    );
    Ok(Outcome::Success)
}

fn run_merge(args: &MergeArgs) -> anyhow::Result<Outcome> {
    let working_dir = clean_path(&args.working_dir);
    let sort_column = args.sort_column.trim();
    info!("Processing folder: {}", working_dir.display());

    if !args.dry_run && !args.yes {
        let confirmed = prompt_confirm(
            "Merged secondary files will be DELETED. Continue?",
            Some(false),
        )?;
        if !confirmed {
            info!("Nothing changed");
            return Ok(Outcome::Success);
        }
    }

    let merger = SecondaryMerger::new(&working_dir, sort_column).with_dry_run(args.dry_run);
    let reporter = CliReporter::new();
    let summary = merger.run(&CsvStore, &reporter)?;

    println!();
    for outcome in &summary.outcomes {
        match &outcome.state {
            MergeState::NoSecondaries => {}
            MergeState::WouldMerge => println!(
                " ~ {} would absorb {} files",
                outcome.main_path.display(),
                outcome.secondaries.len()
            ),
            MergeState::Merged => {
                println!(
                    " {} {} ({} total rows)",
                    "+".green(),
                    outcome.main_path.display(),
                    outcome.rows_written
                );
                for deletion in &outcome.deletions {
                    if let DeleteResult::DeleteFailed(reason) = &deletion.result {
                        println!(
                            "   {} could not delete {}: {}",
                            "!".red(),
                            deletion.path.display(),
                            reason
                        );
                    }
                }
            }
            MergeState::MergeFailed(reason) => println!(
                " {} {}: {}",
                "x".red(),
                outcome.main_path.display(),
                reason
            ),
        }
    }
    for orphan in &summary.orphans {
        println!(" ? {} has no main file", orphan.display());
    }

    info!("=== Summary ===");
    info!("Total files processed: {}", summary.processed);
    if args.dry_run {
        info!("Files to merge: {}", format!("{}", summary.pending).cyan());
    } else {
        info!("Files merged: {}", format!("{}", summary.merged).green());
    }
    if summary.has_errors() {
        error!(
            "{} merges failed, {} secondary files could not be deleted",
            format!("{}", summary.failed).red(),
            format!("{}", summary.delete_failures).red()
        );
        return Ok(Outcome::OperationalErrors);
    }
    Ok(Outcome::Success)
}

fn run_durations(args: &DurationArgs) -> anyhow::Result<Outcome> {
    let working_dir = clean_path(&args.working_dir);
    info!("Working directory: {}", working_dir.display());

    let reporter = CliReporter::new();
    let report = duration::check_durations(
        &working_dir,
        args.max_duration,
        args.margin,
        &CsvStore,
        &reporter,
    )?;

    if args.show_valid {
        for valid in &report.valid {
            println!(
                " {} {}: {} (OK)",
                "✓".green(),
                valid.file,
                duration::format_duration(valid.duration_secs)
            );
        }
    }

    if !report.invalid.is_empty() {
        println!("\n=== FILES EXCEEDING DURATION LIMIT ===");
        println!("{:<40} {:>12} {:>12}", "File", "Duration", "Excess");
        println!("{}", "-".repeat(65));
        for v in &report.invalid {
            println!(
                "{:<40} {:>12} {:>12}",
                v.span.file,
                duration::format_duration(v.span.duration_secs),
                duration::format_duration(v.excess_secs)
            );
        }
        if let Some(output) = &args.output {
            if let Err(e) = duration::export_invalid_report(&report, &clean_path(output)) {
                warn!("Could not export to file: {}", e);
            }
        }
    }

    let percent = |n: usize| {
        if report.total > 0 {
            n as f64 * 100.0 / report.total as f64
        } else {
            0.0
        }
    };
    println!("\n=== VALIDATION SUMMARY ===");
    println!("Total files analyzed:    {}", report.total);
    println!(
        "Valid files:             {} ({:.1}%)",
        report.valid.len(),
        percent(report.valid.len())
    );
    println!(
        "Invalid files:           {} ({:.1}%)",
        report.invalid.len(),
        percent(report.invalid.len())
    );
    if !report.errors.is_empty() {
        println!(
            "Files with errors:       {} ({:.1}%)",
            report.errors.len(),
            percent(report.errors.len())
        );
    }

    Ok(match report.status() {
        DurationStatus::AllPassed => {
            info!("{}", "ALL FILES PASSED".green());
            Outcome::Success
        }
        DurationStatus::Failed => {
            error!(
                "VALIDATION FAILED - {} file(s) exceed the duration limit",
                report.invalid.len()
            );
            Outcome::ValidationFailed
        }
        DurationStatus::ErrorsOnly => {
            warn!(
                "VALIDATION WARNING - {} file(s) had errors during processing",
                report.errors.len()
            );
            Outcome::OperationalErrors
        }
    })
}

fn run_split(args: &SplitArgs) -> anyhow::Result<Outcome> {
    let csv_file = clean_path(&args.csv_file);
    if !csv_file.is_file() {
        bail!("File '{}' does not exist", csv_file.display());
    }
    let output_dir = match &args.output_dir {
        Some(dir) => clean_path(dir),
        None => csv_file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf(),
    };

    let written = split::split_by_source(&csv_file, &output_dir, &CsvStore)?;
    for path in &written {
        println!(" {} {}", "+".green(), path.display());
    }
    Ok(Outcome::Success)
}

fn run_print_config(args: &ConfigArgs) -> anyhow::Result<Outcome> {
    let (room, sources) = load_configuration(args)?;
    let grid = GridEnumerator::new(&room.offline_grid)?;
    println!("Room settings: {:?}", room);
    println!(
        "Grid: {} x {} = {} positions",
        grid.x_count(),
        grid.y_count(),
        grid.len()
    );
    println!("Sources ({}):", sources.sources().len());
    for source in sources.sources() {
        println!(" - {} -> {}", source, source.file_token());
    }
    Ok(Outcome::Success)
}

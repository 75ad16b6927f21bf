use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "rssi-grid")]
#[command(about = "Integrity checks and cleanup for RSSI fingerprint datasets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check that every grid point has all its files and consistent row counts
    Check(CheckArgs),
    /// Merge "name (n).csv" continuation files into "name.csv"
    Merge(MergeArgs),
    /// Check that no capture spans more than the allowed duration
    Durations(DurationArgs),
    /// Split a trajectory capture into one file per MAC address
    Split(SplitArgs),
    /// Print the loaded grid and source configuration
    PrintConfig(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// JSON file with the list of allowed MAC addresses
    #[arg(long)]
    pub mac_filter_file: String,
    /// JSON file with the room settings (offline_grid)
    #[arg(long)]
    pub room_settings_file: String,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Directory holding the per-point fingerprint files
    #[arg(long)]
    pub working_dir: String,
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Check file existence on all cores
    #[arg(long)]
    pub parallel: bool,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Directory holding the capture files
    #[arg(long)]
    pub working_dir: String,
    /// Column used to order the merged rows
    #[arg(long)]
    pub sort_column: String,
    /// Only report what would be merged
    #[arg(long)]
    pub dry_run: bool,
    /// Do not ask for confirmation before deleting merged files
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct DurationArgs {
    /// Directory holding the capture files
    #[arg(long)]
    pub working_dir: String,
    /// Maximum allowed duration in seconds
    #[arg(long, default_value_t = 120.0)]
    pub max_duration: f64,
    /// Tolerance in seconds added to the maximum
    #[arg(long, default_value_t = 1.0)]
    pub margin: f64,
    /// Also list files that pass
    #[arg(long)]
    pub show_valid: bool,
    /// Export the invalid files list to this text file
    #[arg(long)]
    pub output: Option<String>,
}

#[derive(Debug, Args)]
pub struct SplitArgs {
    /// Trajectory capture to split
    #[arg(long)]
    pub csv_file: String,
    /// Output directory, defaults to the directory of the input file
    #[arg(long)]
    pub output_dir: Option<String>,
}

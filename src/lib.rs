pub mod audit;
pub mod codec;
pub mod config;
pub mod csv_store;
pub mod duration;
pub mod error;
pub mod grid;
pub mod merge;
pub mod progress;
pub mod split;
pub mod table;
pub mod utils;

pub use audit::{DatasetAuditor, DatasetReport, MissingFile, RowMismatch};
pub use codec::{fingerprint_file_name, fingerprint_path, SecondaryName, SourceId};
pub use config::{GridSettings, RoomSettings, SourceFilter};
pub use csv_store::CsvStore;
pub use error::{Error, Result};
pub use grid::{GridCell, GridEnumerator};
pub use merge::{MergeState, MergeSummary, SecondaryMerger};
pub use progress::{Phase, ProgressReporter, SilentReporter};
pub use table::{RowCounter, Table, TableStore};

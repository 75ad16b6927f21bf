//! CSV-backed implementation of the table capabilities.
//!
//! Writes go to a temp file in the destination directory, are synced to
//! disk, then renamed over the target so a crash never leaves a
//! half-written capture behind.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, warn};

use crate::error::Result;
use crate::table::{RowCounter, Table, TableStore};

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvStore;

impl CsvStore {
    pub fn new() -> Self {
        Self
    }
}

impl RowCounter for CsvStore {
    fn count_rows(&self, path: &Path) -> Result<usize> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let mut count = 0usize;
        for record in reader.records() {
            record?;
            count += 1;
        }
        Ok(count)
    }
}

impl TableStore for CsvStore {
    fn read_table(&self, path: &Path) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut table = Table::new(headers);
        for record in reader.records() {
            let record = record?;
            table.rows.push(record.iter().map(str::to_string).collect());
        }
        debug!("Read {} rows from {}", table.len(), path.display());
        Ok(table)
    }

    fn write_table(&self, path: &Path, table: &Table) -> Result<()> {
        let temp_path = temp_path_for(path);

        let written = write_csv(&temp_path, table).and_then(|_| {
            fs::rename(&temp_path, path)?;
            Ok(())
        });

        if written.is_err() && temp_path.exists() {
            if let Err(e) = fs::remove_file(&temp_path) {
                warn!("Failed to remove temp file {}: {}", temp_path.display(), e);
            }
        }
        written?;

        sync_parent_dir(path);
        debug!("Wrote {} rows to {}", table.len(), path.display());
        Ok(())
    }
}

fn write_csv(path: &Path, table: &Table) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    let file = writer
        .into_inner()
        .map_err(|e| crate::Error::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}

/// `.{name}.{pid}.tmp` next to the target, so the rename stays on one
/// file system.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, process::id()))
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
            warn!("Failed to sync directory {}: {}", parent.display(), e);
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

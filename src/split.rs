use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::duration::TIMESTAMP_COLUMN;
use crate::error::{Error, Result};
use crate::table::{Table, TableStore};

pub const SOURCE_COLUMN: &str = "mac_address";

/// Splits a trajectory capture into one file per radio source.
///
/// Rows are grouped by `mac_address`, each group is sorted by `timestamp`
/// and written to `{output_dir}/{MAC with ':' as '_'}.csv`. Returns the
/// written paths in source order.
pub fn split_by_source(
    csv_file: &Path,
    output_dir: &Path,
    store: &dyn TableStore,
) -> Result<Vec<PathBuf>> {
    if !output_dir.is_dir() {
        return Err(Error::Other(format!(
            "Directory '{}' does not exist",
            output_dir.display()
        )));
    }

    let table = store.read_table(csv_file)?;
    let source_index = table
        .column_index(SOURCE_COLUMN)
        .ok_or_else(|| Error::MissingColumn {
            column: SOURCE_COLUMN.to_string(),
            path: csv_file.to_path_buf(),
        })?;
    let sort_by_time = table.column_index(TIMESTAMP_COLUMN).is_some();

    let mut by_source: BTreeMap<String, Table> = BTreeMap::new();
    for row in &table.rows {
        let source = row.get(source_index).cloned().unwrap_or_default();
        by_source
            .entry(source)
            .or_insert_with(|| Table::new(table.headers.clone()))
            .rows
            .push(row.clone());
    }

    let mut written = Vec::with_capacity(by_source.len());
    for (source, mut rows) in by_source {
        if sort_by_time {
            rows.sort_by_column(TIMESTAMP_COLUMN, csv_file)?;
        }
        let path = output_dir.join(format!("{}.csv", source.replace(':', "_")));
        store.write_table(&path, &rows)?;
        debug!("{}: {} rows -> {}", source, rows.len(), path.display());
        written.push(path);
    }

    info!(
        "Split {} into {} source files",
        csv_file.display(),
        written.len()
    );
    Ok(written)
}

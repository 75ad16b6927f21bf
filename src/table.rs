use std::cmp::Ordering;
use std::path::Path;

use crate::error::{Error, Result};

/// In-memory contents of a capture file: a header row plus data rows,
/// every field kept as the text that was read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Values of `column`, one per row. Short rows yield an empty string.
    pub fn column_values<'a>(&'a self, index: usize) -> impl Iterator<Item = &'a str> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(index).map(String::as_str).unwrap_or(""))
    }

    /// Appends the rows of `other`, assuming both share a column layout.
    pub fn append(&mut self, other: Table) {
        self.rows.extend(other.rows);
    }

    /// Stable ascending sort on `column`.
    ///
    /// When every non-empty value parses as a number the column is compared
    /// numerically, otherwise as text. Empty values sort last.
    pub fn sort_by_column(&mut self, column: &str, source: &Path) -> Result<()> {
        let index = self.column_index(column).ok_or_else(|| Error::MissingColumn {
            column: column.to_string(),
            path: source.to_path_buf(),
        })?;

        let numeric = self
            .column_values(index)
            .filter(|v| !v.trim().is_empty())
            .all(|v| v.trim().parse::<f64>().is_ok());

        self.rows.sort_by(|a, b| {
            let left = a.get(index).map(|v| v.trim()).unwrap_or("");
            let right = b.get(index).map(|v| v.trim()).unwrap_or("");
            compare_values(left, right, numeric)
        });
        Ok(())
    }
}

fn compare_values(left: &str, right: &str, numeric: bool) -> Ordering {
    match (left.is_empty(), right.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }
    if numeric {
        // Both parse: checked over the whole column before sorting.
        let l = left.parse::<f64>().unwrap_or(f64::NAN);
        let r = right.parse::<f64>().unwrap_or(f64::NAN);
        l.total_cmp(&r)
    } else {
        left.cmp(right)
    }
}

/// Counts the data rows of a tabular file, header excluded.
pub trait RowCounter: Send + Sync {
    fn count_rows(&self, path: &Path) -> Result<usize>;
}

/// Reads and writes whole tables.
///
/// Implementations must only report success from `write_table` once the
/// data is durably in place at `path`.
pub trait TableStore: Send + Sync {
    fn read_table(&self, path: &Path) -> Result<Table>;
    fn write_table(&self, path: &Path, table: &Table) -> Result<()>;
}

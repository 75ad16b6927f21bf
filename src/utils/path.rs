use glob::{glob_with, MatchOptions, Pattern};
use std::env;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Error, Result};

/// Normalizes a path typed on the command line: surrounding whitespace and
/// quotes and trailing separators are stripped, and a relative path is
/// resolved against the current directory.
pub fn clean_path(input: &str) -> PathBuf {
    let trimmed = input.trim().trim_matches(|c| c == '\'' || c == '"');
    let mut cleaned = trimmed.trim_end_matches(['/', '\\']);
    if cleaned.is_empty() && trimmed.starts_with(['/', '\\']) {
        // Only separators: the root itself.
        cleaned = &trimmed[..1];
    }

    let path = Path::new(cleaned);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        match env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(e) => {
                warn!("Cannot resolve current directory: {}", e);
                path.to_path_buf()
            }
        }
    }
}

/// Names of the `*.csv` files directly inside `dir`, sorted. Hidden files
/// (leading `.`) are skipped.
pub fn list_csv_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(Error::Other(format!(
            "Folder '{}' does not exist",
            dir.display()
        )));
    }

    let pattern = format!("{}/*.csv", Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let entries = glob_with(&pattern, options)
        .map_err(|e| Error::Other(format!("Invalid pattern: {}", e)))?;

    let mut names = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::Io(e.into_error()))?;
        if !path.is_file() {
            continue;
        }
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => names.push(name.to_string()),
            None => warn!("Skipping non UTF-8 file name {}", path.display()),
        }
    }
    names.sort();
    Ok(names)
}

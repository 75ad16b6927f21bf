use std::fmt;
use std::path::{Path, PathBuf};

use crate::grid::GridCell;

const AGGREGATE_SENTINEL: &str = "all";
const CSV_EXTENSION: &str = ".csv";

/// A radio source, or the aggregate capture of every source at a cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceId {
    Aggregate,
    Source(String),
}

impl SourceId {
    /// `"all"` is the aggregate sentinel; anything else is a concrete source.
    pub fn parse(identifier: &str) -> SourceId {
        let identifier = identifier.trim();
        if identifier == AGGREGATE_SENTINEL {
            SourceId::Aggregate
        } else {
            SourceId::Source(identifier.to_string())
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, SourceId::Aggregate)
    }

    /// Token used in fingerprint file names. Concrete identifiers have `:`
    /// and `-` replaced by `_` and are upper-cased; the sentinel is kept
    /// verbatim in lower case.
    pub fn file_token(&self) -> String {
        match self {
            SourceId::Aggregate => AGGREGATE_SENTINEL.to_string(),
            SourceId::Source(id) => id.replace([':', '-'], "_").to_uppercase(),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Aggregate => f.write_str(AGGREGATE_SENTINEL),
            SourceId::Source(id) => f.write_str(id),
        }
    }
}

/// Shortest round-trip rendering, integral values keep their `.0`
/// (`1.5`, `28.0`, `-0.5`). Magnitudes below `1e-4` or from `1e16` up use
/// exponent form with a signed, two-digit exponent (`1e-05`, `1e+16`), the
/// way the capture tool names them.
pub fn format_coordinate(value: f64) -> String {
    let rendered = format!("{:?}", value);
    match rendered.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => rendered,
    }
}

/// `"{x}_{y}_{z}__{SOURCE}.csv"`
pub fn fingerprint_file_name(cell: &GridCell, source: &SourceId) -> String {
    format!(
        "{}_{}_{}__{}{}",
        format_coordinate(cell.x),
        format_coordinate(cell.y),
        format_coordinate(cell.z),
        source.file_token(),
        CSV_EXTENSION
    )
}

pub fn fingerprint_path(base_dir: &Path, cell: &GridCell, source: &SourceId) -> PathBuf {
    base_dir.join(fingerprint_file_name(cell, source))
}

/// A continuation capture named `"{base} ({digits}).csv"`.
///
/// The suffix is kept as written (`"01"` stays `"01"`) so `format` is the
/// exact inverse of `parse`; ordering goes through `sort_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryName {
    pub base: String,
    pub digits: String,
}

impl SecondaryName {
    /// Parses a file name of the form `"{base} ({digits}).csv"` where
    /// `digits` is a non-empty run of ASCII digits of any length.
    pub fn parse(file_name: &str) -> Option<SecondaryName> {
        let stem = file_name.strip_suffix(CSV_EXTENSION)?;
        let stem = stem.strip_suffix(')')?;
        let open = stem.rfind(" (")?;
        let (base, digits) = (&stem[..open], &stem[open + 2..]);

        if base.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        Some(SecondaryName {
            base: base.to_string(),
            digits: digits.to_string(),
        })
    }

    /// Numeric value of the suffix, when it fits in a `u64`.
    pub fn index(&self) -> Option<u64> {
        self.digits.parse().ok()
    }

    /// Orders suffixes by numeric value without parsing, so arbitrarily long
    /// digit runs compare correctly. `"1"` and `"01"` tie on value and fall
    /// back to the raw text.
    pub fn sort_key(&self) -> (usize, &str, &str) {
        let significant = self.digits.trim_start_matches('0');
        (significant.len(), significant, self.digits.as_str())
    }

    pub fn format(&self) -> String {
        format!("{} ({}){}", self.base, self.digits, CSV_EXTENSION)
    }

    /// File name of the main file this secondary continues.
    pub fn main_file_name(&self) -> String {
        format!("{}{}", self.base, CSV_EXTENSION)
    }
}

/// Base name (without `.csv`) of a main file, or `None` for anything that
/// is not a main CSV file.
pub fn main_base_name(file_name: &str) -> Option<&str> {
    if SecondaryName::parse(file_name).is_some() {
        return None;
    }
    file_name
        .strip_suffix(CSV_EXTENSION)
        .filter(|base| !base.is_empty())
}

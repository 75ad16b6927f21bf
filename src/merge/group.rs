use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::codec::{main_base_name, SecondaryName};
use crate::error::Result;
use crate::utils::path::list_csv_files;

/// A main capture file and the continuation files left by restarted runs.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeGroup {
    pub main_path: PathBuf,
    /// Ordered by ascending numeric suffix.
    pub secondary_paths: Vec<PathBuf>,
}

impl MergeGroup {
    pub fn has_secondaries(&self) -> bool {
        !self.secondary_paths.is_empty()
    }
}

/// Grouping of a directory listing.
#[derive(Debug, Clone, Default)]
pub struct DirectoryGroups {
    /// One per main file, sorted by file name.
    pub groups: Vec<MergeGroup>,
    /// Secondary files whose main file is absent.
    pub orphans: Vec<PathBuf>,
}

/// Splits file names into merge groups. Matching of secondaries to their
/// main file is exact and case-sensitive.
pub fn group_files(dir: &Path, file_names: &[String]) -> DirectoryGroups {
    let mains: HashSet<&str> = file_names
        .iter()
        .filter_map(|name| main_base_name(name))
        .collect();

    let mut secondaries: BTreeMap<&str, Vec<SecondaryName>> = BTreeMap::new();
    let mut orphans = Vec::new();
    for name in file_names {
        if let Some(secondary) = SecondaryName::parse(name) {
            if let Some(base) = mains.get(secondary.base.as_str()) {
                secondaries.entry(*base).or_default().push(secondary);
            } else {
                warn!("Secondary file {} has no main file", name);
                orphans.push(dir.join(name));
            }
        }
    }

    let mut main_names: Vec<&str> = mains.into_iter().collect();
    main_names.sort_unstable();

    let groups = main_names
        .into_iter()
        .map(|base| {
            let mut found = secondaries.remove(base).unwrap_or_default();
            found.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
            debug!("{}.csv: {} secondary files", base, found.len());
            MergeGroup {
                main_path: dir.join(format!("{}.csv", base)),
                secondary_paths: found.iter().map(|s| dir.join(s.format())).collect(),
            }
        })
        .collect();

    orphans.sort();
    DirectoryGroups { groups, orphans }
}

pub fn discover_groups(dir: &Path) -> Result<DirectoryGroups> {
    let names = list_csv_files(dir)?;
    Ok(group_files(dir, &names))
}

use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

use rssi_grid::merge::{DeleteResult, MergeState};
use rssi_grid::{CsvStore, Error, Result, SecondaryMerger, SilentReporter, Table, TableStore};

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap()
}

#[test]
fn test_merge_sorts_and_removes_secondary() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    write(dir, "1.5_28.5_1.5__all.csv", "t\n3\n1\n");
    write(dir, "1.5_28.5_1.5__all (1).csv", "t\n2\n");

    let summary = SecondaryMerger::new(dir, "t")
        .run(&CsvStore, &SilentReporter)
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.merged, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(read(dir, "1.5_28.5_1.5__all.csv"), "t\n1\n2\n3\n");
    assert!(!dir.join("1.5_28.5_1.5__all (1).csv").exists());

    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.state, MergeState::Merged);
    assert_eq!(outcome.rows_written, 3);
    assert_eq!(outcome.deletions.len(), 1);
    assert_eq!(outcome.deletions[0].result, DeleteResult::Deleted);
}

#[test]
fn test_secondaries_are_concatenated_in_numeric_suffix_order() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    // Equal sort keys keep concatenation order: main, (2), (10).
    write(dir, "p__all.csv", "t,src\n1,main\n");
    write(dir, "p__all (10).csv", "t,src\n1,ten\n");
    write(dir, "p__all (2).csv", "t,src\n1,two\n0,two\n");

    let summary = SecondaryMerger::new(dir, "t")
        .run(&CsvStore, &SilentReporter)
        .unwrap();

    assert_eq!(summary.merged, 1);
    assert_eq!(read(dir, "p__all.csv"), "t,src\n0,two\n1,main\n1,two\n1,ten\n");
    assert_eq!(fs::read_dir(dir).unwrap().count(), 1);
}

#[test]
fn test_directory_without_secondaries_is_untouched() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    let files = [
        ("a__all.csv", "t,rssi\n3,-40\n1,-41\n"),
        ("a__AA_BB.csv", "t,rssi\r\n3,-40\r\n"),
        ("notes.txt", "not a capture"),
    ];
    for (name, content) in files {
        write(dir, name, content);
    }

    let summary = SecondaryMerger::new(dir, "t")
        .run(&CsvStore, &SilentReporter)
        .unwrap();

    assert_eq!(summary.merged, 0);
    assert_eq!(summary.unchanged, 2);
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.state == MergeState::NoSecondaries));
    for (name, content) in files {
        assert_eq!(fs::read(dir.join(name)).unwrap(), content.as_bytes());
    }
}

#[test]
fn test_dry_run_reports_without_touching_files() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    write(dir, "m.csv", "t\n2\n");
    write(dir, "m (1).csv", "t\n1\n");

    let summary = SecondaryMerger::new(dir, "t")
        .with_dry_run(true)
        .run(&CsvStore, &SilentReporter)
        .unwrap();

    assert_eq!(summary.pending, 1);
    assert_eq!(summary.merged, 0);
    assert_eq!(summary.outcomes[0].state, MergeState::WouldMerge);
    assert_eq!(read(dir, "m.csv"), "t\n2\n");
    assert!(dir.join("m (1).csv").exists());
}

/// Reads from disk but refuses to write one particular file.
struct FailingWriteStore {
    fail_on: &'static str,
}

impl TableStore for FailingWriteStore {
    fn read_table(&self, path: &Path) -> Result<Table> {
        CsvStore.read_table(path)
    }

    fn write_table(&self, path: &Path, table: &Table) -> Result<()> {
        if path.file_name().and_then(|n| n.to_str()) == Some(self.fail_on) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        CsvStore.write_table(path, table)
    }
}

#[test]
fn test_write_failure_keeps_secondaries_and_other_groups_proceed() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    write(dir, "a.csv", "t\n2\n");
    write(dir, "a (1).csv", "t\n1\n");
    write(dir, "b.csv", "t\n5\n");
    write(dir, "b (1).csv", "t\n4\n");

    let store = FailingWriteStore { fail_on: "a.csv" };
    let summary = SecondaryMerger::new(dir, "t")
        .run(&store, &SilentReporter)
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.merged, 1);
    assert!(summary.has_errors());

    let failed: Vec<_> = summary.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].main_path, dir.join("a.csv"));
    assert!(matches!(failed[0].state, MergeState::MergeFailed(ref r) if r.contains("disk full")));
    assert!(failed[0].deletions.is_empty());

    assert!(dir.join("a (1).csv").exists());
    assert_eq!(read(dir, "a.csv"), "t\n2\n");

    assert!(!dir.join("b (1).csv").exists());
    assert_eq!(read(dir, "b.csv"), "t\n4\n5\n");
}

#[test]
fn test_missing_sort_column_fails_group_without_deleting() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    write(dir, "m.csv", "t\n2\n");
    write(dir, "m (1).csv", "t\n1\n");

    let summary = SecondaryMerger::new(dir, "timestamp")
        .run(&CsvStore, &SilentReporter)
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert!(dir.join("m (1).csv").exists());
    assert_eq!(read(dir, "m.csv"), "t\n2\n");
}

#[test]
fn test_orphan_secondaries_are_reported_and_kept() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    write(dir, "gone (1).csv", "t\n1\n");

    let summary = SecondaryMerger::new(dir, "t")
        .run(&CsvStore, &SilentReporter)
        .unwrap();

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.orphans, vec![dir.join("gone (1).csv")]);
    assert!(dir.join("gone (1).csv").exists());
}

#[test]
fn test_missing_directory_is_an_error() {
    let tmp = tempdir().unwrap();
    let result = SecondaryMerger::new(&tmp.path().join("nope"), "t").run(&CsvStore, &SilentReporter);
    assert!(result.is_err());
}

#[test]
fn test_cancelled_merge_processes_nothing() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    write(dir, "m.csv", "t\n2\n");
    write(dir, "m (1).csv", "t\n1\n");

    let summary = SecondaryMerger::new(dir, "t")
        .with_cancel_flag(Arc::new(AtomicBool::new(true)))
        .run(&CsvStore, &SilentReporter)
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.processed, 0);
    assert!(dir.join("m (1).csv").exists());
}

#[test]
fn test_zero_padded_suffix_is_merged_into_main() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    write(dir, "m.csv", "t\n3\n");
    write(dir, "m (01).csv", "t\n1\n");

    let summary = SecondaryMerger::new(dir, "t")
        .run(&CsvStore, &SilentReporter)
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.merged, 1);
    assert_eq!(read(dir, "m.csv"), "t\n1\n3\n");
    assert!(!dir.join("m (01).csv").exists());
}

/// Removes one secondary from under the merger while the main file is
/// written, so its later deletion fails.
struct VanishingSecondaryStore {
    vanish: &'static str,
}

impl TableStore for VanishingSecondaryStore {
    fn read_table(&self, path: &Path) -> Result<Table> {
        CsvStore.read_table(path)
    }

    fn write_table(&self, path: &Path, table: &Table) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::remove_file(dir.join(self.vanish))?;
        }
        CsvStore.write_table(path, table)
    }
}

#[test]
fn test_delete_failure_does_not_block_other_deletions() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    write(dir, "x.csv", "t\n3\n");
    write(dir, "x (1).csv", "t\n1\n");
    write(dir, "x (2).csv", "t\n2\n");

    let store = VanishingSecondaryStore { vanish: "x (1).csv" };
    let summary = SecondaryMerger::new(dir, "t")
        .run(&store, &SilentReporter)
        .unwrap();

    assert_eq!(summary.merged, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.delete_failures, 1);
    assert!(summary.has_errors());

    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.state, MergeState::Merged);
    assert_eq!(outcome.deletions.len(), 2);
    assert_eq!(outcome.deletions[0].path, dir.join("x (1).csv"));
    assert!(matches!(outcome.deletions[0].result, DeleteResult::DeleteFailed(_)));
    assert_eq!(outcome.deletions[1].path, dir.join("x (2).csv"));
    assert_eq!(outcome.deletions[1].result, DeleteResult::Deleted);

    // The merge itself is kept.
    assert_eq!(read(dir, "x.csv"), "t\n1\n2\n3\n");
    assert!(!dir.join("x (2).csv").exists());
}

#[test]
fn test_unreadable_secondary_fails_group() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    write(dir, "u.csv", "t\n3\n");
    write(dir, "u (1).csv", "t\n1\n");
    // Ragged row: two fields under a one-column header.
    write(dir, "u (2).csv", "t\n2,extra\n");

    let summary = SecondaryMerger::new(dir, "t")
        .run(&CsvStore, &SilentReporter)
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.merged, 0);
    let outcome = &summary.outcomes[0];
    assert!(matches!(outcome.state, MergeState::MergeFailed(_)));
    assert!(outcome.deletions.is_empty());

    assert_eq!(read(dir, "u.csv"), "t\n3\n");
    assert!(dir.join("u (1).csv").exists());
    assert!(dir.join("u (2).csv").exists());
}

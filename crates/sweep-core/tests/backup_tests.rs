use std::fs;
use std::path::Path;

use chrono::Local;
use tempfile::tempdir;

use sweep_core::aggregate::{Aggregator, ClassificationSink};
use sweep_core::plan::plan_selection;
use sweep_core::{
    BackupMover, Classification, FileRecord, Importance, SelectionChoices, SelectionSet,
    SilentReporter,
};

fn selection_of(paths: &[&Path]) -> SelectionSet {
    let aggregator = Aggregator::new(Vec::new());
    for path in paths {
        aggregator.accept(
            FileRecord {
                path: path.to_path_buf(),
                size_bytes: 20_480,
                modified: Local::now(),
                is_dir: path.is_dir(),
            },
            Classification {
                important: false,
                importance: Importance::Low,
                reason: "cache".to_string(),
            },
        );
    }
    let groups = aggregator.finish();
    let choices = SelectionChoices::new().delete_tiers("Others", [Importance::Low]);
    plan_selection(&groups, &choices)
}

#[test]
fn test_relocate_preserves_structure_and_content() {
    let tmp = tempdir().unwrap();
    let home = tmp.path().join("home");
    let source = home.join("Library/Caches/app/x.db");
    fs::create_dir_all(source.parent().unwrap()).unwrap();
    fs::write(&source, b"cached bytes").unwrap();

    let backup = tmp.path().join("backup");
    let mover = BackupMover::new(backup.clone(), home.clone(), false);
    mover.ensure_backup_root().unwrap();

    let report = mover.relocate(selection_of(&[&source]), &SilentReporter);

    let destination = backup.join("Library/Caches/app/x.db");
    assert_eq!(report.relocated, vec![(source.clone(), destination.clone())]);
    assert!(!source.exists());
    assert_eq!(fs::read(&destination).unwrap(), b"cached bytes");
}

#[test]
fn test_relocate_moves_directories() {
    let tmp = tempdir().unwrap();
    let home = tmp.path().join("home");
    let dir = home.join("Library/Caches/app/blobs");
    fs::create_dir_all(dir.join("inner")).unwrap();
    fs::write(dir.join("inner/a"), b"a").unwrap();

    let backup = tmp.path().join("backup");
    let mover = BackupMover::new(backup.clone(), home.clone(), false);
    let report = mover.relocate(selection_of(&[&dir]), &SilentReporter);

    assert_eq!(report.relocated.len(), 1);
    assert!(!dir.exists());
    assert_eq!(
        fs::read(backup.join("Library/Caches/app/blobs/inner/a")).unwrap(),
        b"a"
    );
}

#[test]
fn test_missing_source_does_not_abort_batch() {
    let tmp = tempdir().unwrap();
    let home = tmp.path().join("home");
    let gone = home.join("Library/Caches/app/gone.db");
    let present = home.join("Library/Caches/app/present.db");
    fs::create_dir_all(present.parent().unwrap()).unwrap();
    fs::write(&present, b"p").unwrap();

    let mover = BackupMover::new(tmp.path().join("backup"), home.clone(), false);
    let report = mover.relocate(selection_of(&[&gone, &present]), &SilentReporter);

    assert_eq!(report.missing, vec![gone]);
    assert_eq!(report.relocated.len(), 1);
    assert!(report.failed.is_empty());
    assert_eq!(report.attempted(), 2);
}

#[test]
fn test_rerun_after_move_is_a_non_fatal_miss() {
    let tmp = tempdir().unwrap();
    let home = tmp.path().join("home");
    let source = home.join("Library/Logs/old.log");
    fs::create_dir_all(source.parent().unwrap()).unwrap();
    fs::write(&source, b"log").unwrap();

    let mover = BackupMover::new(tmp.path().join("backup"), home.clone(), false);
    let first = mover.relocate(selection_of(&[&source]), &SilentReporter);
    assert_eq!(first.relocated.len(), 1);

    let second = mover.relocate(selection_of(&[&source]), &SilentReporter);
    assert!(second.relocated.is_empty());
    assert_eq!(second.missing, vec![source]);
}

#[test]
fn test_failure_on_one_record_continues_with_rest() {
    let tmp = tempdir().unwrap();
    let home = tmp.path().join("home");
    let blocked = home.join("Library/Caches/blocked/a.db");
    let fine = home.join("Library/Caches/fine/b.db");
    for path in [&blocked, &fine] {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    // A plain file where the destination directory should go.
    let backup = tmp.path().join("backup");
    fs::create_dir_all(backup.join("Library/Caches")).unwrap();
    fs::write(backup.join("Library/Caches/blocked"), b"not a dir").unwrap();

    let mover = BackupMover::new(backup.clone(), home.clone(), false);
    let report = mover.relocate(selection_of(&[&blocked, &fine]), &SilentReporter);

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, blocked);
    assert!(blocked.exists());
    assert_eq!(report.relocated.len(), 1);
    assert!(!fine.exists());
    assert!(backup.join("Library/Caches/fine/b.db").exists());
}

#[test]
fn test_outside_reference_root_never_collides_with_inside_path() {
    let tmp = tempdir().unwrap();
    let home = tmp.path().join("home");
    let outside = tmp.path().join("sys/Library/Caches/Foo/a.db");

    // An inside path whose relative form equals the outside path minus its root.
    let mut inside = home.clone();
    for component in outside.components() {
        if let std::path::Component::Normal(part) = component {
            inside.push(part);
        }
    }

    for (path, content) in [(&outside, b"outside"), (&inside, b"inside!")] {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    let backup = tmp.path().join("backup");
    let mover = BackupMover::new(backup.clone(), home.clone(), false);
    let report = mover.relocate(selection_of(&[&inside, &outside]), &SilentReporter);

    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert_eq!(report.relocated.len(), 2);
    let inside_dest = mover.destination_for(&inside);
    let outside_dest = mover.destination_for(&outside);
    assert_ne!(inside_dest, outside_dest);
    assert!(outside_dest.starts_with(backup.join("_root")));
    assert_eq!(fs::read(&inside_dest).unwrap(), b"inside!");
    assert_eq!(fs::read(&outside_dest).unwrap(), b"outside");
}

#[test]
fn test_existing_backup_is_never_overwritten() {
    let tmp = tempdir().unwrap();
    let home = tmp.path().join("home");
    let source = home.join("Library/Caches/app/x.db");
    fs::create_dir_all(source.parent().unwrap()).unwrap();
    fs::write(&source, b"first").unwrap();

    let backup = tmp.path().join("backup");
    let mover = BackupMover::new(backup.clone(), home.clone(), false);
    let first = mover.relocate(selection_of(&[&source]), &SilentReporter);
    assert_eq!(first.relocated.len(), 1);

    // The application recreates the file between runs.
    fs::write(&source, b"second").unwrap();
    let second = mover.relocate(selection_of(&[&source]), &SilentReporter);

    assert!(second.relocated.is_empty());
    assert_eq!(second.failed.len(), 1);
    assert_eq!(second.failed[0].0, source);
    assert!(second.failed[0].1.contains("destination exists"));
    assert_eq!(fs::read(backup.join("Library/Caches/app/x.db")).unwrap(), b"first");
    assert_eq!(fs::read(&source).unwrap(), b"second");
}

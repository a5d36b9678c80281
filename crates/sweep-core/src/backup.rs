use crate::error::Error;
use crate::plan::SelectionSet;
use crate::progress::ProgressReporter;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Directory under the backup root holding paths outside the reference root.
pub const OUTSIDE_REFERENCE_DIR: &str = "_root";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved(PathBuf),
    /// Dry mode: directories were prepared but nothing was moved.
    Rehearsed(PathBuf),
    /// The source was already gone, e.g. moved by an earlier run.
    Missing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationReport {
    pub dry_run: bool,
    /// (source, destination) pairs, moved or rehearsed.
    pub relocated: Vec<(PathBuf, PathBuf)>,
    pub missing: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl RelocationReport {
    pub fn attempted(&self) -> usize {
        self.relocated.len() + self.missing.len() + self.failed.len()
    }
}

/// Relocates selected records under a backup root, preserving their path
/// relative to a reference directory.
#[derive(Debug, Clone)]
pub struct BackupMover {
    backup_root: PathBuf,
    reference_root: PathBuf,
    dry_run: bool,
}

impl BackupMover {
    pub fn new(backup_root: PathBuf, reference_root: PathBuf, dry_run: bool) -> Self {
        Self {
            backup_root,
            reference_root,
            dry_run,
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Create the backup root. Failure here is fatal for the run.
    pub fn ensure_backup_root(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.backup_root).map_err(|source| Error::BackupRoot {
            path: self.backup_root.clone(),
            source,
        })?;
        info!("Backup directory ready at {}", self.backup_root.display());
        Ok(())
    }

    /// Where `source` lands under the backup root. Paths outside the
    /// reference root go under `_root/` with their full path minus the root
    /// component, so they cannot share a destination with a path inside it.
    pub fn destination_for(&self, source: &Path) -> PathBuf {
        let mut destination = self.backup_root.clone();
        let relative = match source.strip_prefix(&self.reference_root) {
            Ok(relative) => relative,
            Err(_) => {
                destination.push(OUTSIDE_REFERENCE_DIR);
                source
            }
        };

        for component in relative.components() {
            if let Component::Normal(part) = component {
                destination.push(part);
            }
        }
        destination
    }

    /// Relocate every selected record. A failure on one record is logged and
    /// recorded; the rest of the batch is still attempted.
    pub fn relocate(&self, selection: SelectionSet, reporter: &dyn ProgressReporter) -> RelocationReport {
        let total = selection.len();
        let mut report = RelocationReport {
            dry_run: self.dry_run,
            ..RelocationReport::default()
        };

        reporter.on_relocate_start(total);

        for (i, classified) in selection.into_records().into_iter().enumerate() {
            let source = classified.record.path;
            match self.relocate_one(&source) {
                Ok(MoveOutcome::Moved(destination)) => {
                    info!("Moved {} to {}", source.display(), destination.display());
                    report.relocated.push((source, destination));
                }
                Ok(MoveOutcome::Rehearsed(destination)) => {
                    info!(
                        "[DRY RUN] Would move {} to {}",
                        source.display(),
                        destination.display()
                    );
                    report.relocated.push((source, destination));
                }
                Ok(MoveOutcome::Missing) => {
                    warn!("Source {} no longer exists, skipping", source.display());
                    report.missing.push(source);
                }
                Err(e) => {
                    error!("Failed to move {}: {}", source.display(), e);
                    report.failed.push((source, e.to_string()));
                }
            }
            reporter.on_relocate_progress(i + 1, total);
        }

        reporter.on_relocate_complete(report.relocated.len(), report.failed.len());
        info!(
            "Relocation finished: {} relocated, {} missing, {} failed",
            report.relocated.len(),
            report.missing.len(),
            report.failed.len()
        );
        report
    }

    pub fn relocate_one(&self, source: &Path) -> io::Result<MoveOutcome> {
        match fs::symlink_metadata(source) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(MoveOutcome::Missing),
            Err(e) => return Err(e),
        }

        let destination = self.destination_for(source);
        if fs::symlink_metadata(&destination).is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("destination exists: {}", destination.display()),
            ));
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        if self.dry_run {
            return Ok(MoveOutcome::Rehearsed(destination));
        }

        move_path(source, &destination)?;
        Ok(MoveOutcome::Moved(destination))
    }
}

/// Rename, falling back to copy-then-remove when rename cannot work
/// (e.g. the backup root is on another device).
fn move_path(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
            ) =>
        {
            Err(e)
        }
        Err(e) => {
            debug!(
                "rename {} failed ({}), copying instead",
                source.display(),
                e
            );
            copy_then_remove(source, destination)
        }
    }
}

fn copy_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(source)?;
    if !metadata.is_dir() {
        fs::copy(source, destination)?;
        return fs::remove_file(source);
    }

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    fs::remove_dir_all(source)
}

use crate::config::{is_under_any, AppConfig};
use crate::model::FileRecord;
use crate::progress::ProgressReporter;
use chrono::{DateTime, Local};
use glob::Pattern;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

const SCAN_LOG_INTERVAL: usize = 1000;

/// The admission rules a path must pass before it may reach the oracle.
pub struct ScanFilter {
    protected_prefixes: Vec<String>,
    ignore_patterns: Vec<Pattern>,
    min_size_bytes: u64,
}

impl ScanFilter {
    pub fn from_config(config: &AppConfig) -> Self {
        let ignore_patterns = config
            .ignore_patterns
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        Self {
            protected_prefixes: config.protected_prefixes.clone(),
            ignore_patterns,
            min_size_bytes: config.min_file_size_bytes(),
        }
    }

    /// Directories failing this are not descended into.
    pub fn allows_path(&self, path: &Path) -> bool {
        !is_under_any(path, &self.protected_prefixes)
            && !self
                .ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(path))
    }

    pub fn admits(&self, path: &Path, size_bytes: u64) -> bool {
        size_bytes >= self.min_size_bytes && self.allows_path(path)
    }
}

/// Walk every configured scan root in order and collect the files that pass
/// the filters, stopping once `max_files` records are collected.
pub fn scan(config: &AppConfig, reporter: &dyn ProgressReporter) -> Vec<FileRecord> {
    let filter = ScanFilter::from_config(config);
    let roots = config.scan_root_paths();
    scan_roots(&roots, &filter, config.max_files, reporter)
}

pub(crate) fn scan_roots(
    roots: &[PathBuf],
    filter: &ScanFilter,
    max_files: usize,
    reporter: &dyn ProgressReporter,
) -> Vec<FileRecord> {
    let start = Instant::now();
    let mut records = Vec::new();
    let mut items_seen = 0usize;

    reporter.on_scan_start();

    'roots: for root in roots {
        if !root.exists() {
            warn!("Directory {} does not exist, skipping", root.display());
            continue;
        }

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| filter.allows_path(entry.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("Skipping unreadable entry under {}: {}", root.display(), err);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            items_seen += 1;
            if items_seen % SCAN_LOG_INTERVAL == 0 {
                info!("Scanned {} items, {} candidates", items_seen, records.len());
                reporter.on_scan_progress(items_seen, records.len());
            }

            if records.len() >= max_files {
                info!("Reached max_files limit ({}), stopping scan", max_files);
                break 'roots;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    debug!("Skipping {}: {}", entry.path().display(), err);
                    continue;
                }
            };

            if !filter.admits(entry.path(), metadata.len()) {
                debug!(
                    "Skipping {} ({} bytes)",
                    entry.path().display(),
                    metadata.len()
                );
                continue;
            }

            records.push(to_record(entry.into_path(), &metadata));
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    info!(
        "Found {} files after filtering (out of {} total) in {:.2}s",
        records.len(),
        items_seen,
        elapsed
    );
    reporter.on_scan_complete(records.len(), elapsed);

    records
}

fn to_record(path: PathBuf, metadata: &Metadata) -> FileRecord {
    let modified = metadata
        .modified()
        .map(DateTime::<Local>::from)
        .unwrap_or_else(|_| Local::now());

    FileRecord {
        path,
        size_bytes: metadata.len(),
        modified,
        is_dir: metadata.is_dir(),
    }
}

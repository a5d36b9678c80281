use crate::aggregate::{Aggregator, ProgramGroups};
use crate::backup::{BackupMover, RelocationReport};
use crate::config::AppConfig;
use crate::error::Error;
use crate::model::FileRecord;
use crate::oracle::{Oracle, OracleClient, Sleeper};
use crate::plan::{plan_selection, SelectionChoices, SelectionSet};
use crate::pool::{CancelToken, PoolReport, WorkerPool};
use crate::progress::ProgressReporter;
use crate::scanner;
use std::io;
use tracing::info;

/// The human in the loop. The engine never reads input itself.
pub trait Operator {
    fn choose(&self, groups: &ProgramGroups) -> io::Result<SelectionChoices>;
    fn confirm(&self, selection: &SelectionSet) -> io::Result<bool>;
}

#[derive(Debug)]
pub enum RunOutcome {
    NoFilesFound,
    NothingToReview,
    NothingSelected,
    AbortedByOperator,
    Relocated(RelocationReport),
}

#[derive(Debug)]
pub struct ClassifyResult {
    pub groups: ProgramGroups,
    pub pool: PoolReport,
    /// Records classified as important and therefore kept in place.
    pub kept: usize,
}

pub struct SweepEngine {
    config: AppConfig,
}

impl SweepEngine {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn backup_mover(&self) -> BackupMover {
        BackupMover::new(
            self.config.backup_root(),
            self.config.reference_root_path(),
            self.config.dry_run,
        )
    }

    pub fn scan(&self, reporter: &dyn ProgressReporter) -> Vec<FileRecord> {
        scanner::scan(&self.config, reporter)
    }

    /// Classify a batch and freeze the aggregated groups.
    pub fn classify<O: Oracle, S: Sleeper>(
        &self,
        records: Vec<FileRecord>,
        client: &OracleClient<O, S>,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<ClassifyResult, Error> {
        let aggregator = Aggregator::new(self.config.known_programs.clone());
        let pool = WorkerPool::new(self.config.effective_worker_count());

        let report = pool.run(records, client, &aggregator, reporter, cancel)?;
        let kept = aggregator.discarded();
        let groups = aggregator.finish();

        info!(
            "{} files kept as important, {} candidates for review",
            kept,
            groups.total_records()
        );
        reporter.on_classify_complete(groups.total_records(), report.duration.as_secs_f64());

        Ok(ClassifyResult {
            groups,
            pool: report,
            kept,
        })
    }

    /// Scan the configured roots, then run the remaining phases.
    pub fn run<O: Oracle, S: Sleeper>(
        &self,
        client: &OracleClient<O, S>,
        operator: &dyn Operator,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<RunOutcome, Error> {
        let mover = self.backup_mover();
        mover.ensure_backup_root()?;

        let records = self.scan(reporter);
        self.process(records, &mover, client, operator, reporter, cancel)
    }

    /// Classify, review, and relocate an already-scanned batch.
    pub fn process<O: Oracle, S: Sleeper>(
        &self,
        records: Vec<FileRecord>,
        mover: &BackupMover,
        client: &OracleClient<O, S>,
        operator: &dyn Operator,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<RunOutcome, Error> {
        if records.is_empty() {
            info!("No files found to process");
            return Ok(RunOutcome::NoFilesFound);
        }

        let classified = self.classify(records, client, reporter, cancel)?;
        if classified.groups.is_empty() {
            info!("No non-important files found to clean up");
            return Ok(RunOutcome::NothingToReview);
        }

        let choices = operator.choose(&classified.groups)?;
        let selection = plan_selection(&classified.groups, &choices);
        if selection.is_empty() {
            info!("No files selected for cleanup");
            return Ok(RunOutcome::NothingSelected);
        }

        info!(
            "Proceeding with {} files, total size: {:.2} MB",
            selection.len(),
            selection.total_size_mb()
        );

        if !operator.confirm(&selection)? {
            info!("Cleanup aborted by user");
            return Ok(RunOutcome::AbortedByOperator);
        }

        let report = mover.relocate(selection, reporter);
        if report.dry_run {
            info!("Running in dry-run mode. No files were actually moved.");
        } else {
            info!(
                "Files moved to {}. Review before permanent deletion.",
                mover.backup_root().display()
            );
        }
        Ok(RunOutcome::Relocated(report))
    }
}

use crate::model::{Classification, ClassifiedRecord, FileRecord, Importance};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Bucket for records that match no known program.
pub const OTHERS: &str = "Others";

/// Receives one (record, verdict) pair per classified input, possibly from
/// several lanes at once.
pub trait ClassificationSink: Send + Sync {
    fn accept(&self, record: FileRecord, classification: Classification);
}

/// First known program whose name is a case-insensitive substring of `path`,
/// in list order, else [`OTHERS`].
pub fn attribute_program<'a>(path: &Path, known_programs: &'a [String]) -> &'a str {
    let path_lower = path.to_string_lossy().to_lowercase();
    known_programs
        .iter()
        .find(|program| path_lower.contains(&program.to_lowercase()))
        .map(|program| program.as_str())
        .unwrap_or(OTHERS)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramGroup {
    pub program: String,
    pub records: Vec<ClassifiedRecord>,
}

impl ProgramGroup {
    fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            records: Vec::new(),
        }
    }

    pub fn count_tier(&self, tier: Importance) -> usize {
        self.records.iter().filter(|r| r.importance() == tier).count()
    }

    pub fn size_mb(&self) -> f64 {
        self.records.iter().map(|r| r.record.size_mb()).sum()
    }

    pub fn summary(&self) -> GroupSummary {
        GroupSummary {
            program: self.program.clone(),
            files: self.records.len(),
            low: self.count_tier(Importance::Low),
            medium: self.count_tier(Importance::Medium),
            high: self.count_tier(Importance::High),
            size_mb: self.size_mb(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub program: String,
    pub files: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub size_mb: f64,
}

/// Non-important records keyed by owning program. Known programs keep their
/// priority order, `Others` is last, and records keep arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramGroups {
    groups: Vec<ProgramGroup>,
}

impl ProgramGroups {
    pub fn new(known_programs: &[String]) -> Self {
        let mut groups: Vec<ProgramGroup> = Vec::with_capacity(known_programs.len() + 1);
        for program in known_programs.iter().map(String::as_str).chain([OTHERS]) {
            if !groups.iter().any(|g| g.program == program) {
                groups.push(ProgramGroup::new(program));
            }
        }
        Self { groups }
    }

    fn push(&mut self, program: &str, record: ClassifiedRecord) {
        match self.groups.iter_mut().find(|g| g.program == program) {
            Some(group) => group.records.push(record),
            None => {
                let mut group = ProgramGroup::new(program);
                group.records.push(record);
                self.groups.push(group);
            }
        }
    }

    pub fn get(&self, program: &str) -> Option<&ProgramGroup> {
        self.groups.iter().find(|g| g.program == program)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProgramGroup> {
        self.groups.iter()
    }

    pub fn non_empty(&self) -> impl Iterator<Item = &ProgramGroup> {
        self.groups.iter().filter(|g| !g.records.is_empty())
    }

    /// Programs that have at least one record, in display order.
    pub fn programs(&self) -> Vec<&str> {
        self.non_empty().map(|g| g.program.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }

    pub fn total_records(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }

    pub fn total_size_mb(&self) -> f64 {
        self.groups.iter().map(ProgramGroup::size_mb).sum()
    }

    pub fn summaries(&self) -> Vec<GroupSummary> {
        self.non_empty().map(ProgramGroup::summary).collect()
    }
}

/// Thread-safe collection point for classification results.
///
/// Every addition happens under one lock, so a concurrent reader can never
/// see a half-updated group. Important records are counted and dropped.
pub struct Aggregator {
    known_programs: Vec<String>,
    groups: Mutex<ProgramGroups>,
    received: AtomicUsize,
    discarded: AtomicUsize,
}

impl Aggregator {
    pub fn new(known_programs: Vec<String>) -> Self {
        let groups = ProgramGroups::new(&known_programs);
        Self {
            known_programs,
            groups: Mutex::new(groups),
            received: AtomicUsize::new(0),
            discarded: AtomicUsize::new(0),
        }
    }

    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }

    pub fn discarded(&self) -> usize {
        self.discarded.load(Ordering::SeqCst)
    }

    /// Copy of the current mapping. Safe to call while lanes are running.
    /// Freeze the mapping once all lanes have finished.
    pub fn finish(self) -> ProgramGroups {
        self.groups
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ClassificationSink for Aggregator {
    fn accept(&self, record: FileRecord, classification: Classification) {
        self.received.fetch_add(1, Ordering::SeqCst);

        if classification.important {
            self.discarded.fetch_add(1, Ordering::SeqCst);
            debug!(
                "Keeping {} ({}): {}",
                record.path.display(),
                classification.importance,
                classification.reason
            );
            return;
        }

        let program = attribute_program(&record.path, &self.known_programs);
        let classified = ClassifiedRecord::new(record, classification);

        let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        groups.push(program, classified);
    }
}

use crate::aggregate::ClassificationSink;
use crate::error::Error;
use crate::model::FileRecord;
use crate::oracle::{Oracle, OracleClient, Sleeper};
use crate::progress::{estimate_remaining, format_eta, ProgressReporter};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn};

const PROGRESS_LOG_INTERVAL: usize = 100;

/// Cooperative cancellation flag, checked by each lane between records.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReport {
    pub submitted: usize,
    pub processed: usize,
    /// Records never sent to the oracle because the run was cancelled.
    pub skipped: usize,
    pub duration: Duration,
}

/// Fixed-size set of classification lanes.
///
/// Record `i` goes to lane `i % workers`; each lane runs its records one at
/// a time on its own thread, so at most `workers` oracle calls are in flight.
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Split records round-robin into at most `workers` non-empty lanes.
    pub fn assign_lanes(&self, records: Vec<FileRecord>) -> Vec<Vec<FileRecord>> {
        let lane_count = self.workers.min(records.len());
        let mut lanes: Vec<Vec<FileRecord>> = (0..lane_count).map(|_| Vec::new()).collect();
        for (i, record) in records.into_iter().enumerate() {
            lanes[i % lane_count].push(record);
        }
        lanes
    }

    /// Classify every record and hand each result to `sink`.
    ///
    /// Returns once every lane has drained, so the sink holds one result per
    /// processed record when this returns.
    pub fn run<O, S>(
        &self,
        records: Vec<FileRecord>,
        client: &OracleClient<O, S>,
        sink: &dyn ClassificationSink,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<PoolReport, Error>
    where
        O: Oracle,
        S: Sleeper,
    {
        let start = Instant::now();
        let total = records.len();
        reporter.on_classify_start(total);

        if total == 0 {
            return Ok(PoolReport {
                submitted: 0,
                processed: 0,
                skipped: 0,
                duration: start.elapsed(),
            });
        }

        let lanes = self.assign_lanes(records);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(lanes.len())
            .thread_name(|i| format!("classify-{}", i + 1))
            .build()?;

        info!("Starting classification with {} workers", lanes.len());

        let processed = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);

        pool.install(|| {
            lanes.into_par_iter().enumerate().for_each(|(lane_id, lane)| {
                let span = info_span!("lane", id = lane_id + 1);
                let _enter = span.enter();

                let lane_len = lane.len();
                for (done, record) in lane.into_iter().enumerate() {
                    if cancel.is_cancelled() {
                        let remaining = lane_len - done;
                        warn!("Cancelled, skipping {} remaining records", remaining);
                        skipped.fetch_add(remaining, Ordering::SeqCst);
                        break;
                    }

                    let classification = client.classify(&record);
                    sink.accept(record, classification);

                    let n = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    reporter.on_classify_progress(n, total);
                    if n % PROGRESS_LOG_INTERVAL == 0 {
                        let eta = estimate_remaining(n, total, start.elapsed());
                        info!("Processed {}/{} files, ETA: {}", n, total, format_eta(eta));
                    }
                }
            });
        });

        let report = PoolReport {
            submitted: total,
            processed: processed.into_inner(),
            skipped: skipped.into_inner(),
            duration: start.elapsed(),
        };
        info!(
            "Classification complete in {:.2}s ({} processed, {} skipped)",
            report.duration.as_secs_f64(),
            report.processed,
            report.skipped
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Classification;
    use crate::oracle::{OracleError, RetryPolicy};
    use crate::progress::SilentReporter;
    use chrono::Local;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration) {}
    }

    /// Fails every third record, tracks the peak number of concurrent calls.
    struct FlakyOracle {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Oracle for FlakyOracle {
        fn ask(&self, record: &FileRecord) -> Result<String, OracleError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if record.size_bytes % 3 == 0 {
                Err(OracleError::Transport("induced".into()))
            } else {
                Ok(r#"{"important": false, "importance": "Low", "reason": "cache"}"#.into())
            }
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        results: Mutex<Vec<(FileRecord, Classification)>>,
    }

    impl ClassificationSink for CollectingSink {
        fn accept(&self, record: FileRecord, classification: Classification) {
            self.results.lock().unwrap().push((record, classification));
        }
    }

    fn records(n: u64) -> Vec<FileRecord> {
        (0..n)
            .map(|i| FileRecord {
                path: PathBuf::from(format!("/caches/file-{}", i)),
                size_bytes: i,
                modified: Local::now(),
                is_dir: false,
            })
            .collect()
    }

    fn client(oracle: &FlakyOracle) -> OracleClient<&FlakyOracle, NoSleep> {
        OracleClient::with_sleeper(oracle, RetryPolicy::default(), NoSleep)
    }

    fn flaky() -> FlakyOracle {
        FlakyOracle {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_assign_lanes_round_robin() {
        let pool = WorkerPool::new(3);
        let lanes = pool.assign_lanes(records(7));
        let sizes: Vec<_> = lanes
            .iter()
            .map(|lane| lane.iter().map(|r| r.size_bytes).collect::<Vec<_>>())
            .collect();
        assert_eq!(sizes, vec![vec![0, 3, 6], vec![1, 4], vec![2, 5]]);
    }

    #[test]
    fn test_assign_lanes_fewer_records_than_workers() {
        let pool = WorkerPool::new(8);
        assert_eq!(pool.assign_lanes(records(2)).len(), 2);
        assert!(pool.assign_lanes(Vec::new()).is_empty());
    }

    #[test]
    fn test_every_record_yields_one_result() {
        let oracle = flaky();
        let sink = CollectingSink::default();
        let report = WorkerPool::new(4)
            .run(records(30), &client(&oracle), &sink, &SilentReporter, &CancelToken::new())
            .unwrap();

        assert_eq!(report.submitted, 30);
        assert_eq!(report.processed, 30);
        assert_eq!(report.skipped, 0);

        let results = sink.results.lock().unwrap();
        assert_eq!(results.len(), 30);
        let mut seen: Vec<u64> = results.iter().map(|(r, _)| r.size_bytes).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..30).collect::<Vec<_>>());

        for (record, classification) in results.iter() {
            assert_eq!(classification.important, record.size_bytes % 3 == 0);
        }
    }

    #[test]
    fn test_concurrency_never_exceeds_workers() {
        let oracle = flaky();
        let sink = CollectingSink::default();
        WorkerPool::new(2)
            .run(records(20), &client(&oracle), &sink, &SilentReporter, &CancelToken::new())
            .unwrap();
        assert!(oracle.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_empty_batch() {
        let oracle = flaky();
        let sink = CollectingSink::default();
        let report = WorkerPool::new(4)
            .run(Vec::new(), &client(&oracle), &sink, &SilentReporter, &CancelToken::new())
            .unwrap();
        assert_eq!(report.processed, 0);
        assert!(sink.results.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancelled_before_start_skips_everything() {
        let oracle = flaky();
        let sink = CollectingSink::default();
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = WorkerPool::new(3)
            .run(records(9), &client(&oracle), &sink, &SilentReporter, &cancel)
            .unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.skipped, 9);
        assert!(sink.results.lock().unwrap().is_empty());
    }
}

use std::time::Duration;

/// Trait for reporting pipeline progress.
///
/// The CLI implements it with indicatif bars; tests use `SilentReporter`.
/// All methods have default no-op implementations and may be called from
/// any classification lane.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_progress(&self, _items_seen: usize, _candidates: usize) {}
    fn on_scan_complete(&self, _candidates: usize, _duration_secs: f64) {}
    fn on_classify_start(&self, _total: usize) {}
    fn on_classify_progress(&self, _processed: usize, _total: usize) {}
    fn on_classify_complete(&self, _retained: usize, _duration_secs: f64) {}
    fn on_relocate_start(&self, _total: usize) {}
    fn on_relocate_progress(&self, _done: usize, _total: usize) {}
    fn on_relocate_complete(&self, _moved: usize, _failed: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Linear estimate of the time left given the throughput so far.
pub fn estimate_remaining(processed: usize, total: usize, elapsed: Duration) -> Duration {
    if processed == 0 || processed >= total {
        return Duration::ZERO;
    }
    let per_item = elapsed.as_secs_f64() / processed as f64;
    Duration::from_secs_f64(per_item * (total - processed) as f64)
}

/// `"3m 07s"` style rendering used in progress log lines.
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    format!("{}m {:02}s", secs / 60, secs % 60)
}

// Pipeline metrics module
//
// Lightweight counters logged on shutdown

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Pipeline counters
///
/// Atomic so the pipeline can share one instance behind an `Arc` without
/// locking.
#[derive(Debug)]
pub struct Metrics {
    /// Videos uploaded and moved to Done
    pub files_uploaded: AtomicUsize,

    /// Manifests moved to Done (reconciled or not)
    pub manifests_processed: AtomicUsize,

    /// Files that ended in a failure outcome
    pub files_failed: AtomicUsize,

    /// Files renamed back to their pending name for retry
    pub files_restored: AtomicUsize,

    /// Video titles updated by reconciliation
    pub title_changes: AtomicUsize,

    /// Completed scan passes
    pub passes: AtomicU64,

    /// Total time spent in successful uploads, in milliseconds
    pub total_upload_time_ms: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            files_uploaded: AtomicUsize::new(0),
            manifests_processed: AtomicUsize::new(0),
            files_failed: AtomicUsize::new(0),
            files_restored: AtomicUsize::new(0),
            title_changes: AtomicUsize::new(0),
            passes: AtomicU64::new(0),
            total_upload_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a successful video upload and how long it took
    pub fn record_upload(&self, duration: Duration) {
        self.files_uploaded.fetch_add(1, Ordering::Relaxed);
        self.total_upload_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_manifest(&self) {
        self.manifests_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restore(&self) {
        self.files_restored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_title_changes(&self, count: usize) {
        self.title_changes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_pass(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average upload time per video in milliseconds
    pub fn avg_upload_time_ms(&self) -> f64 {
        let total = self.total_upload_time_ms.load(Ordering::Relaxed);
        let count = self.files_uploaded.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Pipeline Metrics Summary ===");
        tracing::info!(
            "Uptime: {:.2}s over {} passes",
            self.uptime().as_secs_f64(),
            self.passes.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Files: {} uploaded, {} manifests, {} failed, {} restored",
            self.files_uploaded.load(Ordering::Relaxed),
            self.manifests_processed.load(Ordering::Relaxed),
            self.files_failed.load(Ordering::Relaxed),
            self.files_restored.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Total upload time: {:.2}s (avg: {:.2}ms per video)",
            self.total_upload_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_upload_time_ms()
        );
        tracing::info!(
            "Title changes: {}",
            self.title_changes.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

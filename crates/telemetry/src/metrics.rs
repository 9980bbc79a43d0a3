//! Internal metrics collection.
//!
//! Collects import pipeline metrics in-memory; the worker scheduler logs a
//! snapshot periodically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Histogram for duration tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 10ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s, 30s, 1m, 5m
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [
        10, 50, 100, 250, 500, 1_000, 5_000, 10_000, 30_000, 60_000, 300_000,
    ];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the import pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    // Parse stage
    pub parse_jobs_started: Counter,
    pub parse_jobs_failed: Counter,
    pub rows_accepted: Counter,
    pub rows_skipped_date: Counter,
    pub rows_skipped_quota: Counter,
    pub rows_dropped_no_timestamp: Counter,
    pub batches_enqueued: Counter,

    // Insert stage
    pub batches_inserted: Counter,
    pub events_inserted: Counter,
    pub insert_errors: Counter,
    pub progress_update_errors: Counter,

    // Import outcomes
    pub imports_completed: Counter,
    pub imports_failed: Counter,

    // Cleanup
    pub files_deleted: Counter,
    pub file_delete_errors: Counter,
    pub orphans_deleted: Counter,

    // Queue
    pub jobs_consumed: Counter,
    pub job_decode_errors: Counter,
    pub queue_send_errors: Counter,

    // Durations
    pub parse_duration_ms: Histogram,
    pub insert_latency_ms: Histogram,

    // Gauges
    pub active_parse_jobs: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub parse_jobs_started: u64,
    pub parse_jobs_failed: u64,
    pub rows_accepted: u64,
    pub rows_skipped_date: u64,
    pub rows_skipped_quota: u64,
    pub rows_dropped_no_timestamp: u64,
    pub batches_enqueued: u64,
    pub batches_inserted: u64,
    pub events_inserted: u64,
    pub insert_errors: u64,
    pub imports_completed: u64,
    pub imports_failed: u64,
    pub file_delete_errors: u64,
    pub orphans_deleted: u64,
    pub jobs_consumed: u64,
    pub job_decode_errors: u64,
    pub parse_duration_mean_ms: f64,
    pub insert_latency_mean_ms: f64,
    pub active_parse_jobs: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            parse_jobs_started: self.parse_jobs_started.get(),
            parse_jobs_failed: self.parse_jobs_failed.get(),
            rows_accepted: self.rows_accepted.get(),
            rows_skipped_date: self.rows_skipped_date.get(),
            rows_skipped_quota: self.rows_skipped_quota.get(),
            rows_dropped_no_timestamp: self.rows_dropped_no_timestamp.get(),
            batches_enqueued: self.batches_enqueued.get(),
            batches_inserted: self.batches_inserted.get(),
            events_inserted: self.events_inserted.get(),
            insert_errors: self.insert_errors.get(),
            imports_completed: self.imports_completed.get(),
            imports_failed: self.imports_failed.get(),
            file_delete_errors: self.file_delete_errors.get(),
            orphans_deleted: self.orphans_deleted.get(),
            jobs_consumed: self.jobs_consumed.get(),
            job_decode_errors: self.job_decode_errors.get(),
            parse_duration_mean_ms: self.parse_duration_ms.mean(),
            insert_latency_mean_ms: self.insert_latency_ms.mean(),
            active_parse_jobs: self.active_parse_jobs.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}

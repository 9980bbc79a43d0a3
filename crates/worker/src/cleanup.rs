//! Orphan-file cleanup.
//!
//! Parse jobs delete their own file; this sweep catches uploads whose job
//! never ran or whose delete failed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use engine_core::limits::DEFAULT_ORPHAN_MAX_AGE;
use engine_core::{FileStore, Result};
use telemetry::metrics;
use tokio::sync::watch;
use tracing::{error, info};

/// Deletes uploaded files older than `max_age` from one store.
///
/// Holds no state between runs; an external scheduler may call
/// [`OrphanSweep::run_once`] directly.
pub struct OrphanSweep {
    store: Arc<dyn FileStore>,
    max_age: Duration,
}

impl OrphanSweep {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self {
            store,
            max_age: DEFAULT_ORPHAN_MAX_AGE,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// One sweep. Returns the number of files deleted.
    pub async fn run_once(&self) -> Result<u64> {
        let deleted = self.store.delete_older_than(self.max_age).await?;
        metrics().orphans_deleted.inc_by(deleted);
        if deleted > 0 {
            info!(
                deleted = deleted,
                max_age_hours = self.max_age.as_secs() / 3600,
                "Deleted orphaned import files"
            );
        }
        Ok(deleted)
    }

    /// Sweeps once a day at `hour_utc`:00 until `shutdown` flips to true.
    pub async fn run_daily(self, hour_utc: u32, mut shutdown: watch::Receiver<bool>) {
        loop {
            let delay = next_run_delay(Utc::now(), hour_utc);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return,
            }

            if let Err(e) = self.run_once().await {
                error!("Orphan file cleanup failed: {}", e);
            }
        }
    }
}

/// Time from `now` until the next `hour_utc`:00:00.
pub fn next_run_delay(now: DateTime<Utc>, hour_utc: u32) -> Duration {
    let at = NaiveTime::from_hms_opt(hour_utc % 24, 0, 0).unwrap_or(NaiveTime::MIN);
    let mut next = now.date_naive().and_time(at).and_utc();
    if next <= now {
        next += ChronoDuration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

//! Durable consumer positions.
//!
//! Committed positions are written through an [`OffsetStore`], so a
//! restarted worker resumes where the previous one stopped instead of at the
//! broker's start offset.

use crate::config::StartOffset;
use engine_core::{OffsetStore, Result};
use std::sync::Arc;

/// Read position of one topic partition.
pub struct OffsetTracker {
    store: Arc<dyn OffsetStore>,
    topic: String,
    partition: i32,
    next: Option<i64>,
}

impl OffsetTracker {
    pub fn new(store: Arc<dyn OffsetStore>, topic: String, partition: i32) -> Self {
        Self {
            store,
            topic,
            partition,
            next: None,
        }
    }

    /// Next offset to read; `None` until resolved.
    pub fn next(&self) -> Option<i64> {
        self.next
    }

    /// The saved position, if any.
    pub async fn saved(&self) -> Result<Option<i64>> {
        self.store.load(&self.topic, self.partition).await
    }

    /// Sets the position without saving it.
    pub fn start_at(&mut self, next: i64) {
        self.next = Some(next);
    }

    /// Moves past records that carried nothing to handle. Not saved.
    pub fn skip_to(&mut self, next: i64) {
        if self.next.map_or(true, |current| next > current) {
            self.next = Some(next);
        }
    }

    /// Marks everything up to and including `offset` as handled and saves
    /// the new position. Older offsets are ignored.
    pub async fn commit(&mut self, offset: i64) -> Result<()> {
        let next = offset + 1;
        if self.next.is_some_and(|current| next <= current) {
            return Ok(());
        }
        self.next = Some(next);
        self.store.save(&self.topic, self.partition, next).await
    }
}

/// Where a partition consumer starts reading.
///
/// A saved position wins over `start`, clamped to what the broker still
/// retains: `earliest` after retention dropped old records, `latest` after
/// the topic was recreated.
pub fn start_position(saved: Option<i64>, start: StartOffset, earliest: i64, latest: i64) -> i64 {
    match (saved, start) {
        (Some(saved), _) => saved.clamp(earliest, latest.max(earliest)),
        (None, StartOffset::Earliest) => earliest,
        (None, StartOffset::Latest) => latest,
    }
}

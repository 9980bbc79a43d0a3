//! Interfaces to the systems the pipeline reads from and writes to.
//!
//! Production implementations live in the `postgres-store`,
//! `clickhouse-client`, `import-storage` and `redpanda` crates; tests use
//! in-memory doubles.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncRead;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::{EventRecord, EventType, MonthlyCount};
use crate::job::{ImportJob, ImportRecord, ImportStatus, StatusKind};
use crate::tenant::{OrganizationId, SiteId, SubscriptionInfo};

/// Byte stream over an uploaded import file.
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

/// Persists import lifecycle state and progress.
///
/// Implementations never move an import out of `completed` or `failed`;
/// such updates are accepted and ignored.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Records a new `pending` import. Called after admission.
    async fn create_pending(&self, job: &ImportJob) -> Result<()>;

    /// Records a new `pending` import only while fewer than `limit` of the
    /// organization's imports are in one of `active`. Counting and inserting
    /// happen as one step per organization. Returns whether the row was
    /// created.
    async fn create_pending_within_limit(
        &self,
        job: &ImportJob,
        active: &[StatusKind],
        limit: u64,
    ) -> Result<bool>;

    async fn update_status(&self, import_id: Uuid, status: &ImportStatus) -> Result<()>;

    /// Adds `delta` to the imported event counter.
    async fn update_progress(&self, import_id: Uuid, delta: u64) -> Result<()>;

    /// Counts imports for an organization currently in one of `statuses`.
    async fn count_active(&self, organization: &str, statuses: &[StatusKind]) -> Result<u64>;

    async fn get(&self, import_id: Uuid) -> Result<Option<ImportRecord>>;
}

/// Site ownership lookups.
#[async_trait]
pub trait SiteDirectory: Send + Sync {
    async fn organization_for_site(&self, site: SiteId) -> Result<Option<OrganizationId>>;

    async fn sites_for_organization(&self, organization: &str) -> Result<Vec<SiteId>>;
}

/// Subscription tier lookups.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    async fn subscription(&self, organization: &str) -> Result<Option<SubscriptionInfo>>;
}

/// The columnar event store.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Counts events per calendar month for `sites`, restricted to
    /// `event_types`, from `since` (inclusive) until now.
    async fn monthly_event_counts(
        &self,
        sites: &[SiteId],
        event_types: &[EventType],
        since: NaiveDate,
    ) -> Result<Vec<MonthlyCount>>;

    /// Loads all records in one insert. Returns the number written.
    async fn bulk_insert(&self, records: Vec<EventRecord>) -> Result<usize>;
}

/// Storage holding uploaded import files.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Opens a streaming reader. Fails fast if the file cannot be read.
    async fn open(&self, location: &str) -> Result<ByteReader>;

    /// Deletes a file. Deleting a missing file succeeds.
    async fn delete(&self, location: &str) -> Result<()>;

    /// Deletes import files older than `age`, returning how many were removed.
    async fn delete_older_than(&self, age: Duration) -> Result<u64>;
}

/// A message pulled from a queue partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub offset: i64,
    pub payload: Vec<u8>,
}

/// Partitioned job queue with at-least-once delivery.
///
/// Messages with the same key land in the same partition and are delivered
/// in send order; each partition is consumed by exactly one worker.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Number of partitions for `queue`.
    fn partitions(&self, queue: &str) -> u32;

    async fn send(&self, queue: &str, key: &str, payload: Vec<u8>) -> Result<()>;

    /// Waits briefly for messages; an empty result means nothing arrived.
    async fn poll(&self, queue: &str, partition: u32) -> Result<Vec<QueueMessage>>;

    /// Marks every message up to and including `offset` as handled.
    async fn commit(&self, queue: &str, partition: u32, offset: i64) -> Result<()>;
}

/// Durable read positions of queue consumers, one per topic partition.
#[async_trait]
pub trait OffsetStore: Send + Sync {
    /// The next offset to read, if one was ever saved.
    async fn load(&self, topic: &str, partition: i32) -> Result<Option<i64>>;

    /// Records `next_offset` as the position to resume from. Saved positions
    /// never move backwards.
    async fn save(&self, topic: &str, partition: i32, next_offset: i64) -> Result<()>;
}

/// Serializes `job` as JSON and sends it.
pub async fn send_job<T: Serialize + Sync>(
    queue: &dyn JobQueue,
    name: &str,
    key: &str,
    job: &T,
) -> Result<()> {
    let payload = serde_json::to_vec(job)?;
    queue.send(name, key, payload).await
}

/// Decodes a JSON job payload.
pub fn decode_job<T: DeserializeOwned>(message: &QueueMessage) -> Result<T> {
    serde_json::from_slice(&message.payload).map_err(Error::from)
}

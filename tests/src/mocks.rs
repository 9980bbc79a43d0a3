//! In-memory collaborators.
//!
//! Each mock implements the same trait as its production counterpart, so
//! the stages under test run their real code paths without Postgres,
//! ClickHouse or Redpanda.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use engine_core::{
    EventRecord, EventStore, EventType, Error, ImportJob, ImportRecord, ImportStatus, JobQueue,
    MonthKey, MonthlyCount, QueueMessage, Result, SiteDirectory, SiteId, StatusKind, StatusStore,
    SubscriptionInfo, SubscriptionSource,
};
use parking_lot::Mutex;
use uuid::Uuid;

/// Status store that keeps every record and the history of statuses.
#[derive(Clone, Default)]
pub struct MemoryStatusStore {
    records: Arc<Mutex<HashMap<Uuid, ImportRecord>>>,
    history: Arc<Mutex<HashMap<Uuid, Vec<ImportStatus>>>>,
    fail_progress: Arc<Mutex<bool>>,
    fail_completion: Arc<Mutex<bool>>,
    stale_counts: Arc<Mutex<bool>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, import_id: Uuid) -> Option<ImportStatus> {
        self.records.lock().get(&import_id).map(|r| r.status.clone())
    }

    pub fn progress(&self, import_id: Uuid) -> u64 {
        self.records
            .lock()
            .get(&import_id)
            .map(|r| r.imported_events)
            .unwrap_or(0)
    }

    /// Every status written for `import_id`, in order, including `pending`.
    pub fn history(&self, import_id: Uuid) -> Vec<ImportStatus> {
        self.history.lock().get(&import_id).cloned().unwrap_or_default()
    }

    pub fn set_fail_progress(&self, fail: bool) {
        *self.fail_progress.lock() = fail;
    }

    /// Makes writes of `completed` fail.
    pub fn set_fail_completion(&self, fail: bool) {
        *self.fail_completion.lock() = fail;
    }

    /// Makes `count_active` report zero, as a read that raced another
    /// admission would. `create_pending_within_limit` still sees every row.
    pub fn set_stale_counts(&self, stale: bool) {
        *self.stale_counts.lock() = stale;
    }

    fn insert_pending(
        records: &mut HashMap<Uuid, ImportRecord>,
        history: &Mutex<HashMap<Uuid, Vec<ImportStatus>>>,
        job: &ImportJob,
    ) {
        if records.contains_key(&job.import_id) {
            return;
        }
        records.insert(job.import_id, ImportRecord::pending(job));
        history.lock().insert(job.import_id, vec![ImportStatus::Pending]);
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn create_pending(&self, job: &ImportJob) -> Result<()> {
        Self::insert_pending(&mut self.records.lock(), &self.history, job);
        Ok(())
    }

    async fn create_pending_within_limit(
        &self,
        job: &ImportJob,
        active: &[StatusKind],
        limit: u64,
    ) -> Result<bool> {
        let mut records = self.records.lock();
        let count = records
            .values()
            .filter(|r| r.organization == job.organization && active.contains(&r.status.kind()))
            .count() as u64;
        if count >= limit {
            return Ok(false);
        }
        Self::insert_pending(&mut records, &self.history, job);
        Ok(true)
    }

    async fn update_status(&self, import_id: Uuid, status: &ImportStatus) -> Result<()> {
        if *status == ImportStatus::Completed && *self.fail_completion.lock() {
            return Err(Error::database("mock completion failure"));
        }

        let mut records = self.records.lock();
        let record = records
            .get_mut(&import_id)
            .ok_or(Error::ImportNotFound(import_id))?;
        if record.status.is_terminal() {
            return Ok(());
        }

        record.status = status.clone();
        if status.is_terminal() {
            record.completed_at = Some(Utc::now());
        }
        self.history
            .lock()
            .entry(import_id)
            .or_default()
            .push(status.clone());
        Ok(())
    }

    async fn update_progress(&self, import_id: Uuid, delta: u64) -> Result<()> {
        if *self.fail_progress.lock() {
            return Err(Error::database("mock progress failure"));
        }
        let mut records = self.records.lock();
        let record = records
            .get_mut(&import_id)
            .ok_or(Error::ImportNotFound(import_id))?;
        record.imported_events += delta;
        Ok(())
    }

    async fn count_active(&self, organization: &str, statuses: &[StatusKind]) -> Result<u64> {
        if *self.stale_counts.lock() {
            return Ok(0);
        }
        Ok(self
            .records
            .lock()
            .values()
            .filter(|r| r.organization == organization && statuses.contains(&r.status.kind()))
            .count() as u64)
    }

    async fn get(&self, import_id: Uuid) -> Result<Option<ImportRecord>> {
        Ok(self.records.lock().get(&import_id).cloned())
    }
}

/// Fixed site → organization mapping.
#[derive(Clone, Default)]
pub struct StaticSites {
    sites: HashMap<SiteId, String>,
}

impl StaticSites {
    pub fn new(sites: &[(SiteId, &str)]) -> Self {
        Self {
            sites: sites
                .iter()
                .map(|&(site, org)| (site, org.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl SiteDirectory for StaticSites {
    async fn organization_for_site(&self, site: SiteId) -> Result<Option<String>> {
        Ok(self.sites.get(&site).cloned())
    }

    async fn sites_for_organization(&self, organization: &str) -> Result<Vec<SiteId>> {
        let mut sites: Vec<SiteId> = self
            .sites
            .iter()
            .filter(|(_, org)| org.as_str() == organization)
            .map(|(site, _)| *site)
            .collect();
        sites.sort_unstable();
        Ok(sites)
    }
}

/// Fixed organization → subscription mapping.
#[derive(Clone, Default)]
pub struct StaticSubscriptions {
    subscriptions: HashMap<String, SubscriptionInfo>,
}

impl StaticSubscriptions {
    pub fn new(subscriptions: &[(&str, SubscriptionInfo)]) -> Self {
        Self {
            subscriptions: subscriptions
                .iter()
                .map(|(org, info)| (org.to_string(), *info))
                .collect(),
        }
    }
}

#[async_trait]
impl SubscriptionSource for StaticSubscriptions {
    async fn subscription(&self, organization: &str) -> Result<Option<SubscriptionInfo>> {
        Ok(self.subscriptions.get(organization).copied())
    }
}

/// Event store over a vector, with optional failure injection.
#[derive(Clone, Default)]
pub struct MemoryEventStore {
    events: Arc<Mutex<Vec<EventRecord>>>,
    inserts: Arc<Mutex<Vec<usize>>>,
    fail_insert: Arc<Mutex<bool>>,
    fail_counts: Arc<Mutex<bool>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }

    /// Size of each bulk insert, in call order.
    pub fn insert_sizes(&self) -> Vec<usize> {
        self.inserts.lock().clone()
    }

    pub fn set_fail_insert(&self, fail: bool) {
        *self.fail_insert.lock() = fail;
    }

    /// Makes the monthly usage query fail.
    pub fn set_fail_counts(&self, fail: bool) {
        *self.fail_counts.lock() = fail;
    }

    /// Preloads existing events.
    pub fn seed(&self, records: Vec<EventRecord>) {
        self.events.lock().extend(records);
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn monthly_event_counts(
        &self,
        sites: &[SiteId],
        event_types: &[EventType],
        since: NaiveDate,
    ) -> Result<Vec<MonthlyCount>> {
        if *self.fail_counts.lock() {
            return Err(Error::database("mock count failure"));
        }

        let mut counts: HashMap<MonthKey, u64> = HashMap::new();
        for event in self.events.lock().iter() {
            if sites.contains(&event.site_id)
                && event_types.contains(&event.event_type)
                && event.timestamp.date_naive() >= since
            {
                *counts.entry(MonthKey::of(&event.timestamp)).or_default() += 1;
            }
        }

        let mut counts: Vec<MonthlyCount> = counts
            .into_iter()
            .map(|(month, count)| MonthlyCount { month, count })
            .collect();
        counts.sort_by_key(|c| c.month);
        Ok(counts)
    }

    async fn bulk_insert(&self, records: Vec<EventRecord>) -> Result<usize> {
        if *self.fail_insert.lock() {
            return Err(Error::database("mock insert failure"));
        }
        let count = records.len();
        self.inserts.lock().push(count);
        self.events.lock().extend(records);
        Ok(count)
    }
}

/// Queue that records everything sent and delivers nothing on its own.
///
/// Tests drain it with [`RecordingQueue::take`] and hand the jobs to the
/// stage under test.
#[derive(Clone, Default)]
pub struct RecordingQueue {
    sent: Arc<Mutex<Vec<(String, String, Vec<u8>)>>>,
    fail_send: Arc<Mutex<bool>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_send(&self, fail: bool) {
        *self.fail_send.lock() = fail;
    }

    pub fn sent_count(&self, queue: &str) -> usize {
        self.sent.lock().iter().filter(|(q, _, _)| q == queue).count()
    }

    /// Keys of messages sent to `queue`, in send order.
    pub fn keys(&self, queue: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(q, _, _)| q == queue)
            .map(|(_, key, _)| key.clone())
            .collect()
    }

    /// Removes and decodes everything sent to `queue`, in send order.
    pub fn take<T: serde::de::DeserializeOwned>(&self, queue: &str) -> Vec<T> {
        let mut sent = self.sent.lock();
        let (taken, rest): (Vec<_>, Vec<_>) = sent.drain(..).partition(|(q, _, _)| q == queue);
        *sent = rest;
        taken
            .into_iter()
            .map(|(_, _, payload)| {
                serde_json::from_slice(&payload).expect("recorded payload is valid JSON")
            })
            .collect()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    fn partitions(&self, _queue: &str) -> u32 {
        1
    }

    async fn send(&self, queue: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        if *self.fail_send.lock() {
            return Err(Error::queue("mock send failure"));
        }
        self.sent
            .lock()
            .push((queue.to_string(), key.to_string(), payload));
        Ok(())
    }

    async fn poll(&self, _queue: &str, _partition: u32) -> Result<Vec<QueueMessage>> {
        Ok(Vec::new())
    }

    async fn commit(&self, _queue: &str, _partition: u32, _offset: i64) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::StorageKind;

    fn job() -> ImportJob {
        ImportJob {
            site: 1,
            import_id: Uuid::new_v4(),
            platform: "umami".into(),
            storage_location: "/tmp/x.csv".into(),
            storage_kind: StorageKind::Local,
            organization: "org".into(),
            start_date: None,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let store = MemoryStatusStore::new();
        let job = job();
        store.create_pending(&job).await.unwrap();
        store
            .update_status(job.import_id, &ImportStatus::failed("boom"))
            .await
            .unwrap();
        store
            .update_status(job.import_id, &ImportStatus::Completed)
            .await
            .unwrap();

        assert_eq!(store.status(job.import_id), Some(ImportStatus::failed("boom")));
        assert_eq!(store.history(job.import_id).len(), 2);
    }

    #[tokio::test]
    async fn test_recording_queue_take_is_per_queue() {
        let queue = RecordingQueue::new();
        queue.send("a", "k", b"1".to_vec()).await.unwrap();
        queue.send("b", "k", b"2".to_vec()).await.unwrap();

        let a: Vec<u32> = queue.take("a");
        assert_eq!(a, vec![1]);
        assert_eq!(queue.sent_count("a"), 0);
        assert_eq!(queue.sent_count("b"), 1);
    }
}

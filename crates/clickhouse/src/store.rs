//! [`EventStore`] backed by ClickHouse.

use crate::client::ClickHouseClient;
use crate::{insert, query};
use async_trait::async_trait;
use chrono::NaiveDate;
use engine_core::{EventRecord, EventStore, EventType, MonthlyCount, Result, SiteId};

#[derive(Clone)]
pub struct ClickHouseEventStore {
    client: ClickHouseClient,
}

impl ClickHouseEventStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ClickHouseClient {
        &self.client
    }
}

#[async_trait]
impl EventStore for ClickHouseEventStore {
    async fn monthly_event_counts(
        &self,
        sites: &[SiteId],
        event_types: &[EventType],
        since: NaiveDate,
    ) -> Result<Vec<MonthlyCount>> {
        query::monthly_event_counts(&self.client, sites, event_types, since).await
    }

    async fn bulk_insert(&self, records: Vec<EventRecord>) -> Result<usize> {
        insert::insert_events(&self.client, records).await
    }
}

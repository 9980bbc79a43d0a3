//! Partition consumer with manual offset tracking.
//!
//! Each consumer owns one partition of one topic. The read position only
//! advances on [`PartitionConsumer::commit`], so a job whose handler did not
//! finish is fetched again on the next poll (at-least-once). Commits are
//! saved to an [`OffsetStore`] and survive restarts.

use crate::config::RedpandaConfig;
use crate::offsets::{start_position, OffsetTracker};
use engine_core::{Error, OffsetStore, QueueMessage, Result};
use rskafka::client::{
    partition::{OffsetAt, PartitionClient, UnknownTopicHandling},
    Client,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct State {
    client: Option<Arc<PartitionClient>>,
    offsets: OffsetTracker,
}

/// Consumer for a single topic partition.
pub struct PartitionConsumer {
    client: Arc<Client>,
    topic: String,
    partition: i32,
    config: RedpandaConfig,
    state: Mutex<State>,
}

impl PartitionConsumer {
    pub fn new(
        client: Arc<Client>,
        topic: String,
        partition: i32,
        config: RedpandaConfig,
        offsets: Arc<dyn OffsetStore>,
    ) -> Self {
        let offsets = OffsetTracker::new(offsets, topic.clone(), partition);
        Self {
            client,
            topic,
            partition,
            config,
            state: Mutex::new(State {
                client: None,
                offsets,
            }),
        }
    }

    async fn ensure_connected(&self, state: &mut State) -> Result<Arc<PartitionClient>> {
        if let Some(ref client) = state.client {
            return Ok(client.clone());
        }

        let partition_client = self
            .client
            .partition_client(self.topic.clone(), self.partition, UnknownTopicHandling::Retry)
            .await
            .map_err(|e| Error::queue(format!("Failed to get partition client: {}", e)))?;
        let partition_client = Arc::new(partition_client);

        if state.offsets.next().is_none() {
            let saved = state.offsets.saved().await?;
            let earliest = partition_client
                .get_offset(OffsetAt::Earliest)
                .await
                .map_err(|e| Error::queue(format!("Failed to get offset: {}", e)))?;
            let latest = partition_client
                .get_offset(OffsetAt::Latest)
                .await
                .map_err(|e| Error::queue(format!("Failed to get offset: {}", e)))?;
            let offset = start_position(saved, self.config.start_offset, earliest, latest);
            state.offsets.start_at(offset);

            info!(
                topic = %self.topic,
                partition = self.partition,
                offset = offset,
                resumed = saved.is_some(),
                "Consumer initialized at offset"
            );
        }

        state.client = Some(partition_client.clone());
        Ok(partition_client)
    }

    /// Fetches the records after the last committed offset.
    pub async fn fetch(&self) -> Result<Vec<QueueMessage>> {
        let mut state = self.state.lock().await;
        let client = self.ensure_connected(&mut state).await?;
        let current = state.offsets.next().unwrap_or(0);

        let fetched = client
            .fetch_records(
                current,
                1..self.config.fetch_max_bytes,
                self.config.fetch_max_wait_ms,
            )
            .await;

        let (records, _watermark) = match fetched {
            Ok(result) => result,
            Err(e) => {
                // Reconnect on the next poll
                state.client = None;
                return Err(Error::queue(format!("Failed to fetch records: {}", e)));
            }
        };

        let mut messages = Vec::with_capacity(records.len());
        let mut last_seen = None;
        for record in records {
            if record.offset < current {
                continue;
            }
            last_seen = Some(record.offset);
            match record.record.value {
                Some(payload) => messages.push(QueueMessage {
                    offset: record.offset,
                    payload,
                }),
                None => warn!(
                    topic = %self.topic,
                    offset = record.offset,
                    "Skipping record without payload"
                ),
            }
        }

        // Nothing to hand out: step past empty records so they are not refetched
        if messages.is_empty() {
            if let Some(offset) = last_seen {
                state.offsets.skip_to(offset + 1);
            }
        } else {
            debug!(
                topic = %self.topic,
                partition = self.partition,
                count = messages.len(),
                offset_start = current,
                "Fetched jobs from Redpanda"
            );
        }

        Ok(messages)
    }

    /// Marks everything up to and including `offset` as handled and saves
    /// the position. On a save failure the in-memory position still
    /// advances; the next successful commit saves past it.
    pub async fn commit(&self, offset: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.offsets.commit(offset).await.map_err(|e| {
            warn!(
                topic = %self.topic,
                partition = self.partition,
                offset = offset,
                "Failed to save consumer offset: {}",
                e
            );
            e
        })
    }
}

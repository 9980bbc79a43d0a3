//! [`JobQueue`] over Redpanda topics.

use crate::config::RedpandaConfig;
use crate::connection::connect;
use crate::consumer::PartitionConsumer;
use crate::producer::Producer;
use crate::topics::{ensure_topics, TopicConfig};
use async_trait::async_trait;
use engine_core::{Error, JobQueue, OffsetStore, QueueMessage, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// One topic per queue, partitioned by job key.
pub struct RedpandaQueue {
    config: RedpandaConfig,
    producer: Producer,
    /// Partition count per queue name.
    partitions: HashMap<&'static str, u32>,
    /// Consumers per (queue, partition); created up front.
    consumers: HashMap<(&'static str, u32), PartitionConsumer>,
}

impl RedpandaQueue {
    /// Connects, creates missing topics and prepares one consumer per
    /// partition. Consumers resume from the positions in `offsets`.
    pub async fn connect(
        config: RedpandaConfig,
        topics: Vec<TopicConfig>,
        offsets: Arc<dyn OffsetStore>,
    ) -> Result<Self> {
        let client = Arc::new(connect(&config).await?);
        ensure_topics(&client, &config, &topics).await?;

        let mut partitions = HashMap::new();
        let mut consumers = HashMap::new();
        for topic in &topics {
            let count = topic.partitions.max(1) as u32;
            partitions.insert(topic.queue, count);
            for partition in 0..count {
                consumers.insert(
                    (topic.queue, partition),
                    PartitionConsumer::new(
                        client.clone(),
                        config.topic_name(topic.queue),
                        partition as i32,
                        config.clone(),
                        offsets.clone(),
                    ),
                );
            }
        }

        info!(
            brokers = %config.broker_string(),
            sasl = config.has_credentials(),
            queues = topics.len(),
            "Redpanda job queue ready"
        );

        Ok(Self {
            producer: Producer::new(client, config.clone()),
            config,
            partitions,
            consumers,
        })
    }

    fn consumer(&self, queue: &str, partition: u32) -> Result<&PartitionConsumer> {
        self.partitions
            .get_key_value(queue)
            .and_then(|(name, _)| self.consumers.get(&(*name, partition)))
            .ok_or_else(|| Error::queue(format!("Unknown queue partition {}/{}", queue, partition)))
    }
}

#[async_trait]
impl JobQueue for RedpandaQueue {
    fn partitions(&self, queue: &str) -> u32 {
        self.partitions.get(queue).copied().unwrap_or(1)
    }

    async fn send(&self, queue: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        if !self.partitions.contains_key(queue) {
            return Err(Error::queue(format!("Unknown queue: {}", queue)));
        }
        let topic = self.config.topic_name(queue);
        self.producer
            .send(&topic, self.partitions(queue), key, payload)
            .await
    }

    async fn poll(&self, queue: &str, partition: u32) -> Result<Vec<QueueMessage>> {
        self.consumer(queue, partition)?.fetch().await
    }

    async fn commit(&self, queue: &str, partition: u32, offset: i64) -> Result<()> {
        self.consumer(queue, partition)?.commit(offset).await
    }
}

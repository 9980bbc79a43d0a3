//! Topic definitions for the job queues.

use crate::config::RedpandaConfig;
use engine_core::{Error, Result, INSERT_QUEUE, PARSE_QUEUE};
use rskafka::client::Client;
use std::collections::HashSet;
use tracing::info;

/// Topic configuration.
#[derive(Debug, Clone)]
pub struct TopicConfig {
    /// Queue name; the topic name adds the configured prefix.
    pub queue: &'static str,
    pub partitions: i32,
}

impl TopicConfig {
    pub const fn new(queue: &'static str) -> Self {
        Self {
            queue,
            partitions: 4,
        }
    }

    pub const fn with_partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions;
        self
    }
}

/// Topic configurations for the parse and insert queues.
pub fn import_topic_configs(parse_partitions: u32, insert_partitions: u32) -> Vec<TopicConfig> {
    vec![
        TopicConfig::new(PARSE_QUEUE).with_partitions(parse_partitions.max(1) as i32),
        TopicConfig::new(INSERT_QUEUE).with_partitions(insert_partitions.max(1) as i32),
    ]
}

/// Creates the topics that do not exist yet.
pub async fn ensure_topics(
    client: &Client,
    config: &RedpandaConfig,
    topics: &[TopicConfig],
) -> Result<()> {
    let existing: HashSet<String> = client
        .list_topics()
        .await
        .map_err(|e| Error::queue(format!("Failed to list topics: {}", e)))?
        .into_iter()
        .map(|t| t.name)
        .collect();

    let controller = client
        .controller_client()
        .map_err(|e| Error::queue(format!("Failed to get controller client: {}", e)))?;

    for topic in topics {
        let name = config.topic_name(topic.queue);
        if existing.contains(&name) {
            continue;
        }

        controller
            .create_topic(&name, topic.partitions, config.replication_factor, 5_000)
            .await
            .map_err(|e| Error::queue(format!("Failed to create topic {}: {}", name, e)))?;

        info!(topic = %name, partitions = topic.partitions, "Created topic");
    }

    Ok(())
}

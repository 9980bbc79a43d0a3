//! Keyed job producer using rskafka.

use crate::config::RedpandaConfig;
use crate::partitioner::partition_for;
use chrono::Utc;
use engine_core::{Error, Result};
use rskafka::client::{
    partition::{Compression, PartitionClient, UnknownTopicHandling},
    Client,
};
use rskafka::record::Record;
use std::collections::BTreeMap;
use std::sync::Arc;
use telemetry::metrics;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Sends each job to the partition chosen by its key.
pub struct Producer {
    client: Arc<Client>,
    config: RedpandaConfig,
    /// Cached partition clients per topic
    clients: RwLock<BTreeMap<(String, i32), Arc<PartitionClient>>>,
}

impl Producer {
    pub fn new(client: Arc<Client>, config: RedpandaConfig) -> Self {
        Self {
            client,
            config,
            clients: RwLock::new(BTreeMap::new()),
        }
    }

    /// Gets or creates a partition client for a topic.
    async fn get_client(&self, topic: &str, partition: i32) -> Result<Arc<PartitionClient>> {
        let key = (topic.to_string(), partition);

        // Check cache first
        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(&key) {
                return Ok(client.clone());
            }
        }

        let partition_client = self
            .client
            .partition_client(topic.to_string(), partition, UnknownTopicHandling::Retry)
            .await
            .map_err(|e| Error::queue(format!("Failed to get partition client: {}", e)))?;

        let partition_client = Arc::new(partition_client);

        // Cache it
        {
            let mut clients = self.clients.write().await;
            clients.insert(key, partition_client.clone());
        }

        Ok(partition_client)
    }

    fn compression(&self) -> Compression {
        match self.config.compression.as_str() {
            "gzip" => Compression::Gzip,
            "snappy" => Compression::Snappy,
            "lz4" => Compression::Lz4,
            "zstd" => Compression::Zstd,
            _ => Compression::NoCompression,
        }
    }

    /// Produces one record and waits for the broker acknowledgement.
    pub async fn send(&self, topic: &str, partitions: u32, key: &str, payload: Vec<u8>) -> Result<()> {
        let partition = partition_for(key, partitions) as i32;
        let client = self.get_client(topic, partition).await?;
        let bytes = payload.len();

        let record = Record {
            key: Some(key.as_bytes().to_vec()),
            value: Some(payload),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };

        match client.produce(vec![record], self.compression()).await {
            Ok(offsets) => {
                debug!(
                    topic = %topic,
                    partition = partition,
                    offset = ?offsets.first(),
                    bytes = bytes,
                    "Sent job to Redpanda"
                );
                Ok(())
            }
            Err(e) => {
                error!(topic = %topic, partition = partition, "Failed to send job to Redpanda: {}", e);
                metrics().queue_send_errors.inc();
                // Reconnect on the next send
                self.clients.write().await.remove(&(topic.to_string(), partition));
                Err(Error::queue(format!("Failed to produce: {}", e)))
            }
        }
    }
}

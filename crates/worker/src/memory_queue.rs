//! In-process [`JobQueue`] for single-node deployments and tests.
//!
//! Each partition is a bounded channel; a full partition suspends the
//! sender, so a slow insert stage throttles parsing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use engine_core::{Error, JobQueue, QueueMessage, Result};
use redpanda::partition_for;
use tokio::sync::{mpsc, Mutex};

/// Default per-partition channel capacity.
pub const DEFAULT_PARTITION_CAPACITY: usize = 16;

/// How long `poll` waits for the first message.
const POLL_WAIT: Duration = Duration::from_millis(200);

/// Upper bound on messages returned by one poll.
const MAX_POLL_RECORDS: usize = 64;

struct Partition {
    tx: mpsc::Sender<QueueMessage>,
    rx: Mutex<mpsc::Receiver<QueueMessage>>,
}

pub struct MemoryQueue {
    queues: HashMap<String, Vec<Partition>>,
    next_offset: AtomicI64,
    poll_wait: Duration,
}

impl MemoryQueue {
    /// Creates the named queues with the given partition counts.
    pub fn new(queues: &[(&str, u32)], capacity: usize) -> Self {
        let queues = queues
            .iter()
            .map(|&(name, partitions)| {
                let partitions = (0..partitions.max(1))
                    .map(|_| {
                        let (tx, rx) = mpsc::channel(capacity.max(1));
                        Partition {
                            tx,
                            rx: Mutex::new(rx),
                        }
                    })
                    .collect();
                (name.to_string(), partitions)
            })
            .collect();

        Self {
            queues,
            next_offset: AtomicI64::new(0),
            poll_wait: POLL_WAIT,
        }
    }

    pub fn with_poll_wait(mut self, wait: Duration) -> Self {
        self.poll_wait = wait;
        self
    }

    fn partition(&self, queue: &str, partition: u32) -> Result<&Partition> {
        self.queues
            .get(queue)
            .and_then(|partitions| partitions.get(partition as usize))
            .ok_or_else(|| Error::queue(format!("Unknown queue partition {}/{}", queue, partition)))
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    fn partitions(&self, queue: &str) -> u32 {
        self.queues.get(queue).map(|p| p.len() as u32).unwrap_or(1)
    }

    async fn send(&self, queue: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        let target = self.partition(queue, partition_for(key, self.partitions(queue)))?;
        let message = QueueMessage {
            offset: self.next_offset.fetch_add(1, Ordering::Relaxed),
            payload,
        };
        target
            .tx
            .send(message)
            .await
            .map_err(|_| Error::queue(format!("Queue {} is closed", queue)))
    }

    async fn poll(&self, queue: &str, partition: u32) -> Result<Vec<QueueMessage>> {
        let target = self.partition(queue, partition)?;
        let mut rx = target.rx.lock().await;

        let first = match tokio::time::timeout(self.poll_wait, rx.recv()).await {
            Ok(Some(message)) => message,
            Ok(None) | Err(_) => return Ok(Vec::new()),
        };

        let mut messages = vec![first];
        while messages.len() < MAX_POLL_RECORDS {
            match rx.try_recv() {
                Ok(message) => messages.push(message),
                Err(_) => break,
            }
        }
        Ok(messages)
    }

    async fn commit(&self, queue: &str, partition: u32, _offset: i64) -> Result<()> {
        // Delivered messages are already gone from the channel.
        self.partition(queue, partition).map(|_| ())
    }
}

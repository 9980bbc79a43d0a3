//! Redpanda (Kafka-compatible) transport for the import job queues.

pub mod config;
pub mod connection;
pub mod consumer;
pub mod health;
pub mod offsets;
pub mod partitioner;
pub mod producer;
pub mod queue;
pub mod topics;

pub use config::*;
pub use partitioner::partition_for;
pub use queue::RedpandaQueue;
pub use topics::*;

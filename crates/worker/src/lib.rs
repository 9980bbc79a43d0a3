//! Import pipeline workers.
//!
//! - Parse stage: stream an uploaded file, filter by date and quota, batch
//! - Insert stage: transform a batch and bulk-load it into the event store
//! - Partition workers over a [`engine_core::JobQueue`]
//! - Daily orphan-file cleanup

pub mod cleanup;
pub mod context;
pub mod date_range;
pub mod decoder;
pub mod insert;
pub mod intake;
pub mod memory_queue;
pub mod parse;
pub mod pool;
pub mod scheduler;

pub use cleanup::{next_run_delay, OrphanSweep};
pub use context::PipelineContext;
pub use date_range::DateRange;
pub use decoder::RowStream;
pub use insert::{InsertOutcome, InsertStage};
pub use intake::ImportIntake;
pub use memory_queue::MemoryQueue;
pub use parse::{ParseOutcome, ParseStage};
pub use pool::{JobHandler, PartitionWorker};
pub use scheduler::*;

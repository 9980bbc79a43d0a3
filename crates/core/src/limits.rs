//! Fixed limits and formats for the import pipeline.
//!
//! Values that operators may tune (concurrency, partitions, cleanup age) live
//! in configuration; the constants here are part of the pipeline contract.

use std::time::Duration;

// === Batching ===

/// Accepted rows per insert job.
pub const INSERT_BATCH_SIZE: usize = 5000;

/// Rows buffered between the CSV decoder thread and the parse loop.
///
/// Bounds decoder read-ahead: the file is only read as fast as batches are
/// handed to the insert queue.
pub const DECODER_CHANNEL_CAPACITY: usize = 1024;

// === Timeouts ===

/// Wall-clock limit for streaming one import file (5 minutes).
pub const PARSE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

// === Admission ===

/// Default number of pending/processing imports an organization may have.
pub const DEFAULT_CONCURRENT_IMPORT_LIMIT: u64 = 1;

// === Metering ===

/// Sites with an id below this threshold are billed on pageviews only.
pub const LEGACY_SITE_ID_THRESHOLD: u32 = 2000;

// === Formats ===

/// Event timestamp format in source files (UTC).
pub const EVENT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date format for user-supplied range boundaries.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// === Cleanup ===

/// Default age after which an uploaded file is considered orphaned.
pub const DEFAULT_ORPHAN_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

// === Status messages ===

/// Reported for parse failures that are not configuration errors.
pub const GENERIC_PARSE_FAILURE: &str = "An unexpected error occurred during import processing";

/// Reported when a bulk load fails.
pub const GENERIC_INSERT_FAILURE: &str = "Data insertion failed due to unknown error";

/// Reported when the terminal job cannot mark the import completed.
pub const COMPLETION_FAILURE: &str = "Failed to complete import";

//! Telemetry for the import engine.
//!
//! Structured logging through `tracing`, in-process counters for the import
//! pipeline and a health registry for the backing services.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;

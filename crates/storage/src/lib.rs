//! Storage for uploaded import files.
//!
//! Uploads land either on local disk or in an S3-compatible bucket; jobs
//! carry a [`StorageKind`](engine_core::StorageKind) telling which.

pub mod config;
pub mod files;
pub mod local;
pub mod s3;

pub use config::{S3Config, StorageConfig};
pub use files::ImportFiles;
pub use local::LocalFileStore;
pub use s3::S3FileStore;

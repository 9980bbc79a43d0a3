//! Storage configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory local uploads are written to; swept for orphans
    #[serde(default = "default_local_dir")]
    pub local_dir: PathBuf,
    /// Object storage; imports with `object_store` locations fail without it
    #[serde(default)]
    pub s3: Option<S3Config>,
}

fn default_local_dir() -> PathBuf {
    PathBuf::from("uploads/imports")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_dir: default_local_dir(),
            s3: None,
        }
    }
}

/// S3-compatible bucket (AWS S3, Cloudflare R2, MinIO).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for non-AWS providers
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Key prefix under which import files are stored
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "imports/".to_string()
}

impl S3Config {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: None,
            endpoint: None,
            prefix: default_prefix(),
        }
    }
}

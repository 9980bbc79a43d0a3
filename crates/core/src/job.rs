//! Job payloads carried between the parse and insert stages, and the
//! import lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::platform::CanonicalRow;
use crate::tenant::{OrganizationId, SiteId};

/// Queue carrying parse jobs.
pub const PARSE_QUEUE: &str = "import-parse";

/// Queue carrying insert jobs.
pub const INSERT_QUEUE: &str = "import-insert";

/// Where an uploaded import file lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// A path on the worker's local disk.
    Local,
    /// A key in the S3-compatible object store.
    ObjectStore,
}

/// One import attempt: a single uploaded file for a single site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    #[validate(range(min = 1))]
    pub site: SiteId,
    pub import_id: Uuid,
    #[validate(length(min = 1, max = 32))]
    pub platform: String,
    #[validate(length(min = 1, max = 1024))]
    pub storage_location: String,
    pub storage_kind: StorageKind,
    #[validate(length(min = 1))]
    pub organization: OrganizationId,
    /// Inclusive, `yyyy-MM-dd` (UTC).
    pub start_date: Option<String>,
    /// Inclusive, `yyyy-MM-dd` (UTC).
    pub end_date: Option<String>,
}

/// Parse jobs are the full import envelope.
pub type ParseJob = ImportJob;

/// A batch of accepted rows, or the empty terminal marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertJob {
    pub site: SiteId,
    pub import_id: Uuid,
    pub platform: String,
    /// Zero-based send order within the import. The terminal job carries the
    /// number of data batches sent before it.
    pub sequence: u64,
    pub chunk: Vec<CanonicalRow>,
    pub all_chunks_sent: bool,
}

impl InsertJob {
    /// A data batch. Must not be empty.
    pub fn batch(job: &ImportJob, sequence: u64, chunk: Vec<CanonicalRow>) -> Self {
        debug_assert!(!chunk.is_empty(), "data batches carry at least one row");
        Self {
            site: job.site,
            import_id: job.import_id,
            platform: job.platform.clone(),
            sequence,
            chunk,
            all_chunks_sent: false,
        }
    }

    /// The terminal signal: no more batches follow for this import.
    pub fn terminal(job: &ImportJob, batches_sent: u64) -> Self {
        Self {
            site: job.site,
            import_id: job.import_id,
            platform: job.platform.clone(),
            sequence: batches_sent,
            chunk: Vec::new(),
            all_chunks_sent: true,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.all_chunks_sent
    }

    /// An empty chunk is only meaningful as the terminal marker.
    pub fn is_well_formed(&self) -> bool {
        self.all_chunks_sent || !self.chunk.is_empty()
    }
}

/// Status kinds without payload, used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl StatusKind {
    /// Statuses that count against the concurrent import limit.
    pub const ACTIVE: &'static [StatusKind] = &[StatusKind::Pending, StatusKind::Processing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Lifecycle of an import: `pending → processing → {completed | failed}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum ImportStatus {
    Pending,
    Processing,
    Completed,
    Failed(String),
}

impl ImportStatus {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    pub fn kind(&self) -> StatusKind {
        match self {
            Self::Pending => StatusKind::Pending,
            Self::Processing => StatusKind::Processing,
            Self::Completed => StatusKind::Completed,
            Self::Failed(_) => StatusKind::Failed,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }
}

/// Persisted view of one import, as kept by the status store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    pub import_id: Uuid,
    pub site: SiteId,
    pub organization: OrganizationId,
    pub platform: String,
    pub status: ImportStatus,
    pub imported_events: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ImportRecord {
    pub fn pending(job: &ImportJob) -> Self {
        Self {
            import_id: job.import_id,
            site: job.site,
            organization: job.organization.clone(),
            platform: job.platform.clone(),
            status: ImportStatus::Pending,
            imported_events: 0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

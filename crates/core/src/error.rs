//! Unified error types for the import engine.
//!
//! Error codes:
//! - CONFIG_001-004: Job configuration errors (abort before streaming)
//! - STREAM_001-002: Decode and timeout errors while streaming a file
//! - STORE_001-003: Storage, database and queue errors
//! - SUB_001: Missing subscription for a metered organization

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorCode {
    /// CONFIG_001: Platform tag has no registered mapping
    UnsupportedPlatform,
    /// CONFIG_002: Start or end date is not `yyyy-MM-dd`
    InvalidDate,
    /// CONFIG_003: Local import file missing or unreadable
    FileNotReadable,
    /// CONFIG_004: Missing or malformed process configuration
    Invalid,
}

impl ConfigErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedPlatform => "CONFIG_001",
            Self::InvalidDate => "CONFIG_002",
            Self::FileNotReadable => "CONFIG_003",
            Self::Invalid => "CONFIG_004",
        }
    }
}

/// Unified error type for the import engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid {which} date: {value}")]
    InvalidDate { which: &'static str, value: String },

    #[error("Import file is not readable: {path}: {reason}")]
    FileNotReadable { path: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("Import processing timeout exceeded after {0}s")]
    Timeout(u64),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("No subscription found for organization {0}")]
    MissingSubscription(String),

    #[error("import {0} not found")]
    ImportNotFound(Uuid),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn file_not_readable(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::FileNotReadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Configuration errors abort a job before any row is streamed and are
    /// reported to the user with their specific message.
    pub fn is_config(&self) -> bool {
        self.config_code().is_some()
    }

    fn config_code(&self) -> Option<ConfigErrorCode> {
        match self {
            Self::UnsupportedPlatform(_) => Some(ConfigErrorCode::UnsupportedPlatform),
            Self::InvalidDate { .. } => Some(ConfigErrorCode::InvalidDate),
            Self::FileNotReadable { .. } => Some(ConfigErrorCode::FileNotReadable),
            Self::Config(_) => Some(ConfigErrorCode::Invalid),
            _ => None,
        }
    }

    /// Get the stable error code for this error.
    pub fn code(&self) -> &'static str {
        if let Some(code) = self.config_code() {
            return code.code();
        }
        match self {
            Self::Decode(_) => "STREAM_001",
            Self::Timeout(_) => "STREAM_002",
            Self::Storage(_) => "STORE_001",
            Self::Database(_) | Self::ImportNotFound(_) => "STORE_002",
            Self::Queue(_) => "STORE_003",
            Self::MissingSubscription(_) => "SUB_001",
            Self::Validation(_) | Self::Serialization(_) => "VALID_001",
            _ => "INTERNAL_001",
        }
    }
}

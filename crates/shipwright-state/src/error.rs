//! Error types for shipwright-state

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend temporarily unreachable. Callers may retry with backoff;
    /// the storage layer itself never retries.
    #[error("Storage unavailable: {detail}")]
    Unavailable { detail: String },

    /// Storage quota exhausted. Fatal, surfaced to the caller as-is.
    #[error("Storage quota exceeded: {detail}")]
    QuotaExceeded { detail: String },

    /// No object stored under the given key.
    #[error("Object not found: {key}")]
    NotFound { key: String },

    /// A digest string failed validation (not 64 lowercase hex chars).
    #[error("Invalid content digest: {digest}")]
    InvalidDigest { digest: String },

    /// A persisted record could not be encoded or decoded.
    #[error("Serialization failed: {detail}")]
    Serialization { detail: String },
}

impl StorageError {
    /// True when the caller may reasonably retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization {
            detail: err.to_string(),
        }
    }
}

//! Storage trait definitions for Shipwright
//!
//! These traits define the two persistence seams of the pipeline:
//! - `ObjectStore`: keyed blob storage for source artifacts
//! - `TriggerStateStore`: per-agent record of the last built parameter tuple
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Finalize a digest from an already-fed hasher.
    pub fn from_hasher(hasher: Sha256) -> Self {
        use sha2::Digest;
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ObjectStore — keyed artifact blob storage
// ---------------------------------------------------------------------------

/// Keyed blob store for source artifacts.
///
/// Guarantees:
/// - Keys embed the content digest, so a key never maps to two different
///   payloads over its lifetime.
/// - `put` at an existing key is a semantic no-op: implementations may
///   re-transmit bytes but must not fail or branch on prior existence.
/// - `get` returns the exact bytes previously stored.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under the given key.
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()>;

    /// Retrieve bytes by key. Returns `StorageError::NotFound` if absent.
    /// Required only for verification and testing.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Check whether a key exists in the store.
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

// ---------------------------------------------------------------------------
// TriggerState — last built parameter tuple per agent
// ---------------------------------------------------------------------------

/// The parameter tuple recorded after a successful image build.
///
/// The next pipeline run compares its current tuple against this record:
/// equality on all four fields means the build is skipped. Mutated only
/// after a verified build success, never on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerState {
    /// Identifier of the external build project.
    pub build_project: String,
    /// Image tag the build publishes.
    pub image_tag: String,
    /// Image repository the build publishes to.
    pub image_repository: String,
    /// Fingerprint of the source tree that was built.
    pub source_fingerprint: ContentDigest,
}

/// Per-agent trigger state persistence.
///
/// Semantics:
/// - One record per agent name; agents never share records.
/// - `save` replaces the whole record atomically from the caller's view.
/// - Concurrent writers for the same agent are not supported; callers
///   serialize pipeline runs per agent externally.
#[async_trait]
pub trait TriggerStateStore: Send + Sync {
    /// Load the recorded state for an agent, if any.
    async fn load(&self, agent: &str) -> StorageResult<Option<TriggerState>>;

    /// Persist the state for an agent, replacing any prior record.
    async fn save(&self, agent: &str, state: &TriggerState) -> StorageResult<()>;
}

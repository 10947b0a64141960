//! File-backed storage implementations.
//!
//! `FsObjectStore` keeps one file per artifact key under a root directory;
//! `FsTriggerStateStore` keeps one JSON record per agent. Both are the
//! defaults wired up by the CLI for local operation.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::*;

fn io_err(detail: io::Error) -> StorageError {
    StorageError::Unavailable {
        detail: detail.to_string(),
    }
}

// ---------------------------------------------------------------------------
// FsObjectStore
// ---------------------------------------------------------------------------

/// Object store writing each key as a file under `root`.
///
/// Artifact keys are filesystem-safe by construction
/// (`agent-{name}-code-{hex}.zip`), so the key doubles as the file name.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(io_err)?;
        Ok(Self { root })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.object_path(key);
        // Write-then-rename so a crash never leaves a torn object.
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, data).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        debug!(key = %key, bytes = data.len(), "object written");
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.object_path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match tokio::fs::metadata(self.object_path(key)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// FsTriggerStateStore
// ---------------------------------------------------------------------------

/// Trigger state store writing `{agent}.json` under `root`.
#[derive(Debug, Clone)]
pub struct FsTriggerStateStore {
    root: PathBuf,
}

impl FsTriggerStateStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(io_err)?;
        Ok(Self { root })
    }

    fn state_path(&self, agent: &str) -> PathBuf {
        self.root.join(format!("{agent}.json"))
    }
}

#[async_trait]
impl TriggerStateStore for FsTriggerStateStore {
    async fn load(&self, agent: &str) -> StorageResult<Option<TriggerState>> {
        let path = self.state_path(agent);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(e)),
        };
        let state = serde_json::from_slice(&bytes)?;
        Ok(Some(state))
    }

    async fn save(&self, agent: &str, state: &TriggerState) -> StorageResult<()> {
        let path = self.state_path(agent);
        let bytes = serde_json::to_vec_pretty(state)?;
        // Same write-then-rename discipline as the object store: the record
        // on disk is always either the old tuple or the new one, never torn.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        debug!(agent = %agent, path = %path.display(), "trigger state saved");
        Ok(())
    }
}

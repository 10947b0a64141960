//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryObjectStore`, `UnavailableObjectStore`, and
//! `MemoryTriggerStateStore` that satisfy the trait contracts without any
//! external dependencies.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryObjectStore
// ---------------------------------------------------------------------------

/// In-memory object store backed by a `HashMap<key, bytes>`.
///
/// An optional quota limits the number of distinct keys; puts beyond the
/// quota return `StorageError::QuotaExceeded`, matching the fatal error
/// path of a saturated bucket.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    quota: Option<usize>,
    put_count: Mutex<u64>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects puts once `max_objects` distinct keys exist.
    pub fn with_quota(max_objects: usize) -> Self {
        Self {
            quota: Some(max_objects),
            ..Self::default()
        }
    }

    /// Total number of `put` calls observed (including re-puts).
    pub fn put_count(&self) -> u64 {
        *self.put_count.lock().unwrap()
    }

    /// Number of distinct keys currently stored.
    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let mut objects = self.objects.lock().unwrap();
        if let Some(max) = self.quota {
            if !objects.contains_key(key) && objects.len() >= max {
                return Err(StorageError::QuotaExceeded {
                    detail: format!("store limited to {} objects", max),
                });
            }
        }
        objects.insert(key.to_string(), data.to_vec());
        *self.put_count.lock().unwrap() += 1;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let objects = self.objects.lock().unwrap();
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.contains_key(key))
    }
}

// ---------------------------------------------------------------------------
// UnavailableObjectStore
// ---------------------------------------------------------------------------

/// Object store whose every operation fails with `Unavailable`.
///
/// Used to exercise the Uploaded -> Failed pipeline path.
#[derive(Debug, Default)]
pub struct UnavailableObjectStore;

impl UnavailableObjectStore {
    pub fn new() -> Self {
        Self
    }

    fn err() -> StorageError {
        StorageError::Unavailable {
            detail: "backend offline".to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for UnavailableObjectStore {
    async fn put(&self, _key: &str, _data: &[u8]) -> StorageResult<()> {
        Err(Self::err())
    }

    async fn get(&self, _key: &str) -> StorageResult<Vec<u8>> {
        Err(Self::err())
    }

    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Err(Self::err())
    }
}

// ---------------------------------------------------------------------------
// MemoryTriggerStateStore
// ---------------------------------------------------------------------------

/// In-memory trigger state store backed by a `HashMap<agent, TriggerState>`.
#[derive(Debug, Default)]
pub struct MemoryTriggerStateStore {
    states: Mutex<HashMap<String, TriggerState>>,
    save_count: Mutex<u64>,
    fail_saves: bool,
}

impl MemoryTriggerStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose saves fail with `Unavailable` while loads keep working.
    /// Exercises the build-succeeded-but-unrecorded path.
    pub fn with_failing_saves() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    /// Total number of `save` calls observed.
    pub fn save_count(&self) -> u64 {
        *self.save_count.lock().unwrap()
    }
}

#[async_trait]
impl TriggerStateStore for MemoryTriggerStateStore {
    async fn load(&self, agent: &str) -> StorageResult<Option<TriggerState>> {
        let states = self.states.lock().unwrap();
        Ok(states.get(agent).cloned())
    }

    async fn save(&self, agent: &str, state: &TriggerState) -> StorageResult<()> {
        if self.fail_saves {
            return Err(StorageError::Unavailable {
                detail: "state backend offline".to_string(),
            });
        }
        let mut states = self.states.lock().unwrap();
        states.insert(agent.to_string(), state.clone());
        *self.save_count.lock().unwrap() += 1;
        Ok(())
    }
}

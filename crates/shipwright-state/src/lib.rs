//! Shipwright-State: persistence layer for the Shipwright deploy pipeline.
//!
//! This crate owns the storage abstractions the pipeline orchestrator is
//! written against, plus the implementations shipped with the CLI.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: content-addressed artifact storage and the per-agent trigger
//! state record that drives skip/rebuild decisions.
//!
//! ## Key Components
//!
//! - `ObjectStore`: keyed blob storage for source artifacts
//! - `TriggerStateStore`: one mutable record per agent holding the last
//!   successfully built parameter tuple
//! - `fakes`: in-memory implementations for tests
//! - `FsObjectStore` / `FsTriggerStateStore`: file-backed implementations

mod error;
pub mod fakes;
mod fs_store;
pub mod storage_traits;

pub use error::StorageError;
pub use fs_store::{FsObjectStore, FsTriggerStateStore};
pub use storage_traits::{
    ContentDigest, ObjectStore, StorageResult, TriggerState, TriggerStateStore,
};

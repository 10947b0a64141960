//! Error taxonomy for the deploy pipeline.
//!
//! Every stage fails fast: the first error aborts the remaining pipeline
//! and names the stage it came from. No error is swallowed or downgraded;
//! external backend detail is carried through verbatim.

use shipwright_state::StorageError;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline stages, in execution order. Used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fingerprint,
    Upload,
    Build,
    Deploy,
}

impl Stage {
    /// Stage name as reported in terminal errors and CLI exit messages.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Fingerprint => "fingerprint",
            Stage::Upload => "upload",
            Stage::Build => "build",
            Stage::Deploy => "deploy",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Errors produced by the deploy pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Local filesystem unreadable while scanning the source tree. Fatal.
    #[error("Source tree unreadable at {path}: {detail}")]
    Io { path: String, detail: String },

    /// The source tree contains zero files: ambiguous build input. Fatal.
    #[error("Source tree at {root} contains no files")]
    EmptyTree { root: String },

    /// Artifact object store failure. `Unavailable` is retryable by the
    /// caller (the pipeline performs no implicit retry); `QuotaExceeded`
    /// is fatal.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Trigger state store failure while loading or saving the recorded
    /// tuple. Attributed to the build stage, where the record is consulted
    /// and written; a save failure after a successful build leaves the
    /// build unrecorded, so the next run re-executes it.
    #[error("Trigger state store: {source}")]
    State {
        #[source]
        source: StorageError,
    },

    /// The external build executor failed, timed out, or could not be
    /// spawned. Fatal for this run; trigger state is never mutated, so a
    /// re-run with unchanged inputs retries the build instead of skipping.
    #[error("Build failed: {detail}")]
    BuildFailed {
        detail: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The runtime backend rejected the deployment upsert. The deployment
    /// is left fully on its prior configuration.
    #[error("Runtime backend rejected deployment: {detail}")]
    DeployRejected { detail: String },
}

impl PipelineError {
    /// The pipeline stage this error terminates.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Io { .. } | PipelineError::EmptyTree { .. } => Stage::Fingerprint,
            PipelineError::Storage(_) => Stage::Upload,
            PipelineError::State { .. } | PipelineError::BuildFailed { .. } => Stage::Build,
            PipelineError::DeployRejected { .. } => Stage::Deploy,
        }
    }

    /// True when the caller may reasonably retry the whole run.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Storage(e) => e.is_retryable(),
            PipelineError::State { source } => source.is_retryable(),
            _ => false,
        }
    }
}

//! Shipwright Core - incremental build & deploy orchestration
//!
//! Provides the pipeline that ships one agent's container:
//! - Fingerprints the agent's source tree (content-addressed, deterministic)
//! - Archives and uploads the source as an immutable artifact
//! - Triggers an external image build only when the fingerprint changed
//! - Upserts the managed runtime pointing at the freshly built image
//!
//! The content fingerprint is threaded through every stage as a correlation
//! key and lands in the deployed environment as `CODE_VERSION`, so a running
//! agent can always report the exact source it was built from.

pub mod archive;
pub mod artifact;
pub mod deploy;
pub mod error;
pub mod executor;
pub mod fakes;
pub mod fingerprint;
pub mod http_backend;
pub mod obs;
pub mod pipeline;
pub mod telemetry;
pub mod trigger;

// Re-export key types
pub use artifact::{artifact_key, ArtifactRef, ArtifactStore};
pub use deploy::{
    ImageRef, KnowledgeParams, RuntimeBackend, RuntimeDeployer, RuntimeDeploymentRef,
    UpsertRequest, ENV_CODE_VERSION, ENV_KB_SIMILARITY_THRESHOLD, ENV_KNOWLEDGE_BASE_ID,
};
pub use error::{PipelineError, Result, Stage};
pub use executor::{BuildExecutor, BuildReport, BuildRequest, ProcessBuildExecutor};
pub use fingerprint::SourceTree;
pub use http_backend::HttpRuntimeBackend;
pub use pipeline::{plan, AgentSpec, ApplyReport, Pipeline, PlanReport};
pub use telemetry::init_tracing;
pub use trigger::{evaluate, BuildTrigger, TriggerDecision, TriggerOutcome};

//! In-memory fakes for the pipeline's external collaborators (testing only)
//!
//! Provides `ScriptedBuildExecutor`, `RecordingRuntimeBackend`, and
//! `RejectingRuntimeBackend` so pipeline behavior can be tested without a
//! real build system or runtime backend.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::deploy::{RuntimeBackend, RuntimeDeploymentRef, UpsertRequest};
use crate::error::{PipelineError, Result};
use crate::executor::{BuildExecutor, BuildReport, BuildRequest};

// ---------------------------------------------------------------------------
// ScriptedBuildExecutor
// ---------------------------------------------------------------------------

/// Build executor with a scripted outcome that records every invocation.
#[derive(Debug, Default)]
pub struct ScriptedBuildExecutor {
    failure: Option<String>,
    invocations: Mutex<Vec<BuildRequest>>,
}

impl ScriptedBuildExecutor {
    /// Executor whose builds always succeed.
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Executor whose builds always fail with the given detail.
    pub fn failing(detail: &str) -> Self {
        Self {
            failure: Some(detail.to_string()),
            ..Self::default()
        }
    }

    /// Number of build invocations observed.
    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    /// All recorded build requests, in invocation order.
    pub fn invocations(&self) -> Vec<BuildRequest> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl BuildExecutor for ScriptedBuildExecutor {
    async fn build(&self, request: &BuildRequest) -> Result<BuildReport> {
        self.invocations.lock().unwrap().push(request.clone());
        if let Some(detail) = &self.failure {
            return Err(PipelineError::BuildFailed {
                detail: detail.clone(),
                exit_code: Some(1),
                stderr: detail.clone(),
            });
        }
        Ok(BuildReport {
            exit_code: 0,
            stdout: format!("built {}:{}", request.image_repository, request.image_tag),
            stderr: String::new(),
            duration_ms: 1,
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingRuntimeBackend
// ---------------------------------------------------------------------------

/// Runtime backend that records upserts and returns deterministic refs.
#[derive(Debug, Default)]
pub struct RecordingRuntimeBackend {
    upserts: Mutex<Vec<UpsertRequest>>,
}

impl RecordingRuntimeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded upsert requests, in call order.
    pub fn upserts(&self) -> Vec<UpsertRequest> {
        self.upserts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RuntimeBackend for RecordingRuntimeBackend {
    async fn upsert(&self, request: &UpsertRequest) -> Result<RuntimeDeploymentRef> {
        self.upserts.lock().unwrap().push(request.clone());
        Ok(RuntimeDeploymentRef {
            deployment_id: format!("deployment-{}", request.agent_name),
            endpoint_id: format!("endpoint-{}", request.agent_name),
        })
    }
}

// ---------------------------------------------------------------------------
// RejectingRuntimeBackend
// ---------------------------------------------------------------------------

/// Runtime backend that rejects every upsert with a fixed detail.
#[derive(Debug)]
pub struct RejectingRuntimeBackend {
    detail: String,
}

impl RejectingRuntimeBackend {
    pub fn new(detail: &str) -> Self {
        Self {
            detail: detail.to_string(),
        }
    }
}

#[async_trait]
impl RuntimeBackend for RejectingRuntimeBackend {
    async fn upsert(&self, _request: &UpsertRequest) -> Result<RuntimeDeploymentRef> {
        Err(PipelineError::DeployRejected {
            detail: self.detail.clone(),
        })
    }
}

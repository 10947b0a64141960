//! Sequential pipeline runner.
//!
//! One run per agent per invocation, strictly ordered:
//! fingerprint -> upload -> trigger (skip | build) -> deploy. The content
//! fingerprint is threaded through every stage; each stage's failure aborts
//! the rest of the run. `plan` computes the skip/run decision with no side
//! effects at all.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shipwright_state::{ContentDigest, ObjectStore, TriggerState, TriggerStateStore};
use tracing::info;
use uuid::Uuid;

use crate::archive::write_archive;
use crate::artifact::{artifact_key, ArtifactRef, ArtifactStore};
use crate::deploy::{ImageRef, KnowledgeParams, RuntimeBackend, RuntimeDeployer, RuntimeDeploymentRef};
use crate::error::{PipelineError, Result};
use crate::executor::{BuildExecutor, BuildRequest};
use crate::fingerprint::SourceTree;
use crate::obs;
use crate::trigger::{evaluate, BuildTrigger, TriggerDecision, TriggerOutcome};

/// Configuration for one agent's deployable unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Agent name; part of every storage and state key.
    pub agent_name: String,
    /// Root of the agent's source tree.
    pub source_dir: PathBuf,
    /// Identifier of the external build project.
    pub build_project: String,
    /// Image repository the build publishes to.
    pub image_repository: String,
    /// Image tag the build publishes.
    pub image_tag: String,
    /// Registry base URL.
    pub registry_url: String,
    /// Region the build runs in.
    pub region: String,
    /// Execution role passed to the runtime backend.
    pub role_arn: String,
    /// Hard timeout for the external build; 0 disables the bound.
    pub build_timeout_secs: u64,
    /// Optional knowledge/context wiring for the deployed environment.
    pub knowledge: Option<KnowledgeParams>,
}

impl AgentSpec {
    /// The parameter tuple compared against the recorded trigger state.
    pub fn trigger_state(&self, fingerprint: ContentDigest) -> TriggerState {
        TriggerState {
            build_project: self.build_project.clone(),
            image_tag: self.image_tag.clone(),
            image_repository: self.image_repository.clone(),
            source_fingerprint: fingerprint,
        }
    }

    /// The image the build publishes.
    pub fn image(&self) -> ImageRef {
        ImageRef {
            repository: self.image_repository.clone(),
            tag: self.image_tag.clone(),
        }
    }

    fn build_request(&self, source_location: String) -> BuildRequest {
        BuildRequest {
            project: self.build_project.clone(),
            region: self.region.clone(),
            image_repository: self.image_repository.clone(),
            image_tag: self.image_tag.clone(),
            registry_url: self.registry_url.clone(),
            source_location,
            timeout_secs: self.build_timeout_secs,
        }
    }
}

/// Report of a side-effect-free plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub agent_name: String,
    pub fingerprint: ContentDigest,
    pub artifact_key: String,
    pub decision: TriggerDecision,
    pub last_state: Option<TriggerState>,
}

/// Report of a completed apply.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    /// Correlation id for this run's log lines.
    pub run_id: String,
    pub agent_name: String,
    pub fingerprint: ContentDigest,
    pub artifact: ArtifactRef,
    pub build: TriggerOutcome,
    pub deployment: RuntimeDeploymentRef,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ApplyReport {
    /// True when the image build was skipped (inputs unchanged).
    pub fn build_skipped(&self) -> bool {
        self.build.was_skipped()
    }
}

/// Compute the skip/run decision for an agent without side effects.
///
/// Reads the source tree and the recorded trigger state; uploads nothing,
/// builds nothing, deploys nothing.
pub async fn plan(states: &dyn TriggerStateStore, spec: &AgentSpec) -> Result<PlanReport> {
    let tree = SourceTree::scan(&spec.source_dir)?;
    let fingerprint = tree.fingerprint()?;
    let last_state = states
        .load(&spec.agent_name)
        .await
        .map_err(|e| PipelineError::State { source: e })?;
    let current = spec.trigger_state(fingerprint.clone());
    let decision = evaluate(&current, last_state.as_ref());

    Ok(PlanReport {
        agent_name: spec.agent_name.clone(),
        artifact_key: artifact_key(&spec.agent_name, &fingerprint),
        fingerprint,
        decision,
        last_state,
    })
}

/// The deploy pipeline for agent services.
///
/// Runs for distinct agents are independent and may proceed concurrently
/// (agent name is part of every key). Runs for the same agent must be
/// serialized externally: one active run per agent at a time.
pub struct Pipeline {
    states: Arc<dyn TriggerStateStore>,
    artifacts: ArtifactStore,
    trigger: BuildTrigger,
    deployer: RuntimeDeployer,
}

impl Pipeline {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        states: Arc<dyn TriggerStateStore>,
        executor: Arc<dyn BuildExecutor>,
        backend: Arc<dyn RuntimeBackend>,
    ) -> Self {
        Self {
            artifacts: ArtifactStore::new(objects),
            trigger: BuildTrigger::new(states.clone(), executor),
            deployer: RuntimeDeployer::new(backend),
            states,
        }
    }

    /// Side-effect-free skip/run report. See [`plan`].
    pub async fn plan(&self, spec: &AgentSpec) -> Result<PlanReport> {
        plan(self.states.as_ref(), spec).await
    }

    /// Run the full pipeline for one agent.
    ///
    /// Stage order is strict: a storage failure means no build is attempted;
    /// a build failure means no deployment is attempted and the trigger
    /// state stays untouched. A skipped build still re-applies the
    /// deployment parameters so the runtime converges on the spec.
    pub async fn apply(&self, spec: &AgentSpec) -> Result<ApplyReport> {
        let run_id = Uuid::new_v4().to_string();
        let _span = obs::RunSpan::enter(&run_id, &spec.agent_name);
        let started_at = Utc::now();
        let start = Instant::now();

        // Stage: fingerprint
        obs::emit_stage_started(&spec.agent_name, "fingerprint");
        let tree = SourceTree::scan(&spec.source_dir)?;
        let fingerprint = tree.fingerprint()?;
        obs::emit_stage_completed(&spec.agent_name, "fingerprint", fingerprint.short());

        // Stage: upload
        obs::emit_stage_started(&spec.agent_name, "upload");
        let archive = write_archive(&tree)?;
        let artifact = self
            .artifacts
            .put(&spec.agent_name, &fingerprint, &archive)
            .await?;
        obs::emit_stage_completed(&spec.agent_name, "upload", &artifact.key);

        // Stage: build (trigger decides skip vs run)
        obs::emit_stage_started(&spec.agent_name, "build");
        let current = spec.trigger_state(fingerprint.clone());
        let request = spec.build_request(artifact.key.clone());
        let build = self
            .trigger
            .fire(&spec.agent_name, &current, &request)
            .await?;
        let build_detail = if build.was_skipped() { "skipped" } else { "built" };
        obs::emit_stage_completed(&spec.agent_name, "build", build_detail);

        // Stage: deploy (always, so parameters converge even on skip)
        obs::emit_stage_started(&spec.agent_name, "deploy");
        let image_uri = spec.image().uri(&spec.registry_url);
        let deployment = self
            .deployer
            .apply(
                &spec.agent_name,
                &spec.role_arn,
                image_uri,
                &fingerprint,
                spec.knowledge.as_ref(),
            )
            .await?;
        obs::emit_stage_completed(&spec.agent_name, "deploy", &deployment.deployment_id);

        let duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_run_finished(
            &spec.agent_name,
            fingerprint.short(),
            build.was_skipped(),
            duration_ms,
        );
        info!(
            agent = %spec.agent_name,
            deployment_id = %deployment.deployment_id,
            "pipeline run complete"
        );

        Ok(ApplyReport {
            run_id,
            agent_name: spec.agent_name.clone(),
            fingerprint,
            artifact,
            build,
            deployment,
            started_at,
            duration_ms,
        })
    }
}

//! Integration tests for the deploy pipeline with in-memory fakes.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use shipwright_core::fakes::{
    RecordingRuntimeBackend, RejectingRuntimeBackend, ScriptedBuildExecutor,
};
use shipwright_core::{AgentSpec, Pipeline, PipelineError, Stage, ENV_CODE_VERSION};
use shipwright_state::fakes::{
    MemoryObjectStore, MemoryTriggerStateStore, UnavailableObjectStore,
};
use shipwright_state::{ObjectStore, TriggerStateStore};

fn write_source(dir: &Path) {
    fs::write(dir.join("agent.py"), "entrypoint").unwrap();
    fs::create_dir(dir.join("app")).unwrap();
    fs::write(dir.join("app/main.py"), "handler").unwrap();
    fs::write(dir.join("app/config.py"), "settings").unwrap();
}

fn spec(dir: &Path) -> AgentSpec {
    AgentSpec {
        agent_name: "supervisor".to_string(),
        source_dir: dir.to_path_buf(),
        build_project: "agent-builder".to_string(),
        image_repository: "agents/supervisor".to_string(),
        image_tag: "latest".to_string(),
        registry_url: "registry.example.com".to_string(),
        region: "us-west-2".to_string(),
        role_arn: "arn:aws:iam::123456789012:role/agent-runtime".to_string(),
        build_timeout_secs: 60,
        knowledge: None,
    }
}

struct Harness {
    objects: Arc<MemoryObjectStore>,
    states: Arc<MemoryTriggerStateStore>,
    executor: Arc<ScriptedBuildExecutor>,
    backend: Arc<RecordingRuntimeBackend>,
    pipeline: Pipeline,
}

impl Harness {
    fn new(executor: ScriptedBuildExecutor) -> Self {
        let objects = Arc::new(MemoryObjectStore::new());
        let states = Arc::new(MemoryTriggerStateStore::new());
        let executor = Arc::new(executor);
        let backend = Arc::new(RecordingRuntimeBackend::new());
        let pipeline = Pipeline::new(
            objects.clone(),
            states.clone(),
            executor.clone(),
            backend.clone(),
        );
        Self {
            objects,
            states,
            executor,
            backend,
            pipeline,
        }
    }
}

/// Scenario A: fresh agent, empty prior state -> full build and deploy.
#[tokio::test]
async fn fresh_agent_builds_and_deploys() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path());
    let h = Harness::new(ScriptedBuildExecutor::succeeding());
    let spec = spec(dir.path());

    let report = h.pipeline.apply(&spec).await.expect("apply failed");

    assert!(!report.build_skipped());
    assert_eq!(h.executor.invocation_count(), 1);

    // Artifact uploaded under the fingerprint-derived key.
    assert!(h.objects.exists(&report.artifact.key).await.unwrap());
    assert_eq!(
        report.artifact.key,
        format!(
            "agent-supervisor-code-{}.zip",
            report.fingerprint.as_str()
        )
    );

    // Deployment environment carries the fingerprint.
    let upserts = h.backend.upserts();
    assert_eq!(upserts.len(), 1);
    assert_eq!(
        upserts[0].environment.get(ENV_CODE_VERSION),
        Some(&report.fingerprint.as_str().to_string())
    );
    assert_eq!(
        upserts[0].image_uri,
        "registry.example.com/agents/supervisor:latest"
    );

    // Trigger state recorded for the next run.
    let state = h.states.load("supervisor").await.unwrap().unwrap();
    assert_eq!(state.source_fingerprint, report.fingerprint);
}

/// Scenario B: unchanged source reapplied -> build skipped, deployment
/// parameters still re-applied, executor never invoked a second time.
#[tokio::test]
async fn unchanged_source_skips_build_but_redeploys() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path());
    let h = Harness::new(ScriptedBuildExecutor::succeeding());
    let spec = spec(dir.path());

    let first = h.pipeline.apply(&spec).await.unwrap();
    let second = h.pipeline.apply(&spec).await.unwrap();

    assert!(!first.build_skipped());
    assert!(second.build_skipped());
    assert_eq!(second.fingerprint, first.fingerprint);
    assert_eq!(h.executor.invocation_count(), 1);

    // Both runs deployed; the artifact was re-put idempotently.
    assert_eq!(h.backend.upserts().len(), 2);
    assert_eq!(h.objects.object_count(), 1);
}

/// Scenario C: build failure -> run terminates at the build stage; the
/// runtime backend is never called and trigger state is untouched.
#[tokio::test]
async fn build_failure_stops_before_deploy() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path());
    let h = Harness::new(ScriptedBuildExecutor::failing("docker build broke"));
    let spec = spec(dir.path());

    let err = h.pipeline.apply(&spec).await.unwrap_err();
    assert_eq!(err.stage(), Stage::Build);
    assert!(matches!(err, PipelineError::BuildFailed { .. }));

    assert!(h.backend.upserts().is_empty());
    assert!(h.states.load("supervisor").await.unwrap().is_none());
}

/// After a failed build, an unchanged re-run retries the build rather than
/// skipping it (nothing was persisted by the failed run).
#[tokio::test]
async fn failed_build_is_retried_on_rerun() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path());
    let spec = spec(dir.path());

    let failing = Harness::new(ScriptedBuildExecutor::failing("flaky builder"));
    failing.pipeline.apply(&spec).await.unwrap_err();

    // Same stores, now with a healthy executor.
    let executor = Arc::new(ScriptedBuildExecutor::succeeding());
    let backend = Arc::new(RecordingRuntimeBackend::new());
    let pipeline = Pipeline::new(
        failing.objects.clone(),
        failing.states.clone(),
        executor.clone(),
        backend.clone(),
    );

    let report = pipeline.apply(&spec).await.unwrap();
    assert!(!report.build_skipped());
    assert_eq!(executor.invocation_count(), 1);
    assert_eq!(backend.upserts().len(), 1);
}

/// Storage failure during upload -> no build is attempted.
#[tokio::test]
async fn storage_failure_stops_before_build() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path());
    let spec = spec(dir.path());

    let objects = Arc::new(UnavailableObjectStore::new());
    let states = Arc::new(MemoryTriggerStateStore::new());
    let executor = Arc::new(ScriptedBuildExecutor::succeeding());
    let backend = Arc::new(RecordingRuntimeBackend::new());
    let pipeline = Pipeline::new(objects, states.clone(), executor.clone(), backend.clone());

    let err = pipeline.apply(&spec).await.unwrap_err();
    assert_eq!(err.stage(), Stage::Upload);
    assert!(err.is_retryable());

    assert_eq!(executor.invocation_count(), 0);
    assert!(backend.upserts().is_empty());
    assert!(states.load("supervisor").await.unwrap().is_none());
}

/// Deploy rejection surfaces the backend's raw detail and names the stage.
#[tokio::test]
async fn deploy_rejection_names_stage_and_detail() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path());
    let spec = spec(dir.path());

    let objects = Arc::new(MemoryObjectStore::new());
    let states = Arc::new(MemoryTriggerStateStore::new());
    let executor = Arc::new(ScriptedBuildExecutor::succeeding());
    let backend = Arc::new(RejectingRuntimeBackend::new("quota exhausted in region"));
    let pipeline = Pipeline::new(objects, states, executor, backend);

    let err = pipeline.apply(&spec).await.unwrap_err();
    assert_eq!(err.stage(), Stage::Deploy);
    assert!(err.to_string().contains("quota exhausted in region"));
}

/// Plan agrees with apply's decision and performs no side effects.
#[tokio::test]
async fn plan_is_side_effect_free_and_consistent() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path());
    let h = Harness::new(ScriptedBuildExecutor::succeeding());
    let spec = spec(dir.path());

    let before = h.pipeline.plan(&spec).await.unwrap();
    assert_eq!(
        before.decision,
        shipwright_core::TriggerDecision::Run
    );
    // No uploads, builds, or deploys happened.
    assert_eq!(h.objects.object_count(), 0);
    assert_eq!(h.executor.invocation_count(), 0);
    assert!(h.backend.upserts().is_empty());

    let report = h.pipeline.apply(&spec).await.unwrap();
    assert_eq!(report.fingerprint, before.fingerprint);
    assert!(!report.build_skipped());

    let after = h.pipeline.plan(&spec).await.unwrap();
    assert_eq!(after.decision, shipwright_core::TriggerDecision::Skip);
    assert_eq!(after.last_state.unwrap().source_fingerprint, report.fingerprint);
}

/// Distinct agents never share artifact keys or trigger state.
#[tokio::test]
async fn agents_are_isolated() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    write_source(dir_a.path());
    write_source(dir_b.path());

    let h = Harness::new(ScriptedBuildExecutor::succeeding());
    let mut spec_a = spec(dir_a.path());
    spec_a.agent_name = "alpha".to_string();
    let mut spec_b = spec(dir_b.path());
    spec_b.agent_name = "beta".to_string();

    let report_a = h.pipeline.apply(&spec_a).await.unwrap();
    let report_b = h.pipeline.apply(&spec_b).await.unwrap();

    // Identical source, but per-agent keys and state records.
    assert_eq!(report_a.fingerprint, report_b.fingerprint);
    assert_ne!(report_a.artifact.key, report_b.artifact.key);
    assert!(h.states.load("alpha").await.unwrap().is_some());
    assert!(h.states.load("beta").await.unwrap().is_some());
    assert_eq!(h.objects.object_count(), 2);
}

/// A source change after a successful run flips the next run back to build.
#[tokio::test]
async fn source_change_triggers_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path());
    let h = Harness::new(ScriptedBuildExecutor::succeeding());
    let spec = spec(dir.path());

    let first = h.pipeline.apply(&spec).await.unwrap();
    fs::write(dir.path().join("agent.py"), "entrypoint v2").unwrap();
    let second = h.pipeline.apply(&spec).await.unwrap();

    assert_ne!(first.fingerprint, second.fingerprint);
    assert!(!second.build_skipped());
    assert_eq!(h.executor.invocation_count(), 2);
    assert_eq!(h.objects.object_count(), 2);

    // The recorded state now reflects the new fingerprint.
    let state = h.states.load("supervisor").await.unwrap().unwrap();
    assert_eq!(state.source_fingerprint, second.fingerprint);
}

//! Change-triggered build evaluation.
//!
//! The trigger compares the current parameter tuple against the last
//! recorded one and skips the build only on exact equality of all four
//! fields. State is persisted strictly after a verified build success, so a
//! failed or interrupted run re-executes the build on the next evaluation
//! instead of silently skipping it (at-least-once build semantics).

use std::sync::Arc;

use shipwright_state::{TriggerState, TriggerStateStore};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::executor::{BuildExecutor, BuildReport, BuildRequest};

/// Outcome of a skip/run evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerDecision {
    /// All four fields match the recorded state: nothing to build.
    Skip,
    /// At least one field differs (or no state is recorded): build.
    Run,
}

/// Decide whether a rebuild is required.
///
/// Pure function: `Skip` iff `last` records exactly `current` (project,
/// tag, repository, and fingerprint all equal).
pub fn evaluate(current: &TriggerState, last: Option<&TriggerState>) -> TriggerDecision {
    match last {
        Some(recorded) if recorded == current => TriggerDecision::Skip,
        _ => TriggerDecision::Run,
    }
}

/// Outcome of firing the trigger.
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    /// Inputs unchanged; no build executed.
    Skipped,
    /// Build executed and succeeded.
    Built(BuildReport),
}

impl TriggerOutcome {
    pub fn was_skipped(&self) -> bool {
        matches!(self, TriggerOutcome::Skipped)
    }
}

/// Evaluates the trigger and drives the external build executor.
///
/// Concurrent invocations for the same agent are not supported: callers
/// serialize runs per agent externally (single active pipeline run per
/// agent). Distinct agents are independent.
pub struct BuildTrigger {
    states: Arc<dyn TriggerStateStore>,
    executor: Arc<dyn BuildExecutor>,
}

impl BuildTrigger {
    pub fn new(states: Arc<dyn TriggerStateStore>, executor: Arc<dyn BuildExecutor>) -> Self {
        Self { states, executor }
    }

    /// Evaluate and, if required, run the build.
    ///
    /// On build success the current tuple is persisted as the new recorded
    /// state. On failure (including timeout) the recorded state is left
    /// untouched and the error propagates.
    pub async fn fire(
        &self,
        agent: &str,
        current: &TriggerState,
        request: &BuildRequest,
    ) -> Result<TriggerOutcome> {
        let last = self
            .states
            .load(agent)
            .await
            .map_err(|e| PipelineError::State { source: e })?;

        if evaluate(current, last.as_ref()) == TriggerDecision::Skip {
            info!(
                agent = %agent,
                fingerprint = %current.source_fingerprint.short(),
                "inputs unchanged, skipping build"
            );
            return Ok(TriggerOutcome::Skipped);
        }

        info!(
            agent = %agent,
            fingerprint = %current.source_fingerprint.short(),
            project = %current.build_project,
            "trigger fired, running build"
        );

        let report = self.executor.build(request).await?;

        // Persist only after the executor reported success. A crash between
        // the build and this save re-runs the build next time, which is the
        // safe direction: never a silently skipped net-new change.
        self.states
            .save(agent, current)
            .await
            .map_err(|e| PipelineError::State { source: e })?;

        Ok(TriggerOutcome::Built(report))
    }
}

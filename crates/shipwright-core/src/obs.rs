//! Structured observability hooks for pipeline lifecycle events.
//!
//! This module provides:
//! - Run-scoped tracing spans via `RunSpan` RAII guard
//! - Emission functions for stage and run lifecycle events
//!
//! Events are emitted at `info!` level; filter with `RUST_LOG`.

use tracing::info;

/// RAII guard that enters a run-scoped tracing span for the duration of a
/// pipeline run.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run id and agent name.
    pub fn enter(run_id: &str, agent: &str) -> Self {
        let span = tracing::info_span!("shipwright.run", run_id = %run_id, agent = %agent);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a pipeline stage started.
pub fn emit_stage_started(agent: &str, stage: &str) {
    info!(event = "pipeline.stage_started", agent = %agent, stage = %stage);
}

/// Emit event: a pipeline stage completed.
pub fn emit_stage_completed(agent: &str, stage: &str, detail: &str) {
    info!(event = "pipeline.stage_completed", agent = %agent, stage = %stage, detail = %detail);
}

/// Emit event: the whole pipeline run finished.
pub fn emit_run_finished(agent: &str, fingerprint: &str, skipped: bool, duration_ms: u64) {
    info!(
        event = "pipeline.finished",
        agent = %agent,
        fingerprint = %fingerprint,
        build_skipped = skipped,
        duration_ms = duration_ms,
    );
}

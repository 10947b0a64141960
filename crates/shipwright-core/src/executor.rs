//! External build executor boundary.
//!
//! The pipeline never builds images itself; it hands the uploaded source
//! location to an executor and waits for a terminal exit status. The bundled
//! `ProcessBuildExecutor` shells out to a configured command with the request
//! exported as environment variables, bounded by the request's timeout.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::error::{PipelineError, Result};

/// Everything an executor needs to produce the image `(repository, tag)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Identifier of the external build project.
    pub project: String,
    /// Region the build runs in.
    pub region: String,
    /// Image repository the build publishes to.
    pub image_repository: String,
    /// Image tag the build publishes.
    pub image_tag: String,
    /// Registry base URL.
    pub registry_url: String,
    /// Object store key of the uploaded source artifact.
    pub source_location: String,
    /// Hard timeout for the build; 0 disables the bound.
    pub timeout_secs: u64,
}

impl BuildRequest {
    /// Environment exported to the build command.
    pub fn env_vars(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("SHIPWRIGHT_PROJECT", self.project.as_str()),
            ("SHIPWRIGHT_REGION", self.region.as_str()),
            ("SHIPWRIGHT_IMAGE_REPOSITORY", self.image_repository.as_str()),
            ("SHIPWRIGHT_IMAGE_TAG", self.image_tag.as_str()),
            ("SHIPWRIGHT_REGISTRY_URL", self.registry_url.as_str()),
            ("SHIPWRIGHT_SOURCE_LOCATION", self.source_location.as_str()),
        ]
    }
}

/// Result of a successful build execution.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Exit code (always 0 for a successful report).
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

/// External build executor.
///
/// Returning `Ok` means the image `(repository, tag)` named in the request
/// is pullable by the runtime backend. A non-zero exit, timeout, or spawn
/// failure is `PipelineError::BuildFailed` — never retried here.
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    async fn build(&self, request: &BuildRequest) -> Result<BuildReport>;
}

/// Executor that runs a configured command as a child process.
///
/// The request is passed through `SHIPWRIGHT_*` environment variables;
/// stdout/stderr are captured and surfaced on both success and failure.
pub struct ProcessBuildExecutor {
    command: Vec<String>,
}

impl ProcessBuildExecutor {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl BuildExecutor for ProcessBuildExecutor {
    async fn build(&self, request: &BuildRequest) -> Result<BuildReport> {
        let start = Instant::now();

        if self.command.is_empty() {
            return Err(PipelineError::BuildFailed {
                detail: "build command is empty".to_string(),
                exit_code: None,
                stderr: String::new(),
            });
        }

        let exe = &self.command[0];
        let args = &self.command[1..];

        let spawn_err = |detail: String| PipelineError::BuildFailed {
            detail,
            exit_code: None,
            stderr: String::new(),
        };

        let child = Command::new(exe)
            .args(args)
            .envs(request.env_vars())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out build must not keep running and publish an image
            // behind the failed run's back.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_err(format!("failed to spawn '{exe}': {e}")))?;

        let output = if request.timeout_secs > 0 {
            tokio::time::timeout(
                std::time::Duration::from_secs(request.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| {
                spawn_err(format!(
                    "build timed out after {} seconds",
                    request.timeout_secs
                ))
            })?
            .map_err(|e| spawn_err(e.to_string()))?
        } else {
            child
                .wait_with_output()
                .await
                .map_err(|e| spawn_err(e.to_string()))?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(PipelineError::BuildFailed {
                detail: format!("build command exited with code {exit_code}"),
                exit_code: Some(exit_code),
                stderr,
            });
        }

        info!(
            project = %request.project,
            tag = %request.image_tag,
            duration_ms = duration_ms,
            "build completed"
        );

        Ok(BuildReport {
            exit_code,
            stdout,
            stderr,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(timeout_secs: u64) -> BuildRequest {
        BuildRequest {
            project: "agent-builder".to_string(),
            region: "us-west-2".to_string(),
            image_repository: "agents/supervisor".to_string(),
            image_tag: "latest".to_string(),
            registry_url: "registry.example.com".to_string(),
            source_location: "agent-supervisor-code-abc.zip".to_string(),
            timeout_secs,
        }
    }

    #[tokio::test]
    async fn successful_command_yields_report() {
        let executor = ProcessBuildExecutor::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo building $SHIPWRIGHT_IMAGE_TAG".to_string(),
        ]);

        let report = executor.build(&request(60)).await.unwrap();
        assert_eq!(report.exit_code, 0);
        assert!(report.stdout.contains("building latest"));
    }

    #[tokio::test]
    async fn failing_command_is_build_failed() {
        let executor = ProcessBuildExecutor::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo broken >&2; exit 3".to_string(),
        ]);

        let err = executor.build(&request(60)).await.unwrap_err();
        match err {
            PipelineError::BuildFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert!(stderr.contains("broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn timeout_is_build_failed() {
        let executor =
            ProcessBuildExecutor::new(vec!["sleep".to_string(), "5".to_string()]);

        let err = executor.build(&request(1)).await.unwrap_err();
        match err {
            PipelineError::BuildFailed { detail, .. } => {
                assert!(detail.contains("timed out"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn timed_out_build_is_killed_not_left_running() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("image-pushed");
        let executor = ProcessBuildExecutor::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("sleep 2 && touch {}", marker.display()),
        ]);

        let err = executor.build(&request(1)).await.unwrap_err();
        assert!(matches!(err, PipelineError::BuildFailed { .. }));

        // Past the command's own sleep: a surviving child would have
        // touched the marker by now.
        tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let executor = ProcessBuildExecutor::new(vec![]);
        let err = executor.build(&request(60)).await.unwrap_err();
        assert!(matches!(err, PipelineError::BuildFailed { .. }));
    }
}

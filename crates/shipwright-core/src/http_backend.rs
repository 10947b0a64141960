//! HTTP implementation of the runtime backend.
//!
//! Posts the upsert request as JSON to a runtime control endpoint and reads
//! back the deployment identifiers. Any non-success status is surfaced as
//! `DeployRejected` with the backend's raw response body.

use async_trait::async_trait;
use tracing::debug;

use crate::deploy::{RuntimeBackend, RuntimeDeploymentRef, UpsertRequest};
use crate::error::{PipelineError, Result};

/// Runtime backend speaking JSON over HTTP.
pub struct HttpRuntimeBackend {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpRuntimeBackend {
    /// `endpoint` is the base URL of the runtime control API.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn upsert_url(&self, agent_name: &str) -> String {
        format!("{}/deployments/{}", self.endpoint, agent_name)
    }
}

#[async_trait]
impl RuntimeBackend for HttpRuntimeBackend {
    async fn upsert(&self, request: &UpsertRequest) -> Result<RuntimeDeploymentRef> {
        let url = self.upsert_url(&request.agent_name);
        debug!(url = %url, "sending runtime upsert");

        let response = self
            .client
            .put(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| PipelineError::DeployRejected {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::DeployRejected {
                detail: format!("{status}: {body}"),
            });
        }

        response
            .json::<RuntimeDeploymentRef>()
            .await
            .map_err(|e| PipelineError::DeployRejected {
                detail: format!("malformed backend response: {e}"),
            })
    }
}

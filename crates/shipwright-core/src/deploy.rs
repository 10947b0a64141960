//! Runtime deployment (upsert) of the built image.
//!
//! The deployer always upserts: it creates the deployment when absent and
//! updates it in place otherwise, as one logical transaction at the backend
//! boundary. The source fingerprint is exposed to the running service as
//! `CODE_VERSION`, so a deployment always reflects the image it runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shipwright_state::ContentDigest;
use tracing::info;

use crate::error::Result;

/// Environment key carrying the deployed source fingerprint.
pub const ENV_CODE_VERSION: &str = "CODE_VERSION";
/// Environment key for the optional knowledge base identifier.
pub const ENV_KNOWLEDGE_BASE_ID: &str = "KNOWLEDGE_BASE_ID";
/// Environment key for the optional retrieval similarity threshold.
pub const ENV_KB_SIMILARITY_THRESHOLD: &str = "KB_SIMILARITY_THRESHOLD";

/// A built container image, identified by repository and tag.
///
/// Owned by the external build executor; the deployer only references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    /// Pullable image URI under the given registry.
    pub fn uri(&self, registry_url: &str) -> String {
        format!(
            "{}/{}:{}",
            registry_url.trim_end_matches('/'),
            self.repository,
            self.tag
        )
    }
}

/// Optional knowledge/context wiring forwarded into the deployment
/// environment. Downstream treats presence of the keys as a feature flag,
/// so absence emits nothing, not an empty value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeParams {
    pub knowledge_base_id: String,
    pub similarity_threshold: f64,
}

/// Upsert request sent to the runtime backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertRequest {
    pub agent_name: String,
    pub role_arn: String,
    pub image_uri: String,
    pub environment: BTreeMap<String, String>,
}

/// Stable identifiers returned by the runtime backend after an upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeDeploymentRef {
    pub deployment_id: String,
    pub endpoint_id: String,
}

/// Managed runtime backend.
///
/// `upsert` is create-if-absent-else-update, atomic from the caller's view:
/// on rejection the deployment stays fully on its prior configuration.
#[async_trait]
pub trait RuntimeBackend: Send + Sync {
    async fn upsert(&self, request: &UpsertRequest) -> Result<RuntimeDeploymentRef>;
}

/// Applies deployments through a `RuntimeBackend`.
pub struct RuntimeDeployer {
    backend: Arc<dyn RuntimeBackend>,
}

impl RuntimeDeployer {
    pub fn new(backend: Arc<dyn RuntimeBackend>) -> Self {
        Self { backend }
    }

    /// Upsert the agent's deployment to the given image.
    ///
    /// The environment always carries `CODE_VERSION = <fingerprint>`; the
    /// knowledge keys appear only when `knowledge` is provided.
    pub async fn apply(
        &self,
        agent_name: &str,
        role_arn: &str,
        image_uri: String,
        fingerprint: &ContentDigest,
        knowledge: Option<&KnowledgeParams>,
    ) -> Result<RuntimeDeploymentRef> {
        let mut environment = BTreeMap::new();
        environment.insert(
            ENV_CODE_VERSION.to_string(),
            fingerprint.as_str().to_string(),
        );
        if let Some(params) = knowledge {
            environment.insert(
                ENV_KNOWLEDGE_BASE_ID.to_string(),
                params.knowledge_base_id.clone(),
            );
            environment.insert(
                ENV_KB_SIMILARITY_THRESHOLD.to_string(),
                params.similarity_threshold.to_string(),
            );
        }

        let request = UpsertRequest {
            agent_name: agent_name.to_string(),
            role_arn: role_arn.to_string(),
            image_uri,
            environment,
        };

        let deployment = self.backend.upsert(&request).await?;
        info!(
            agent = %agent_name,
            deployment_id = %deployment.deployment_id,
            endpoint_id = %deployment.endpoint_id,
            fingerprint = %fingerprint.short(),
            "runtime deployment applied"
        );
        Ok(deployment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::fakes::{RecordingRuntimeBackend, RejectingRuntimeBackend};

    fn fingerprint() -> ContentDigest {
        ContentDigest::from_bytes(b"source")
    }

    #[test]
    fn image_uri_joins_registry_repo_and_tag() {
        let image = ImageRef {
            repository: "agents/supervisor".to_string(),
            tag: "latest".to_string(),
        };
        assert_eq!(
            image.uri("registry.example.com/"),
            "registry.example.com/agents/supervisor:latest"
        );
    }

    #[tokio::test]
    async fn apply_sets_code_version() {
        let backend = Arc::new(RecordingRuntimeBackend::new());
        let deployer = RuntimeDeployer::new(backend.clone());
        let fp = fingerprint();

        deployer
            .apply("supervisor", "role-arn", "img:latest".to_string(), &fp, None)
            .await
            .unwrap();

        let upserts = backend.upserts();
        assert_eq!(upserts.len(), 1);
        assert_eq!(
            upserts[0].environment.get(ENV_CODE_VERSION),
            Some(&fp.as_str().to_string())
        );
    }

    #[tokio::test]
    async fn absent_knowledge_emits_no_keys_at_all() {
        let backend = Arc::new(RecordingRuntimeBackend::new());
        let deployer = RuntimeDeployer::new(backend.clone());

        deployer
            .apply(
                "supervisor",
                "role-arn",
                "img:latest".to_string(),
                &fingerprint(),
                None,
            )
            .await
            .unwrap();

        let env = &backend.upserts()[0].environment;
        assert!(!env.contains_key(ENV_KNOWLEDGE_BASE_ID));
        assert!(!env.contains_key(ENV_KB_SIMILARITY_THRESHOLD));
    }

    #[tokio::test]
    async fn present_knowledge_emits_both_keys() {
        let backend = Arc::new(RecordingRuntimeBackend::new());
        let deployer = RuntimeDeployer::new(backend.clone());
        let knowledge = KnowledgeParams {
            knowledge_base_id: "kb-1234".to_string(),
            similarity_threshold: 0.4,
        };

        deployer
            .apply(
                "supervisor",
                "role-arn",
                "img:latest".to_string(),
                &fingerprint(),
                Some(&knowledge),
            )
            .await
            .unwrap();

        let env = &backend.upserts()[0].environment;
        assert_eq!(env.get(ENV_KNOWLEDGE_BASE_ID), Some(&"kb-1234".to_string()));
        assert_eq!(
            env.get(ENV_KB_SIMILARITY_THRESHOLD),
            Some(&"0.4".to_string())
        );
    }

    #[tokio::test]
    async fn backend_rejection_propagates_raw_detail() {
        let backend = Arc::new(RejectingRuntimeBackend::new("role not assumable"));
        let deployer = RuntimeDeployer::new(backend);

        let err = deployer
            .apply(
                "supervisor",
                "role-arn",
                "img:latest".to_string(),
                &fingerprint(),
                None,
            )
            .await
            .unwrap_err();

        match err {
            PipelineError::DeployRejected { detail } => {
                assert!(detail.contains("role not assumable"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

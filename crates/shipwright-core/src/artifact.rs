//! Content-addressed artifact storage.
//!
//! Each uploaded source archive is keyed by `(agent_name, fingerprint)`, so
//! one artifact exists per distinct source revision and re-uploading the same
//! revision is idempotent: same key, same bytes.

use std::sync::Arc;

use shipwright_state::{ContentDigest, ObjectStore};
use tracing::{debug, info};

use crate::error::Result;

/// Storage key for an agent's source artifact at a given fingerprint.
pub fn artifact_key(agent: &str, fingerprint: &ContentDigest) -> String {
    format!("agent-{agent}-code-{fingerprint}.zip")
}

/// Reference to a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ArtifactRef {
    /// Object store key the artifact lives under.
    pub key: String,
}

/// Artifact store layered over an `ObjectStore`.
pub struct ArtifactStore {
    objects: Arc<dyn ObjectStore>,
}

impl ArtifactStore {
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        Self { objects }
    }

    /// Upload an agent's source archive.
    ///
    /// The key is derived from the fingerprint, so a prior object at the key
    /// is guaranteed to hold the same bytes; the put re-transmits without
    /// branching or failing on prior existence.
    pub async fn put(
        &self,
        agent: &str,
        fingerprint: &ContentDigest,
        bytes: &[u8],
    ) -> Result<ArtifactRef> {
        let key = artifact_key(agent, fingerprint);

        let existed = self.objects.exists(&key).await?;
        if existed {
            debug!(key = %key, "artifact already present, re-transmitting");
        }

        self.objects.put(&key, bytes).await?;
        info!(
            key = %key,
            bytes = bytes.len(),
            existed = existed,
            "source artifact uploaded"
        );
        Ok(ArtifactRef { key })
    }

    /// Retrieve an artifact's bytes. Verification and testing only.
    pub async fn get(&self, artifact: &ArtifactRef) -> Result<Vec<u8>> {
        Ok(self.objects.get(&artifact.key).await?)
    }
}

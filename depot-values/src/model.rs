use crate::capabilities::{Capabilities, ModelType};
use crate::identifier::Identifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A locally recorded materialization of one artifact (§3.4).
///
/// The repository exclusively owns this persisted shape; runtime load state
/// (§3.7) is never serialized here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Canonical identifier string, e.g. `hf:org/model/artifact`.
    pub id: String,
    /// Optional globally-unique user-assigned short name.
    pub alias: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub registry: String,
    pub repo_id: String,
    pub artifact_name: String,
    #[serde(rename = "type")]
    pub model_type: ModelType,
    pub format: String,
    pub capabilities: Capabilities,
    pub size_in_bytes: i64,
    pub files: Vec<String>,
    pub local_path: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Model {
    /// The denormalized lookup key: `alias || id` (§3.4).
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.id)
    }

    pub fn from_identifier_and_artifact(
        id: &Identifier,
        local_path: String,
        artifact: &crate::collection::Artifact,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            id: id.to_string(),
            alias: None,
            name: id.model_name.clone(),
            description: None,
            version: None,
            registry: id.registry.to_string(),
            repo_id: format!("{}/{}", id.publisher, id.model_name),
            artifact_name: artifact.name.clone(),
            model_type: if capabilities.supports_embeddings {
                ModelType::Embedding
            } else {
                ModelType::TextGeneration
            },
            format: artifact.format.clone(),
            capabilities,
            size_in_bytes: artifact.total_size,
            files: artifact.files.clone(),
            local_path,
            created_at: Some(Utc::now()),
        }
    }
}

/// Runtime load status (§3.7). Never persisted — lives only in the Loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeState {
    Unloaded,
    Loading,
    Loaded,
    Failed,
    Unloading,
}

/// Per-model runtime record held by the Loader (§3.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeStatus {
    pub state: RuntimeState,
    pub loaded_at: Option<DateTime<Utc>>,
    pub last_status_change: DateTime<Utc>,
    pub error_message: Option<String>,
    pub adapter_name: Option<String>,
}

impl RuntimeStatus {
    pub fn unloaded() -> Self {
        Self {
            state: RuntimeState::Unloaded,
            loaded_at: None,
            last_status_change: Utc::now(),
            error_message: None,
            adapter_name: None,
        }
    }

    /// Enforce the legal transitions of §3.7: returns `true` if `next` is reachable from `self.state`.
    pub fn can_transition_to(&self, next: RuntimeState) -> bool {
        use RuntimeState::*;
        matches!(
            (self.state, next),
            (Unloaded, Loading)
                | (Loading, Loaded)
                | (Loading, Failed)
                | (Loaded, Unloading)
                | (Unloading, Unloaded)
                | (Failed, Loading)
        )
    }
}

/// Persisted per-model download progress record (§3.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadState {
    pub model_id: String,
    pub target_directory: String,
    pub downloading_file_name: String,
    pub total_size: i64,
    pub downloaded_bytes: i64,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_transitions_follow_state_machine() {
        let mut status = RuntimeStatus::unloaded();
        assert!(status.can_transition_to(RuntimeState::Loading));
        assert!(!status.can_transition_to(RuntimeState::Loaded));

        status.state = RuntimeState::Loading;
        assert!(status.can_transition_to(RuntimeState::Loaded));
        assert!(status.can_transition_to(RuntimeState::Failed));

        status.state = RuntimeState::Failed;
        assert!(status.can_transition_to(RuntimeState::Loading));
        assert!(!status.can_transition_to(RuntimeState::Unloading));
    }
}

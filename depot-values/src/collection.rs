use crate::capabilities::{Capabilities, ModelType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single logical artifact within a collection (§3.3).
///
/// Sharded artifacts group multiple `{base}-NNNNN-of-MMMMM.{ext}` files into
/// one entry whose `total_size` is the sum of the shards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Name with the format extension stripped.
    pub name: String,
    /// e.g. `gguf`, `safetensors`.
    pub format: String,
    /// Ordered file paths (shard order preserved, §5 ordering guarantees).
    pub files: Vec<String>,
    pub total_size: i64,
    /// Quantization tag parsed from the name, e.g. `Q4_K_M`, if any.
    pub quantization: Option<String>,
    /// Coarse size category parsed from the name, e.g. `7b`, if any.
    pub size_category: Option<String>,
}

/// A repository on the hub containing one or more artifacts (§3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub hub: String,
    pub collection_id: String,
    pub name: String,
    pub publisher: String,
    pub model_type: ModelType,
    pub default_format: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub downloads: u64,
    pub likes: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub is_gated: bool,
    pub license: Option<String>,
    pub language: Vec<String>,
    pub capabilities: Capabilities,
    pub artifacts: Vec<Artifact>,
}

impl Collection {
    /// Look up an artifact by name. Artifact names are unique within a collection (§3.2 invariant).
    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }
}

use serde::{Deserialize, Serialize};

/// Boolean/quantitative capability flags carried by a collection or model (§3.6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub supports_text_generation: bool,
    pub supports_embeddings: bool,
    pub supports_image_understanding: bool,
    pub max_context_length: u32,
    pub embedding_dimension: Option<u32>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            supports_text_generation: false,
            supports_embeddings: false,
            supports_image_understanding: false,
            max_context_length: 2048,
            embedding_dimension: None,
        }
    }
}

/// The two model kinds this depot understands end to end (§3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelType {
    TextGeneration,
    Embedding,
}

impl ModelType {
    /// The on-disk, dash-cased directory segment for this type (§3.8).
    pub fn dir_segment(self) -> &'static str {
        match self {
            ModelType::TextGeneration => "text-generation",
            ModelType::Embedding => "embedding",
        }
    }

    /// Hub discovery tags associated with this type (§4.3).
    pub fn discovery_tags(self) -> &'static [&'static str] {
        match self {
            ModelType::TextGeneration => &["text-generation", "gguf"],
            ModelType::Embedding => &["sentence-similarity", "gguf"],
        }
    }
}

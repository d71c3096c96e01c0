//! Abstract backend and adapter contracts (C7, §4.7). A `Backend` is a raw
//! generation/embedding capability with no concurrency control of its own —
//! that is the Engines' job (§4.8, §4.9).

use async_trait::async_trait;
use depot_values::{Model, ModelType, Result};
use futures::stream::BoxStream;
use std::path::PathBuf;
use std::sync::Arc;

/// Raw generation parameters a backend needs to produce tokens. Validation of
/// these (non-empty prompt, `maxTokens>0`, ranges) is the Generation Engine's
/// job, not the backend's.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub stop_sequences: Vec<String>,
    pub repeat_penalty: Option<f32>,
    pub seed: Option<u64>,
    pub logit_bias: Vec<(u32, f32)>,
    pub anti_prompts: Vec<String>,
}

/// One generated token as seen by a streaming caller.
#[derive(Debug, Clone)]
pub struct GeneratedToken {
    pub text: String,
}

pub type TokenStream = BoxStream<'static, Result<GeneratedToken>>;

/// A loaded, ready-to-use model capability. Adapters produce these; Engines
/// consume them under their own concurrency permits.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn generate(&self, params: GenerationParams) -> Result<String>;
    async fn generate_stream(&self, params: GenerationParams) -> Result<TokenStream>;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Parameters the Loader passes through to an adapter's `load`.
#[derive(Debug, Clone, Default)]
pub struct LoadParams {
    /// Resolved concrete weight file, set by the Loader after directory
    /// resolution (§4.7 step 4) when `localPath` names a directory.
    pub weight_file: Option<PathBuf>,
}

/// An adapter advertises the formats/types it can serve and produces a
/// [`Backend`] instance for a given model (§4.7).
#[async_trait]
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;
    fn supported_formats(&self) -> &[&str];
    fn supported_types(&self) -> &[ModelType];

    fn can_handle(&self, model: &Model) -> bool {
        self.supported_formats()
            .iter()
            .any(|f| f.eq_ignore_ascii_case(&model.format))
            && self.supported_types().contains(&model.model_type)
    }

    async fn load(&self, model: &Model, params: &LoadParams) -> Result<Arc<dyn Backend>>;
}

//! Generation Engine (C8) and Embedding Engine (C9): bounded-concurrency
//! wrappers around a loaded [`model_loader::Backend`] (§4.8, §4.9).

mod embedding;
mod generation;
mod tokens;

pub use embedding::{EmbeddingEngine, EmbeddingRequest, EmbeddingResponse};
pub use generation::{FinishReason, GenerationEngine, GenerationRequest, GenerationResponse};
pub use tokens::estimate_token_count;

//! Embedding Engine (C9, §4.9): same concurrency policy as generation, plus
//! optional L2 normalization.

use crate::tokens::estimate_token_count;
use depot_values::{DepotError, Result};
use model_loader::Backend;
use std::sync::Arc;
use tokio::sync::Semaphore;

const DEFAULT_MAX_CONCURRENT_OPERATIONS: usize = 1;

#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub texts: Vec<String>,
    pub normalize: bool,
}

#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub vectors: Vec<Vec<f32>>,
    pub tokens: u32,
    pub dimension: usize,
}

pub struct EmbeddingEngine {
    backend: Arc<dyn Backend>,
    semaphore: Arc<Semaphore>,
}

impl EmbeddingEngine {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_config(backend, DEFAULT_MAX_CONCURRENT_OPERATIONS)
    }

    pub fn with_config(backend: Arc<dyn Backend>, max_concurrent_operations: usize) -> Self {
        Self {
            backend,
            semaphore: Arc::new(Semaphore::new(max_concurrent_operations.max(1))),
        }
    }

    pub async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        if request.texts.is_empty() {
            return Err(DepotError::InvalidRequest("texts must not be empty".into()));
        }
        if request.texts.iter().any(|t| t.is_empty()) {
            return Err(DepotError::InvalidRequest("texts must not contain an empty entry".into()));
        }

        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DepotError::Transient("embedding semaphore closed".into()))?;

        let tokens = request.texts.iter().map(|t| estimate_token_count(t)).sum();
        let mut vectors = self.backend.embed(&request.texts).await?;
        if request.normalize {
            for vector in &mut vectors {
                normalize_l2(vector);
            }
        }
        let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
        Ok(EmbeddingResponse { vectors, tokens, dimension })
    }
}

/// L2-normalizes `vector` in place, guarding against zero magnitude by
/// leaving the vector untouched (§4.9).
fn normalize_l2(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if magnitude == 0.0 {
        return;
    }
    for v in vector.iter_mut() {
        *v /= magnitude;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use model_loader::{GenerationParams, TokenStream};

    struct FixedBackend;

    #[async_trait]
    impl Backend for FixedBackend {
        async fn generate(&self, _params: GenerationParams) -> Result<String> {
            unimplemented!()
        }
        async fn generate_stream(&self, _params: GenerationParams) -> Result<TokenStream> {
            unimplemented!()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![3.0, 4.0]).collect())
        }
    }

    #[tokio::test]
    async fn rejects_empty_text_list() {
        let engine = EmbeddingEngine::new(Arc::new(FixedBackend));
        let err = engine
            .embed(EmbeddingRequest { texts: vec![], normalize: false })
            .await
            .unwrap_err();
        assert!(matches!(err, DepotError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn normalizes_vectors_to_unit_length() {
        let engine = EmbeddingEngine::new(Arc::new(FixedBackend));
        let response = engine
            .embed(EmbeddingRequest { texts: vec!["hello".into()], normalize: true })
            .await
            .unwrap();
        let v = &response.vectors[0];
        let magnitude = (v[0] * v[0] + v[1] * v[1]).sqrt();
        assert!((magnitude - 1.0).abs() < 1e-6);
        assert_eq!(response.dimension, 2);
    }

    #[tokio::test]
    async fn zero_magnitude_vector_is_left_untouched() {
        let mut v = vec![0.0_f32, 0.0];
        normalize_l2(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }
}

//! Generation Engine (C8, §4.8): bounded-concurrency wrapper around a
//! [`Backend`], with clean cancellation and a character-per-token fallback.

use crate::tokens::estimate_token_count;
use depot_values::{DepotError, Result};
use futures::StreamExt;
use model_loader::{Backend, GenerationParams};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

const DEFAULT_MAX_CONCURRENT_OPERATIONS: usize = 1;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Cancelled,
    Error,
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,
    pub finish_reason: FinishReason,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Validated generation request (§4.8).
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub stop_sequences: Vec<String>,
    pub repeat_penalty: Option<f32>,
    pub seed: Option<u64>,
    pub logit_bias: Vec<(u32, f32)>,
    pub anti_prompts: Vec<String>,
    pub timeout: Option<Duration>,
}

impl GenerationRequest {
    fn validate(&self) -> Result<()> {
        if self.prompt.is_empty() {
            return Err(DepotError::InvalidRequest("prompt must not be empty".into()));
        }
        if self.max_tokens == 0 {
            return Err(DepotError::InvalidRequest("maxTokens must be > 0".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(DepotError::InvalidRequest("temperature must be in [0, 2]".into()));
        }
        if !(0.0 < self.top_p && self.top_p <= 1.0) {
            return Err(DepotError::InvalidRequest("topP must be in (0, 1]".into()));
        }
        Ok(())
    }

    fn into_backend_params(self) -> GenerationParams {
        GenerationParams {
            prompt: self.prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            stop_sequences: self.stop_sequences,
            repeat_penalty: self.repeat_penalty,
            seed: self.seed,
            logit_bias: self.logit_bias,
            anti_prompts: self.anti_prompts,
        }
    }
}

/// Wraps one loaded [`Backend`] with the concurrency/cancellation/timeout
/// policy of §4.8. One engine per loaded model.
pub struct GenerationEngine {
    backend: Arc<dyn Backend>,
    semaphore: Arc<Semaphore>,
    default_timeout: Duration,
}

impl GenerationEngine {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_config(backend, DEFAULT_MAX_CONCURRENT_OPERATIONS, DEFAULT_TIMEOUT)
    }

    pub fn with_config(
        backend: Arc<dyn Backend>,
        max_concurrent_operations: usize,
        default_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            semaphore: Arc::new(Semaphore::new(max_concurrent_operations.max(1))),
            default_timeout,
        }
    }

    /// Batch generation. A cancelled request returns a response with
    /// `finishReason=cancelled` rather than raising (§4.8).
    pub async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<GenerationResponse> {
        request.validate()?;
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let prompt_tokens = estimate_token_count(&request.prompt);
        let max_tokens = request.max_tokens;
        let params = request.into_backend_params();

        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DepotError::Transient("generation semaphore closed".into()))?;

        let fut = self.backend.generate(params);
        tokio::select! {
            _ = cancel.cancelled() => Ok(GenerationResponse {
                text: String::new(),
                finish_reason: FinishReason::Cancelled,
                prompt_tokens,
                completion_tokens: 0,
            }),
            _ = tokio::time::sleep(timeout) => Ok(GenerationResponse {
                text: String::new(),
                finish_reason: FinishReason::Cancelled,
                prompt_tokens,
                completion_tokens: 0,
            }),
            result = fut => {
                match result {
                    Ok(text) => {
                        let completion_tokens = estimate_token_count(&text);
                        let finish_reason = if completion_tokens >= max_tokens {
                            FinishReason::Length
                        } else {
                            FinishReason::Stop
                        };
                        Ok(GenerationResponse { text, finish_reason, prompt_tokens, completion_tokens })
                    }
                    Err(e) => Ok(GenerationResponse {
                        text: e.to_string(),
                        finish_reason: FinishReason::Error,
                        prompt_tokens,
                        completion_tokens: 0,
                    }),
                }
            }
        }
    }

    /// Streaming generation. Cancelling `cancel` stops the iterator cleanly
    /// and releases the permit; the stream yields no further items (§4.8).
    pub async fn generate_stream(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<futures::stream::BoxStream<'static, Result<String>>> {
        request.validate()?;
        let params = request.into_backend_params();

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DepotError::Transient("generation semaphore closed".into()))?;

        let inner = self.backend.generate_stream(params).await?;
        let stream = futures::stream::unfold(
            (inner, cancel, Some(permit)),
            |(mut inner, cancel, permit)| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                tokio::select! {
                    _ = cancel.cancelled() => None,
                    next = inner.next() => {
                        next.map(|item| (item.map(|t| t.text), (inner, cancel, permit)))
                    }
                }
            },
        );
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use model_loader::{GeneratedToken, TokenStream};

    struct EchoBackend;

    #[async_trait]
    impl Backend for EchoBackend {
        async fn generate(&self, params: GenerationParams) -> Result<String> {
            Ok(format!("echo: {}", params.prompt))
        }
        async fn generate_stream(&self, params: GenerationParams) -> Result<TokenStream> {
            let tokens: Vec<Result<GeneratedToken>> = params
                .prompt
                .split_whitespace()
                .map(|w| Ok(GeneratedToken { text: w.to_string() }))
                .collect();
            Ok(Box::pin(futures::stream::iter(tokens)))
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            unimplemented!()
        }
    }

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            max_tokens: 32,
            temperature: 0.7,
            top_p: 0.9,
            stop_sequences: vec![],
            repeat_penalty: None,
            seed: None,
            logit_bias: vec![],
            anti_prompts: vec![],
            timeout: None,
        }
    }

    #[tokio::test]
    async fn rejects_empty_prompt() {
        let engine = GenerationEngine::new(Arc::new(EchoBackend));
        let err = engine
            .generate(request(""), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DepotError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn generate_returns_stop_when_under_budget() {
        let engine = GenerationEngine::new(Arc::new(EchoBackend));
        let response = engine
            .generate(request("hi"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.text, "echo: hi");
    }

    #[tokio::test]
    async fn cancelling_before_completion_yields_cancelled_finish_reason() {
        let engine = GenerationEngine::new(Arc::new(EchoBackend));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let response = engine.generate(request("hi"), cancel).await.unwrap();
        assert_eq!(response.finish_reason, FinishReason::Cancelled);
    }

    #[tokio::test]
    async fn stream_yields_no_items_after_cancellation() {
        let engine = GenerationEngine::new(Arc::new(EchoBackend));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut stream = engine.generate_stream(request("a b c"), cancel).await.unwrap();
        assert!(stream.next().await.is_none());
    }
}

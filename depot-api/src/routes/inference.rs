//! Generate, stream-generate, embed (§4.8, §4.9, §6.4): the Generation/Embedding
//! Engines wired through chat templating (C10) and the reasoning post-processor (C11).

use crate::error::{ApiError, ApiResult};
use crate::route_trait::{
    validators::{InRange, NotEmpty},
    RouteHandler, RouteMetadata, ValidationRule,
};
use crate::state::AppState;
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use chat_template::TemplateConfig;
use depot_values::Message;
use futures::StreamExt;
use inference_engine::{EmbeddingRequest, FinishReason, GenerationRequest};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

fn finish_reason_label(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::Stop => "stop",
        FinishReason::Length => "length",
        FinishReason::Cancelled => "cancelled",
        FinishReason::Error => "error",
    }
}

/// Builds the prompt a generation request actually runs, from either a raw
/// `prompt` or a `messages` conversation rendered through the chat template
/// engine (§4.10).
fn resolve_prompt(req: &GenerateRequest, model_name: &str) -> ApiResult<String> {
    if let Some(prompt) = &req.prompt {
        return Ok(prompt.clone());
    }
    if let Some(messages) = &req.messages {
        if messages.is_empty() {
            return Err(ApiError::BadRequest("messages must not be empty".into()));
        }
        let config = TemplateConfig {
            chat_template: None,
            model_name: model_name.to_string(),
            bos_token: None,
            eos_token: None,
        };
        return Ok(chat_template::render(&config, messages, req.system_prompt.as_deref()));
    }
    Err(ApiError::BadRequest("either prompt or messages is required".into()))
}

fn generation_request(req: &GenerateRequest, prompt: String) -> GenerationRequest {
    GenerationRequest {
        prompt,
        max_tokens: req.max_tokens.unwrap_or(256),
        temperature: req.temperature.unwrap_or(0.7),
        top_p: req.top_p.unwrap_or(1.0),
        stop_sequences: req.stop.clone().unwrap_or_default(),
        repeat_penalty: req.repeat_penalty,
        seed: req.seed,
        logit_bias: req.logit_bias.clone().unwrap_or_default(),
        anti_prompts: req.anti_prompts.clone().unwrap_or_default(),
        timeout: req.timeout_ms.map(std::time::Duration::from_millis),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateRequest {
    pub key: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub stop: Option<Vec<String>>,
    #[serde(default)]
    pub repeat_penalty: Option<f32>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub logit_bias: Option<Vec<(u32, f32)>>,
    #[serde(default)]
    pub anti_prompts: Option<Vec<String>>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Process `<thinking>`-style regions out of the output before returning it (§4.11).
    #[serde(default)]
    pub extract_reasoning: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub text: String,
    pub finish_reason: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    pub reasoning_tokens: u32,
}

pub struct GenerateRoute;

#[async_trait]
impl RouteHandler for GenerateRoute {
    type Request = GenerateRequest;
    type Response = GenerateResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/generate",
            method: Method::POST,
            tags: &["Inference"],
            description: "Batch text generation from a prompt or a rendered message list (§4.8)",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.key)?;
        if req.prompt.is_none() && req.messages.is_none() {
            return Err(ApiError::BadRequest("either prompt or messages is required".into()));
        }
        if let Some(temperature) = req.temperature {
            InRange { min: 0.0, max: 2.0 }.validate(&temperature)?;
        }
        if let Some(top_p) = req.top_p {
            InRange { min: f32::EPSILON, max: 1.0 }.validate(&top_p)?;
        }
        Ok(())
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let model = state.repo.get(&req.key).await?;
        let model_name = model.as_ref().map(|m| m.name.as_str()).unwrap_or(&req.key);
        let prompt = resolve_prompt(&req, model_name)?;

        let engine = state.generation_engine_for(&req.key).await?;
        let extract_reasoning = req.extract_reasoning;
        let generation = generation_request(&req, prompt);

        tracing::info!(model = %req.key, "dispatching batch generation");
        let response = engine.generate(generation, CancellationToken::new()).await?;

        if extract_reasoning {
            let split = reasoning::split(&response.text);
            Ok(GenerateResponse {
                text: split.final_answer,
                finish_reason: finish_reason_label(response.finish_reason).to_string(),
                prompt_tokens: response.prompt_tokens,
                completion_tokens: response.completion_tokens,
                thinking: split.thinking,
                reasoning_tokens: split.reasoning_tokens,
            })
        } else {
            Ok(GenerateResponse {
                text: response.text,
                finish_reason: finish_reason_label(response.finish_reason).to_string(),
                prompt_tokens: response.prompt_tokens,
                completion_tokens: response.completion_tokens,
                thinking: None,
                reasoning_tokens: 0,
            })
        }
    }
}

/// Raw streaming handler (§4.8 `generateStream`): not a [`RouteHandler`] because
/// its response is a chunked token stream, not a single JSON body.
pub async fn stream_generate(State(state): State<AppState>, axum::Json(req): axum::Json<GenerateRequest>) -> Response {
    if let Err(err) = GenerateRoute::validate_request(&req).await {
        return err.into_response();
    }

    let model = match state.repo.get(&req.key).await {
        Ok(model) => model,
        Err(err) => return ApiError::from(err).into_response(),
    };
    let model_name = model.as_ref().map(|m| m.name.clone()).unwrap_or_else(|| req.key.clone());
    let prompt = match resolve_prompt(&req, &model_name) {
        Ok(prompt) => prompt,
        Err(err) => return err.into_response(),
    };

    let engine = match state.generation_engine_for(&req.key).await {
        Ok(engine) => engine,
        Err(err) => return ApiError::from(err).into_response(),
    };
    let generation = generation_request(&req, prompt);

    let token_stream = match engine.generate_stream(generation, CancellationToken::new()).await {
        Ok(stream) => stream,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let body_stream = token_stream.map(|chunk| match chunk {
        Ok(text) => Ok::<_, std::io::Error>(bytes::Bytes::from(format!("{text}\n"))),
        Err(err) => Ok(bytes::Bytes::from(format!("[error] {err}\n"))),
    });

    Response::builder()
        .header("content-type", "application/x-ndjson")
        .body(Body::from_stream(body_stream))
        .expect("static headers are always valid")
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmbedRequest {
    pub key: String,
    pub texts: Vec<String>,
    #[serde(default)]
    pub normalize: bool,
}

#[derive(Debug, Serialize)]
pub struct EmbedResponse {
    pub vectors: Vec<Vec<f32>>,
    pub tokens: u32,
    pub dimension: usize,
}

pub struct EmbedRoute;

#[async_trait]
impl RouteHandler for EmbedRoute {
    type Request = EmbedRequest;
    type Response = EmbedResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/embed",
            method: Method::POST,
            tags: &["Inference"],
            description: "Embed a batch of texts, with optional L2 normalization (§4.9)",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.key)?;
        if req.texts.is_empty() {
            return Err(ApiError::BadRequest("texts must not be empty".into()));
        }
        if req.texts.iter().any(|t| t.is_empty()) {
            return Err(ApiError::BadRequest("texts must not contain an empty entry".into()));
        }
        Ok(())
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let engine = state.embedding_engine_for(&req.key).await?;
        let response = engine
            .embed(EmbeddingRequest { texts: req.texts, normalize: req.normalize })
            .await?;
        Ok(EmbedResponse {
            vectors: response.vectors,
            tokens: response.tokens,
            dimension: response.dimension,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_request_missing_both_prompt_and_messages() {
        let req = GenerateRequest {
            key: "m".to_string(),
            prompt: None,
            messages: None,
            system_prompt: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop: None,
            repeat_penalty: None,
            seed: None,
            logit_bias: None,
            anti_prompts: None,
            timeout_ms: None,
            extract_reasoning: false,
        };
        assert!(GenerateRoute::validate_request(&req).await.is_err());
    }

    #[tokio::test]
    async fn rejects_out_of_range_temperature() {
        let req = GenerateRequest {
            key: "m".to_string(),
            prompt: Some("hi".to_string()),
            messages: None,
            system_prompt: None,
            max_tokens: None,
            temperature: Some(3.0),
            top_p: None,
            stop: None,
            repeat_penalty: None,
            seed: None,
            logit_bias: None,
            anti_prompts: None,
            timeout_ms: None,
            extract_reasoning: false,
        };
        assert!(GenerateRoute::validate_request(&req).await.is_err());
    }

    #[tokio::test]
    async fn rejects_empty_text_in_embed_batch() {
        let req = EmbedRequest {
            key: "m".to_string(),
            texts: vec!["hello".to_string(), String::new()],
            normalize: false,
        };
        assert!(EmbedRoute::validate_request(&req).await.is_err());
    }
}

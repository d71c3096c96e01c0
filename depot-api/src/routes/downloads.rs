//! Download Manager operations (§6.4): download, pause, resume, cancel, status.

use crate::error::{ApiError, ApiResult};
use crate::route_trait::{validators::NotEmpty, RouteHandler, RouteMetadata, ValidationRule};
use crate::state::AppState;
use async_trait::async_trait;
use axum::http::Method;
use depot_values::{Capabilities, ModelType};
use model_cache::{DownloadStatus, Progress};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn model_type_from_str(s: &str) -> ApiResult<ModelType> {
    match s {
        "text-generation" => Ok(ModelType::TextGeneration),
        "embedding" => Ok(ModelType::Embedding),
        other => Err(ApiError::BadRequest(format!(
            "modelType must be 'text-generation' or 'embedding', got '{other}'"
        ))),
    }
}

fn default_capabilities(model_type: ModelType) -> Capabilities {
    Capabilities {
        supports_text_generation: model_type == ModelType::TextGeneration,
        supports_embeddings: model_type == ModelType::Embedding,
        ..Capabilities::default()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressDto {
    pub model_id: String,
    pub current_file_name: String,
    pub bytes_downloaded: u64,
    pub total_bytes: u64,
    pub bytes_per_second: f64,
    pub status: String,
    pub error_message: Option<String>,
}

impl From<Progress> for ProgressDto {
    fn from(p: Progress) -> Self {
        Self {
            model_id: p.model_id,
            current_file_name: p.current_file_name,
            bytes_downloaded: p.bytes_downloaded,
            total_bytes: p.total_bytes,
            bytes_per_second: p.bytes_per_second,
            status: status_label(p.status).to_string(),
            error_message: p.error_message,
        }
    }
}

fn status_label(status: DownloadStatus) -> &'static str {
    match status {
        DownloadStatus::Initializing => "initializing",
        DownloadStatus::Downloading => "downloading",
        DownloadStatus::Paused => "paused",
        DownloadStatus::Completed => "completed",
        DownloadStatus::Cancelled => "cancelled",
        DownloadStatus::Failed => "failed",
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DownloadRequest {
    pub model_id: String,
    pub model_type: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub model: depot_values::Model,
}

pub struct DownloadRoute;

#[async_trait]
impl RouteHandler for DownloadRoute {
    type Request = DownloadRequest;
    type Response = DownloadResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/download",
            method: Method::POST,
            tags: &["Downloads"],
            description: "Start a resumable, concurrency-bounded download of a model (§4.5)",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.model_id)?;
        model_type_from_str(&req.model_type).map(|_| ())
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let model_type = model_type_from_str(&req.model_type)?;
        let identifier = depot_layout::parse(&req.model_id).map_err(ApiError::from)?;
        let paths = depot_layout::derive_paths(&state.config.models_directory, model_type, &identifier);
        let model = state
            .downloads
            .download(&req.model_id, identifier, paths.dir, default_capabilities(model_type), None)
            .await?;
        state.repo.save(model.clone()).await?;
        Ok(DownloadResponse { model })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResumeRequest {
    pub model_id: String,
    pub model_type: String,
}

pub struct ResumeRoute;

#[async_trait]
impl RouteHandler for ResumeRoute {
    type Request = ResumeRequest;
    type Response = DownloadResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/download/resume",
            method: Method::POST,
            tags: &["Downloads"],
            description: "Resume a paused download (§4.5.8)",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.model_id)?;
        model_type_from_str(&req.model_type).map(|_| ())
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let model_type = model_type_from_str(&req.model_type)?;
        let identifier = depot_layout::parse(&req.model_id).map_err(ApiError::from)?;
        let paths = depot_layout::derive_paths(&state.config.models_directory, model_type, &identifier);
        let model = state
            .downloads
            .resume(&req.model_id, identifier, paths.dir, default_capabilities(model_type), None)
            .await?;
        state.repo.save(model.clone()).await?;
        Ok(DownloadResponse { model })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ModelIdRequest {
    pub model_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BoolResponse {
    pub ok: bool,
}

pub struct PauseRoute;

#[async_trait]
impl RouteHandler for PauseRoute {
    type Request = ModelIdRequest;
    type Response = BoolResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/download/pause",
            method: Method::POST,
            tags: &["Downloads"],
            description: "Pause an in-flight download, persisting its resume point (§4.5.8)",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.model_id)
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let ok = state.downloads.pause(&req.model_id).await?;
        Ok(BoolResponse { ok })
    }
}

pub struct CancelRoute;

#[async_trait]
impl RouteHandler for CancelRoute {
    type Request = ModelIdRequest;
    type Response = BoolResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/download/cancel",
            method: Method::POST,
            tags: &["Downloads"],
            description: "Cancel a download and discard its resume state (§4.5.9)",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.model_id)
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let ok = state.downloads.cancel(&req.model_id).await?;
        Ok(BoolResponse { ok })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DownloadStatusResponse {
    pub status: Option<String>,
    pub progress: Option<ProgressDto>,
}

pub struct DownloadStatusRoute;

#[async_trait]
impl RouteHandler for DownloadStatusRoute {
    type Request = ModelIdRequest;
    type Response = DownloadStatusResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/download/status",
            method: Method::POST,
            tags: &["Downloads"],
            description: "Reconciled in-memory/on-disk download status for one model (§4.5.7)",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.model_id)
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let status = state.downloads.status(&req.model_id).await.map(status_label).map(str::to_string);
        let progress = state.downloads.progress(&req.model_id).map(ProgressDto::from);
        Ok(DownloadStatusResponse { status, progress })
    }
}

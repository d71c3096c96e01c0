//! Catalog operations over the Model Repository (§6.4): list, show, alias,
//! check-downloaded, delete, list-loaded.

use crate::error::ApiResult;
use crate::route_trait::{validators::NotEmpty, RouteHandler, RouteMetadata, TestCase, ValidationRule};
use crate::state::AppState;
use async_trait::async_trait;
use axum::http::Method;
use depot_values::{Model, RuntimeStatus};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListModelsRequest {}

#[derive(Debug, Serialize)]
pub struct ListModelsResponse {
    pub models: Vec<Model>,
}

pub struct ListModelsRoute;

#[async_trait]
impl RouteHandler for ListModelsRoute {
    type Request = ListModelsRequest;
    type Response = ListModelsResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/models",
            method: Method::GET,
            tags: &["Models"],
            description: "List every model recorded in the local catalog",
            openai_compatible: false,
        }
    }

    async fn validate_request(_req: &Self::Request) -> ApiResult<()> {
        Ok(())
    }

    async fn handle(_req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let models = state.repo.list().await?;
        Ok(ListModelsResponse { models })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ShowModelRequest {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct ShowModelResponse {
    pub model: Option<Model>,
}

pub struct ShowModelRoute;

#[async_trait]
impl RouteHandler for ShowModelRoute {
    type Request = ShowModelRequest;
    type Response = ShowModelResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/models/show",
            method: Method::POST,
            tags: &["Models"],
            description: "Resolve a model by canonical id or alias",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.key)
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let model = state.repo.get(&req.key).await?;
        Ok(ShowModelResponse { model })
    }

    fn test_cases() -> Vec<TestCase<Self::Request, Self::Response>> {
        vec![TestCase::error(
            "empty_key",
            ShowModelRequest { key: String::new() },
            "cannot be empty",
        )]
    }
}

/// Also serves "get by alias" (§6.4) — aliases and canonical ids share one resolution path.
pub type GetByAliasRoute = ShowModelRoute;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetAliasRequest {
    pub key: String,
    pub alias: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SetAliasResponse {
    pub model: Model,
}

pub struct SetAliasRoute;

#[async_trait]
impl RouteHandler for SetAliasRoute {
    type Request = SetAliasRequest;
    type Response = SetAliasResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/models/alias",
            method: Method::POST,
            tags: &["Models"],
            description: "Assign or clear a model's user-facing alias",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.key)
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let model = state.repo.set_alias(&req.key, req.alias).await?;
        Ok(SetAliasResponse { model })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckDownloadedRequest {
    pub key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckDownloadedResponse {
    pub downloaded: bool,
}

pub struct CheckDownloadedRoute;

#[async_trait]
impl RouteHandler for CheckDownloadedRoute {
    type Request = CheckDownloadedRequest;
    type Response = CheckDownloadedResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/models/downloaded",
            method: Method::POST,
            tags: &["Models"],
            description: "Check whether a model's metadata JSON is present on disk (§3.5)",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.key)
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let downloaded = state.repo.get(&req.key).await?.is_some();
        Ok(CheckDownloadedResponse { downloaded })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteModelRequest {
    pub key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteModelResponse {
    pub deleted: bool,
}

pub struct DeleteModelRoute;

#[async_trait]
impl RouteHandler for DeleteModelRoute {
    type Request = DeleteModelRequest;
    type Response = DeleteModelResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/models/delete",
            method: Method::DELETE,
            tags: &["Models"],
            description: "Remove a model's files and catalog entry",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.key)
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        state.repo.delete(&req.key).await?;
        state.forget_engines(&req.key);
        Ok(DeleteModelResponse { deleted: true })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListLoadedRequest {}

#[derive(Debug, Serialize)]
pub struct LoadedModel {
    pub key: String,
    pub status: RuntimeStatus,
}

#[derive(Debug, Serialize)]
pub struct ListLoadedResponse {
    pub loaded: Vec<LoadedModel>,
}

pub struct ListLoadedRoute;

#[async_trait]
impl RouteHandler for ListLoadedRoute {
    type Request = ListLoadedRequest;
    type Response = ListLoadedResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/models/loaded",
            method: Method::GET,
            tags: &["Models"],
            description: "List models whose runtime status is not Unloaded",
            openai_compatible: false,
        }
    }

    async fn validate_request(_req: &Self::Request) -> ApiResult<()> {
        Ok(())
    }

    async fn handle(_req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let models = state.repo.list().await?;
        let loaded = models
            .into_iter()
            .map(|m| LoadedModel {
                status: state.loader.status(&m.id),
                key: m.id,
            })
            .filter(|entry| !matches!(entry.status.state, depot_values::RuntimeState::Unloaded))
            .collect();
        Ok(ListLoadedResponse { loaded })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoadModelRequest {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct LoadModelResponse {
    pub status: RuntimeStatus,
}

pub struct LoadModelRoute;

#[async_trait]
impl RouteHandler for LoadModelRoute {
    type Request = LoadModelRequest;
    type Response = LoadModelResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/models/load",
            method: Method::POST,
            tags: &["Models"],
            description: "Load a model into an in-process inference engine (§4.7)",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.key)
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        state.loader.load(&req.key, model_loader::LoadParams::default()).await?;
        let canonical = state
            .repo
            .get(&req.key)
            .await?
            .map(|m| m.id)
            .unwrap_or_else(|| req.key.clone());
        Ok(LoadModelResponse {
            status: state.loader.status(&canonical),
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UnloadModelRequest {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct UnloadModelResponse {
    pub status: RuntimeStatus,
}

pub struct UnloadModelRoute;

#[async_trait]
impl RouteHandler for UnloadModelRoute {
    type Request = UnloadModelRequest;
    type Response = UnloadModelResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/models/unload",
            method: Method::POST,
            tags: &["Models"],
            description: "Unload a model, freeing its loader cache slot (§4.7)",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.key)
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let canonical = state
            .repo
            .get(&req.key)
            .await?
            .map(|m| m.id)
            .unwrap_or_else(|| req.key.clone());
        state.loader.unload(&canonical).await?;
        state.forget_engines(&req.key);
        state.forget_engines(&canonical);
        Ok(UnloadModelResponse {
            status: state.loader.status(&canonical),
        })
    }
}

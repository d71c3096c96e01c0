//! Collection discovery over the Hub Client (§6.4): discover, collection
//! info, collection models. Decomposes hub listings into artifacts via the
//! Artifact Analyzer (C2) the same way the Download Manager does.

use crate::error::{ApiError, ApiResult};
use crate::route_trait::{validators::NotEmpty, RouteHandler, RouteMetadata, ValidationRule};
use crate::state::AppState;
use artifact_analyzer::{analyze, FileEntry};
use async_trait::async_trait;
use axum::http::Method;
use depot_values::{Capabilities, Collection, ModelType};
use hub_client::{is_embedding_tags, is_text_generation_tags, HubModelMeta, ListModelsQuery};
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

fn collection_from_meta(meta: HubModelMeta, requested_type: ModelType) -> Collection {
    let (publisher, name) = meta
        .repo_id
        .split_once('/')
        .map(|(p, n)| (p.to_string(), n.to_string()))
        .unwrap_or_else(|| ("unknown".to_string(), meta.repo_id.clone()));

    let files: Vec<FileEntry> = meta
        .siblings
        .iter()
        .map(|s| FileEntry {
            path: s.path.clone(),
            size: s.effective_size(),
        })
        .collect();
    let artifacts = analyze(&files);

    let capabilities = Capabilities {
        supports_text_generation: is_text_generation_tags(&meta.tags),
        supports_embeddings: is_embedding_tags(&meta.tags),
        ..Capabilities::default()
    };

    Collection {
        hub: "hf".to_string(),
        collection_id: meta.repo_id.clone(),
        name,
        publisher,
        model_type: requested_type,
        default_format: artifacts.first().map(|a| a.format.clone()).unwrap_or_default(),
        version: None,
        description: None,
        tags: meta.tags,
        downloads: meta.downloads.max(0) as u64,
        likes: meta.likes.max(0) as u64,
        created_at: meta.created_at,
        last_modified: meta.last_modified,
        is_gated: meta.is_gated(),
        license: None,
        language: Vec::new(),
        capabilities,
        artifacts,
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DiscoverRequest {
    pub model_type: String,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct DiscoverResponse {
    pub collections: Vec<Collection>,
}

pub struct DiscoverRoute;

#[async_trait]
impl RouteHandler for DiscoverRoute {
    type Request = DiscoverRequest;
    type Response = DiscoverResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/discover",
            method: Method::POST,
            tags: &["Discovery"],
            description: "Discover hub collections matching a model type and optional filters",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        model_type_from_str(&req.model_type).map(|_| ())
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let model_type = model_type_from_str(&req.model_type)?;
        let query = ListModelsQuery {
            search: req.search,
            tag: req.tag,
            limit: req.limit,
            sort: None,
            direction: None,
        };
        let metas = state.hub.list_models(model_type, &query).await?;
        let collections = metas
            .into_iter()
            .map(|m| collection_from_meta(m, model_type))
            .collect();
        Ok(DiscoverResponse { collections })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CollectionRequest {
    pub repo_id: String,
    pub model_type: String,
}

#[derive(Debug, Serialize)]
pub struct CollectionInfoResponse {
    pub collection: Collection,
}

pub struct CollectionInfoRoute;

#[async_trait]
impl RouteHandler for CollectionInfoRoute {
    type Request = CollectionRequest;
    type Response = CollectionInfoResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/collections/info",
            method: Method::POST,
            tags: &["Discovery"],
            description: "Fetch one collection's metadata and artifact decomposition",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.repo_id)?;
        model_type_from_str(&req.model_type).map(|_| ())
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let model_type = model_type_from_str(&req.model_type)?;
        let meta = state.hub.find_model(&req.repo_id).await?;
        Ok(CollectionInfoResponse {
            collection: collection_from_meta(meta, model_type),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CollectionModelsResponse {
    pub artifacts: Vec<depot_values::Artifact>,
}

pub struct CollectionModelsRoute;

#[async_trait]
impl RouteHandler for CollectionModelsRoute {
    type Request = CollectionRequest;
    type Response = CollectionModelsResponse;

    fn metadata() -> RouteMetadata {
        RouteMetadata {
            path: "/v1/collections/models",
            method: Method::POST,
            tags: &["Discovery"],
            description: "List the artifacts (downloadable models) within a collection",
            openai_compatible: false,
        }
    }

    async fn validate_request(req: &Self::Request) -> ApiResult<()> {
        NotEmpty.validate(&req.repo_id)?;
        model_type_from_str(&req.model_type).map(|_| ())
    }

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response> {
        let model_type = model_type_from_str(&req.model_type)?;
        let meta = state.hub.find_model(&req.repo_id).await?;
        let collection = collection_from_meta(meta, model_type);
        Ok(CollectionModelsResponse {
            artifacts: collection.artifacts,
        })
    }
}

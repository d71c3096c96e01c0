//! Shared application state threaded through every route (§6.4).

use dashmap::DashMap;
use depot_values::Result;
use hub_client::HubClient;
use inference_engine::{EmbeddingEngine, GenerationEngine};
use model_cache::{DownloadManager, DownloadManagerConfig};
use model_loader::{AdapterRegistry, LoadParams, Loader};
use model_repository::ModelRepository;
use std::path::PathBuf;
use std::sync::Arc;

/// Server-wide configuration recognized per §6.5.
#[derive(Debug, Clone)]
pub struct DepotConfig {
    pub models_directory: PathBuf,
    pub max_concurrent_downloads: usize,
    pub verify_checksums: bool,
    pub minimum_free_disk_space: u64,
    pub max_cached_models: usize,
    pub enable_model_caching: bool,
    pub default_timeout_ms: u64,
    pub max_concurrent_operations: usize,
    pub hub_token: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub hub: HubClient,
    pub repo: Arc<ModelRepository>,
    pub downloads: Arc<DownloadManager>,
    pub loader: Arc<Loader>,
    pub config: Arc<DepotConfig>,
    generation_engines: Arc<DashMap<String, Arc<GenerationEngine>>>,
    embedding_engines: Arc<DashMap<String, Arc<EmbeddingEngine>>>,
}

impl AppState {
    pub fn new(config: DepotConfig, registry: AdapterRegistry) -> Self {
        let hub = HubClient::new(config.hub_token.clone());
        let repo = Arc::new(ModelRepository::new(config.models_directory.clone()));
        let downloads = Arc::new(DownloadManager::new(
            config.models_directory.clone(),
            hub.clone(),
            DownloadManagerConfig {
                max_concurrent_downloads: config.max_concurrent_downloads,
                minimum_free_disk_space: config.minimum_free_disk_space,
                cleanup_on_cancel: false,
                verify_checksums: config.verify_checksums,
            },
        ));
        let loader = Arc::new(Loader::with_caching(
            repo.clone(),
            registry,
            config.max_cached_models,
            config.enable_model_caching,
        ));

        Self {
            hub,
            repo,
            downloads,
            loader,
            config: Arc::new(config),
            generation_engines: Arc::new(DashMap::new()),
            embedding_engines: Arc::new(DashMap::new()),
        }
    }

    /// Loads (if needed) and returns the generation engine for `key_or_id` (§4.7, §4.8).
    ///
    /// When `enable_model_caching` is false, no engine is reused across
    /// calls: the backend is reloaded fresh (per the Loader's own caching
    /// flag) and wrapped in a new engine every time.
    pub async fn generation_engine_for(&self, key_or_id: &str) -> Result<Arc<GenerationEngine>> {
        let backend = self.loader.load(key_or_id, LoadParams::default()).await?;
        if !self.config.enable_model_caching {
            return Ok(Arc::new(GenerationEngine::with_config(
                backend,
                self.config.max_concurrent_operations,
                std::time::Duration::from_millis(self.config.default_timeout_ms),
            )));
        }
        Ok(self
            .generation_engines
            .entry(key_or_id.to_string())
            .or_insert_with(|| {
                Arc::new(GenerationEngine::with_config(
                    backend,
                    self.config.max_concurrent_operations,
                    std::time::Duration::from_millis(self.config.default_timeout_ms),
                ))
            })
            .clone())
    }

    /// Loads (if needed) and returns the embedding engine for `key_or_id` (§4.7, §4.9).
    pub async fn embedding_engine_for(&self, key_or_id: &str) -> Result<Arc<EmbeddingEngine>> {
        let backend = self.loader.load(key_or_id, LoadParams::default()).await?;
        if !self.config.enable_model_caching {
            return Ok(Arc::new(EmbeddingEngine::with_config(
                backend,
                self.config.max_concurrent_operations,
            )));
        }
        Ok(self
            .embedding_engines
            .entry(key_or_id.to_string())
            .or_insert_with(|| {
                Arc::new(EmbeddingEngine::with_config(backend, self.config.max_concurrent_operations))
            })
            .clone())
    }

    /// Drops any cached engines for a model that was just unloaded (§4.7 eviction).
    pub fn forget_engines(&self, key_or_id: &str) {
        self.generation_engines.remove(key_or_id);
        self.embedding_engines.remove(key_or_id);
    }
}

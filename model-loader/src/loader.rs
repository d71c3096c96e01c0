//! Loader (C7, §4.7): resolves models, selects adapters, and bounds a cache
//! of loaded backends (FIFO eviction) keyed by canonical id.

use crate::backend::{Backend, LoadParams};
use crate::registry::AdapterRegistry;
use chrono::Utc;
use dashmap::DashMap;
use depot_values::{DepotError, Result, RuntimeState, RuntimeStatus};
use model_repository::ModelRepository;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

const DEFAULT_MAX_CACHED_MODELS: usize = 2;

struct LoadedEntry {
    backend: Arc<dyn Backend>,
    adapter_name: String,
}

pub struct Loader {
    repo: Arc<ModelRepository>,
    registry: AdapterRegistry,
    cache: DashMap<String, LoadedEntry>,
    statuses: DashMap<String, RuntimeStatus>,
    insertion_order: Mutex<VecDeque<String>>,
    max_cached_models: usize,
    /// §6.5 `EnableModelCaching`: when false, a loaded backend is never
    /// retained across separate `load` calls — each resolves to a fresh
    /// adapter load rather than reusing an entry left by a prior call.
    enable_caching: bool,
}

impl Loader {
    pub fn new(repo: Arc<ModelRepository>, registry: AdapterRegistry, max_cached_models: usize) -> Self {
        Self::with_caching(repo, registry, max_cached_models, true)
    }

    pub fn with_caching(
        repo: Arc<ModelRepository>,
        registry: AdapterRegistry,
        max_cached_models: usize,
        enable_caching: bool,
    ) -> Self {
        Self {
            repo,
            registry,
            cache: DashMap::new(),
            statuses: DashMap::new(),
            insertion_order: Mutex::new(VecDeque::new()),
            max_cached_models: max_cached_models.max(1),
            enable_caching,
        }
    }

    pub fn with_defaults(repo: Arc<ModelRepository>, registry: AdapterRegistry) -> Self {
        Self::new(repo, registry, DEFAULT_MAX_CACHED_MODELS)
    }

    pub fn status(&self, canonical_id: &str) -> RuntimeStatus {
        self.statuses
            .get(canonical_id)
            .map(|s| s.clone())
            .unwrap_or_else(RuntimeStatus::unloaded)
    }

    fn set_status(&self, canonical_id: &str, state: RuntimeState, error_message: Option<String>) {
        let mut entry = self
            .statuses
            .entry(canonical_id.to_string())
            .or_insert_with(RuntimeStatus::unloaded);
        entry.state = state;
        entry.last_status_change = Utc::now();
        entry.error_message = error_message;
        if state == RuntimeState::Loaded {
            entry.loaded_at = Some(Utc::now());
        }
    }

    /// §4.7 `load` flow.
    pub async fn load(&self, key_or_id: &str, adapter_params: LoadParams) -> Result<Arc<dyn Backend>> {
        let model = self
            .repo
            .get(key_or_id)
            .await?
            .ok_or_else(|| DepotError::NotFound(key_or_id.to_string()))?;
        let canonical = model.id.clone();

        if self.enable_caching {
            if let Some(entry) = self.cache.get(&canonical) {
                return Ok(entry.backend.clone());
            }
        }

        self.set_status(&canonical, RuntimeState::Loading, None);

        let mut params = adapter_params;
        let local_path = std::path::Path::new(&model.local_path);
        match tokio::fs::metadata(local_path).await {
            Ok(meta) if meta.is_dir() => {
                params.weight_file = largest_weight_file(local_path).await;
                if params.weight_file.is_none() {
                    let reason = "directory contains no .gguf/.ggml weight file".to_string();
                    self.set_status(&canonical, RuntimeState::Failed, Some(reason.clone()));
                    return Err(DepotError::ModelLoadFailure {
                        model: canonical,
                        reason,
                    });
                }
            }
            Ok(_) => {}
            Err(_) => {
                let reason = format!("local path '{}' does not exist", model.local_path);
                self.set_status(&canonical, RuntimeState::Failed, Some(reason.clone()));
                return Err(DepotError::ModelLoadFailure {
                    model: canonical,
                    reason,
                });
            }
        }

        let Some(adapter) = self.registry.find_for(&model) else {
            let reason = "no adapter advertises this format/type".to_string();
            self.set_status(&canonical, RuntimeState::Failed, Some(reason));
            return Err(DepotError::AdapterUnavailable {
                format: model.format.clone(),
                model_type: format!("{:?}", model.model_type),
            });
        };

        match adapter.load(&model, &params).await {
            Ok(backend) => {
                self.cache.insert(
                    canonical.clone(),
                    LoadedEntry {
                        backend: backend.clone(),
                        adapter_name: adapter.name().to_string(),
                    },
                );
                {
                    let mut order = self.insertion_order.lock().await;
                    order.push_back(canonical.clone());
                }
                self.set_status(&canonical, RuntimeState::Loaded, None);
                if let Some(mut status) = self.statuses.get_mut(&canonical) {
                    status.adapter_name = Some(adapter.name().to_string());
                }
                if self.enable_caching {
                    self.enforce_cache_bound(&canonical).await;
                } else {
                    // Caching disabled: don't retain the entry past this call,
                    // so the next `load` for the same id goes through the
                    // adapter again instead of hitting the fast path above.
                    self.cache.remove(&canonical);
                    {
                        let mut order = self.insertion_order.lock().await;
                        order.retain(|id| id != &canonical);
                    }
                    self.set_status(&canonical, RuntimeState::Unloaded, None);
                }
                Ok(backend)
            }
            Err(e) => {
                self.set_status(&canonical, RuntimeState::Failed, Some(e.to_string()));
                Err(DepotError::ModelLoadFailure {
                    model: canonical,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// FIFO eviction beyond `max_cached_models`; eviction failures are
    /// warnings only and never fail the triggering load (§4.7 step 6).
    async fn enforce_cache_bound(&self, just_loaded: &str) {
        loop {
            let oldest = {
                let mut order = self.insertion_order.lock().await;
                if order.len() <= self.max_cached_models {
                    break;
                }
                order.pop_front()
            };
            let Some(oldest) = oldest else { break };
            if oldest == just_loaded {
                continue;
            }
            if let Err(e) = self.unload(&oldest).await {
                warn!(model_id = oldest, error = %e, "cache eviction failed to unload");
            }
        }
    }

    /// Idempotent: unloading an unknown id is a no-op returning success (§4.7).
    pub async fn unload(&self, canonical_id: &str) -> Result<()> {
        if self.cache.get(canonical_id).is_none() {
            return Ok(());
        }
        self.set_status(canonical_id, RuntimeState::Unloading, None);
        self.cache.remove(canonical_id);
        {
            let mut order = self.insertion_order.lock().await;
            order.retain(|id| id != canonical_id);
        }
        self.set_status(canonical_id, RuntimeState::Unloaded, None);
        Ok(())
    }

    pub fn adapter_name_for(&self, canonical_id: &str) -> Option<String> {
        self.cache.get(canonical_id).map(|e| e.adapter_name.clone())
    }
}

/// Picks the largest `.gguf`/`.ggml` file in `dir` as the concrete weight file.
async fn largest_weight_file(dir: &std::path::Path) -> Option<std::path::PathBuf> {
    let mut best: Option<(std::path::PathBuf, u64)> = None;
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_weight = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("gguf") | Some("ggml")
        );
        if !is_weight {
            continue;
        }
        if let Ok(meta) = entry.metadata().await {
            let size = meta.len();
            if best.as_ref().map(|(_, s)| size > *s).unwrap_or(true) {
                best = Some((path, size));
            }
        }
    }
    best.map(|(path, _)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GenerationParams, TokenStream};
    use async_trait::async_trait;
    use depot_values::{Capabilities, Model, ModelType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend;

    #[async_trait]
    impl Backend for CountingBackend {
        async fn generate(&self, _params: GenerationParams) -> Result<String> {
            Ok(String::new())
        }
        async fn generate_stream(&self, _params: GenerationParams) -> Result<TokenStream> {
            Ok(Box::pin(futures::stream::empty()))
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(Vec::new())
        }
    }

    struct CountingAdapter {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl crate::backend::Adapter for CountingAdapter {
        fn name(&self) -> &str {
            "counting"
        }
        fn supported_formats(&self) -> &[&str] {
            &["gguf"]
        }
        fn supported_types(&self) -> &[ModelType] {
            &[ModelType::TextGeneration]
        }
        async fn load(&self, _model: &Model, _params: &LoadParams) -> Result<Arc<dyn Backend>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(CountingBackend))
        }
    }

    async fn repo_with_one_model(dir: &std::path::Path) -> (Arc<ModelRepository>, String) {
        let weight_file = dir.join("weights.gguf");
        tokio::fs::write(&weight_file, b"x").await.unwrap();
        let repo = Arc::new(ModelRepository::new(dir));
        let model = Model {
            id: "hf:acme/widget/q4".to_string(),
            alias: None,
            name: "widget".to_string(),
            description: None,
            version: None,
            registry: "hf".to_string(),
            repo_id: "acme/widget".to_string(),
            artifact_name: "q4".to_string(),
            model_type: ModelType::TextGeneration,
            format: "gguf".to_string(),
            capabilities: Capabilities::default(),
            size_in_bytes: 1,
            files: vec!["weights.gguf".to_string()],
            local_path: weight_file.display().to_string(),
            created_at: None,
        };
        repo.save(model.clone()).await.unwrap();
        (repo, model.id)
    }

    #[tokio::test]
    async fn caching_enabled_reuses_backend_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, id) = repo_with_one_model(dir.path()).await;
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(CountingAdapter { loads: AtomicUsize::new(0) }));
        let loader = Loader::with_caching(repo, registry, 2, true);

        loader.load(&id, LoadParams::default()).await.unwrap();
        loader.load(&id, LoadParams::default()).await.unwrap();
        assert_eq!(loader.status(&id).state, RuntimeState::Loaded);
    }

    #[tokio::test]
    async fn disabled_caching_reloads_on_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, id) = repo_with_one_model(dir.path()).await;
        let counter = Arc::new(AtomicUsize::new(0));
        struct Adapter(Arc<AtomicUsize>);
        #[async_trait]
        impl crate::backend::Adapter for Adapter {
            fn name(&self) -> &str {
                "counting"
            }
            fn supported_formats(&self) -> &[&str] {
                &["gguf"]
            }
            fn supported_types(&self) -> &[ModelType] {
                &[ModelType::TextGeneration]
            }
            async fn load(&self, _model: &Model, _params: &LoadParams) -> Result<Arc<dyn Backend>> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(CountingBackend))
            }
        }
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(Adapter(counter.clone())));
        let loader = Loader::with_caching(repo, registry, 2, false);

        loader.load(&id, LoadParams::default()).await.unwrap();
        loader.load(&id, LoadParams::default()).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(loader.status(&id).state, RuntimeState::Unloaded);
    }

    #[tokio::test]
    async fn unload_of_unknown_model_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(ModelRepository::new(dir.path()));
        let loader = Loader::with_defaults(repo, AdapterRegistry::new());
        loader.unload("hf:nobody/here/x").await.unwrap();
        assert_eq!(
            loader.status("hf:nobody/here/x").state,
            RuntimeState::Unloaded
        );
    }

    #[tokio::test]
    async fn load_fails_with_not_found_for_unknown_model() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(ModelRepository::new(dir.path()));
        let loader = Loader::with_defaults(repo, AdapterRegistry::new());
        let err = loader
            .load("hf:nobody/here/x", LoadParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DepotError::NotFound(_)));
    }
}

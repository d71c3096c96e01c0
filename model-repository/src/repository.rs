//! Model Repository (C6, §4.6): the sole owner of persisted model metadata.

use dashmap::DashMap;
use depot_values::{DepotError, Model, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::warn;

pub struct ModelRepository {
    models_root: PathBuf,
    cache: DashMap<String, Model>,
    /// lowercased alias -> canonical id
    alias_index: DashMap<String, String>,
    scanned: AtomicBool,
    scan_lock: Mutex<()>,
    save_lock: Mutex<()>,
}

impl ModelRepository {
    pub fn new(models_root: impl Into<PathBuf>) -> Self {
        Self {
            models_root: models_root.into(),
            cache: DashMap::new(),
            alias_index: DashMap::new(),
            scanned: AtomicBool::new(false),
            scan_lock: Mutex::new(()),
            save_lock: Mutex::new(()),
        }
    }

    /// Lazy, one-time scan of `{models}` for metadata JSON files (§4.6).
    async fn ensure_scanned(&self) -> Result<()> {
        if self.scanned.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.scan_lock.lock().await;
        if self.scanned.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut stack = vec![self.models_root.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    if path.file_name().and_then(|n| n.to_str()) == Some(".downloads") {
                        continue;
                    }
                    stack.push(path);
                } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    if let Ok(bytes) = tokio::fs::read(&path).await {
                        if let Ok(model) = serde_json::from_slice::<Model>(&bytes) {
                            self.index(model);
                        }
                    }
                }
            }
        }
        self.scanned.store(true, Ordering::Release);
        Ok(())
    }

    fn index(&self, model: Model) {
        if let Some(alias) = &model.alias {
            self.alias_index
                .insert(alias.to_lowercase(), model.id.clone());
        }
        self.cache.insert(model.id.clone(), model);
    }

    /// Resolution order (§4.6): direct id hit -> case-insensitive alias hit ->
    /// parse as an identifier and read straight from disk.
    pub async fn get(&self, key_or_id: &str) -> Result<Option<Model>> {
        self.ensure_scanned().await?;

        if let Some(model) = self.cache.get(key_or_id) {
            return Ok(Some(model.clone()));
        }
        if let Some(canonical) = self.alias_index.get(&key_or_id.to_lowercase()) {
            if let Some(model) = self.cache.get(canonical.as_str()) {
                return Ok(Some(model.clone()));
            }
        }

        let identifier = match depot_layout::parse(key_or_id) {
            Ok(id) => id,
            Err(_) => return Ok(None),
        };
        // The identifier string doesn't encode model type, so both
        // candidate directories are probed on disk.
        for candidate_type in [
            depot_values::ModelType::TextGeneration,
            depot_values::ModelType::Embedding,
        ] {
            let paths = depot_layout::derive_paths(&self.models_root, candidate_type, &identifier);
            if let Ok(bytes) = tokio::fs::read(&paths.metadata_path).await {
                if let Ok(model) = serde_json::from_slice::<Model>(&bytes) {
                    self.index(model.clone());
                    return Ok(Some(model));
                }
            }
        }
        Ok(None)
    }

    pub async fn list(&self) -> Result<Vec<Model>> {
        self.ensure_scanned().await?;
        Ok(self.cache.iter().map(|e| e.value().clone()).collect())
    }

    /// Saves are serialized via a single mutex to avoid concurrent metadata
    /// corruption (§4.6). Enforces alias uniqueness among non-empty aliases.
    pub async fn save(&self, model: Model) -> Result<()> {
        self.ensure_scanned().await?;
        let _guard = self.save_lock.lock().await;

        if let Some(alias) = &model.alias {
            let key = alias.to_lowercase();
            if let Some(existing) = self.alias_index.get(&key) {
                if existing.as_str() != model.id {
                    return Err(DepotError::InvalidRequest(format!(
                        "alias '{alias}' is already assigned to '{}'",
                        existing.as_str()
                    )));
                }
            }
        }

        let identifier = depot_layout::parse(&model.id)
            .map_err(|_| DepotError::InvalidIdentifier(model.id.clone()))?;
        let paths = depot_layout::derive_paths(&self.models_root, model.model_type, &identifier);
        write_json_atomic(&paths.metadata_path, &model).await?;

        if let Some(previous) = self.cache.get(&model.id) {
            if let Some(old_alias) = &previous.alias {
                if previous.alias != model.alias {
                    self.alias_index.remove(&old_alias.to_lowercase());
                }
            }
        }
        self.index(model);
        Ok(())
    }

    /// Assign or clear (`alias=None`) a model's alias, enforcing global
    /// uniqueness among non-empty aliases.
    pub async fn set_alias(&self, key_or_id: &str, alias: Option<String>) -> Result<Model> {
        let mut model = self
            .get(key_or_id)
            .await?
            .ok_or_else(|| DepotError::NotFound(key_or_id.to_string()))?;
        model.alias = alias;
        self.save(model.clone()).await?;
        Ok(model)
    }

    /// Recursively removes the model's entire directory after a soft-match
    /// existence check. The cache entry is dropped even if directory removal
    /// partially fails — a warning is recorded rather than propagated (§4.6).
    pub async fn delete(&self, key_or_id: &str) -> Result<()> {
        let Some(model) = self.get(key_or_id).await? else {
            return Err(DepotError::NotFound(key_or_id.to_string()));
        };
        let identifier = depot_layout::parse(&model.id)
            .map_err(|_| DepotError::InvalidIdentifier(model.id.clone()))?;
        let paths = depot_layout::derive_paths(&self.models_root, model.model_type, &identifier);

        self.cache.remove(&model.id);
        if let Some(alias) = &model.alias {
            self.alias_index.remove(&alias.to_lowercase());
        }

        if let Err(e) = tokio::fs::remove_dir_all(&paths.dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(model_id = %model.id, error = %e, "partial failure removing model directory");
            }
        }
        Ok(())
    }
}

async fn write_json_atomic(path: &Path, model: &Model) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(model)?;
    tokio::fs::write(&tmp, &body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_values::{Capabilities, ModelType};

    fn sample_model(id: &str, publisher: &str, model_name: &str, artifact_name: &str) -> Model {
        Model {
            id: id.to_string(),
            alias: None,
            name: model_name.to_string(),
            description: None,
            version: None,
            registry: "hf".to_string(),
            repo_id: format!("{publisher}/{model_name}"),
            artifact_name: artifact_name.to_string(),
            model_type: ModelType::TextGeneration,
            format: "gguf".to_string(),
            capabilities: Capabilities::default(),
            size_in_bytes: 100,
            files: vec!["model.gguf".to_string()],
            local_path: "/tmp".to_string(),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn save_then_get_by_canonical_id() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ModelRepository::new(dir.path());
        let model = sample_model("hf:acme/widget/q4", "acme", "widget", "q4");
        repo.save(model.clone()).await.unwrap();
        let found = repo.get("hf:acme/widget/q4").await.unwrap().unwrap();
        assert_eq!(found.artifact_name, "q4");
    }

    #[tokio::test]
    async fn alias_lookup_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ModelRepository::new(dir.path());
        let mut model = sample_model("hf:acme/widget/q4", "acme", "widget", "q4");
        model.alias = Some("MyWidget".to_string());
        repo.save(model).await.unwrap();
        let found = repo.get("mywidget").await.unwrap().unwrap();
        assert_eq!(found.id, "hf:acme/widget/q4");
    }

    #[tokio::test]
    async fn duplicate_alias_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ModelRepository::new(dir.path());
        let mut a = sample_model("hf:acme/widget/q4", "acme", "widget", "q4");
        a.alias = Some("dup".to_string());
        repo.save(a).await.unwrap();

        let mut b = sample_model("hf:acme/gizmo/q5", "acme", "gizmo", "q5");
        b.alias = Some("dup".to_string());
        let err = repo.save(b).await.unwrap_err();
        assert!(matches!(err, DepotError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn delete_removes_cache_entry_even_without_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ModelRepository::new(dir.path());
        let model = sample_model("hf:acme/widget/q4", "acme", "widget", "q4");
        repo.save(model).await.unwrap();
        repo.delete("hf:acme/widget/q4").await.unwrap();
        assert!(repo.get("hf:acme/widget/q4").await.unwrap().is_none());
    }
}

//! Download State Store (C4, §4.4): atomic JSON persistence for in-flight
//! download progress records under `{models}/.downloads`.

use depot_values::{DownloadState, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct DownloadStateStore {
    models_root: PathBuf,
    downloads_dir: PathBuf,
}

impl DownloadStateStore {
    pub fn new(models_root: impl AsRef<Path>) -> Self {
        let models_root = models_root.as_ref().to_path_buf();
        Self {
            downloads_dir: models_root.join(".downloads"),
            models_root,
        }
    }

    fn path_for(&self, model_id: &str) -> PathBuf {
        depot_layout::download_state_path(&self.models_root, model_id)
    }

    /// Write `state` atomically: serialize to a sibling temp file, then rename
    /// over the final path so readers never observe a truncated document.
    pub async fn save(&self, state: &DownloadState) -> Result<()> {
        tokio::fs::create_dir_all(&self.downloads_dir).await?;
        let final_path = self.path_for(&state.model_id);
        let tmp_path = final_path.with_extension("download.tmp");
        let body = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&tmp_path, &body).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;
        Ok(())
    }

    /// Remove a model's state record, tolerating its prior absence.
    pub async fn remove(&self, model_id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(model_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read one model's state record. Truncated or malformed files are
    /// treated as absent rather than as an error (§4.4).
    pub async fn load(&self, model_id: &str) -> Option<DownloadState> {
        let bytes = tokio::fs::read(self.path_for(model_id)).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(model_id, error = %e, "ignoring truncated download state record");
                None
            }
        }
    }

    /// Enumerate every currently recorded download state by scanning the
    /// `.downloads` directory.
    pub async fn list_all(&self) -> Result<Vec<DownloadState>> {
        let mut entries = match tokio::fs::read_dir(&self.downloads_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut states = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("download") {
                continue;
            }
            if let Ok(bytes) = tokio::fs::read(&path).await {
                if let Ok(state) = serde_json::from_slice::<DownloadState>(&bytes) {
                    states.push(state);
                }
            }
        }
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(model_id: &str) -> DownloadState {
        DownloadState {
            model_id: model_id.to_string(),
            target_directory: "/tmp/models".into(),
            downloading_file_name: "model.gguf".into(),
            total_size: 100,
            downloaded_bytes: 40,
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = DownloadStateStore::new(dir.path());
        let state = sample("hf:org/model/artifact");
        store.save(&state).await.unwrap();
        let loaded = store.load(&state.model_id).await.unwrap();
        assert_eq!(loaded.downloaded_bytes, 40);
    }

    #[tokio::test]
    async fn remove_is_idempotent_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = DownloadStateStore::new(dir.path());
        store.remove("hf:org/model/artifact").await.unwrap();
    }

    #[tokio::test]
    async fn list_all_skips_non_download_files_and_junk() {
        let dir = tempfile::tempdir().unwrap();
        let store = DownloadStateStore::new(dir.path());
        store.save(&sample("hf:a/b/c")).await.unwrap();
        tokio::fs::create_dir_all(dir.path().join(".downloads"))
            .await
            .unwrap();
        tokio::fs::write(dir.path().join(".downloads/stray.txt"), b"noise")
            .await
            .unwrap();
        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
    }
}

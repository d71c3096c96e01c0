//! `HubClient`: the depot's one gateway to a remote model hub (§4.3, §6.3).

use bytes::Bytes;
use chrono::{DateTime, Utc};
use depot_values::{DepotError, ModelType, Result};
use futures::{Stream, TryStreamExt};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{is_retriable, map_status, map_transport};
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{FileHead, HubModelMeta, ListModelsQuery};

const DEFAULT_BASE_URL: &str = "https://huggingface.co";

/// Thin wrapper around a hub's REST surface. One instance is shared across
/// the depot (cheap to clone: `reqwest::Client` is itself `Arc`-backed).
#[derive(Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    retry_policy: RetryPolicy,
}

impl HubClient {
    pub fn new(token: Option<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string(), token)
    }

    pub fn with_base_url(base_url: String, token: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client builds with static config");
        Self {
            http,
            base_url,
            token,
            retry_policy: RetryPolicy::default(),
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Fetch a single repository's metadata (`GET /api/models/{repo_id}`).
    pub async fn find_model(&self, repo_id: &str) -> Result<HubModelMeta> {
        let url = format!("{}/api/models/{repo_id}", self.base_url);
        with_retry(&self.retry_policy, is_retriable, || async {
            debug!(repo_id, "fetching model metadata");
            let resp = self
                .authed(self.http.get(&url))
                .send()
                .await
                .map_err(|e| map_transport(&e))?;
            if !resp.status().is_success() {
                return Err(map_status(repo_id, resp.status()));
            }
            resp.json::<HubModelMeta>()
                .await
                .map_err(|e| DepotError::InvalidRequest(format!("malformed model metadata: {e}")))
        })
        .await
    }

    /// List repositories matching a query, scoped to the discovery tags for
    /// `model_type` (`GET /api/models?...`) (§4.3).
    pub async fn list_models(
        &self,
        model_type: ModelType,
        query: &ListModelsQuery,
    ) -> Result<Vec<HubModelMeta>> {
        let url = format!("{}/api/models", self.base_url);
        with_retry(&self.retry_policy, is_retriable, || async {
            let mut req = self.authed(self.http.get(&url));
            for tag in model_type.discovery_tags() {
                req = req.query(&[("filter", *tag)]);
            }
            if let Some(search) = &query.search {
                req = req.query(&[("search", search)]);
            }
            if let Some(tag) = &query.tag {
                req = req.query(&[("filter", tag.as_str())]);
            }
            if let Some(limit) = query.limit {
                req = req.query(&[("limit", limit.to_string())]);
            }
            if let Some(sort) = query.sort {
                req = req.query(&[("sort", sort.as_query_value())]);
            }
            if let Some(direction) = query.direction {
                req = req.query(&[("direction", direction.as_query_value())]);
            }
            req = req.query(&[("full", "true")]);

            let resp = req.send().await.map_err(|e| map_transport(&e))?;
            if !resp.status().is_success() {
                return Err(map_status("(listing)", resp.status()));
            }
            resp.json::<Vec<HubModelMeta>>()
                .await
                .map_err(|e| DepotError::InvalidRequest(format!("malformed listing response: {e}")))
        })
        .await
    }

    /// Walk a repository's file tree, returning each file's effective size in
    /// bytes, keyed by path. LFS size supersedes Git blob size (§4.3).
    pub async fn get_repository_file_sizes(&self, repo_id: &str) -> Result<HashMap<String, i64>> {
        let meta = self.find_model(repo_id).await?;
        Ok(meta
            .siblings
            .iter()
            .map(|s| (s.path.clone(), s.effective_size()))
            .collect())
    }

    /// Walk a repository's file tree, returning each file's expected sha256
    /// digest (the LFS object id) where the hub reports one (§4.3, §6.5).
    /// Files that aren't LFS-tracked have no trustworthy hash and map to `None`.
    pub async fn get_repository_file_hashes(&self, repo_id: &str) -> Result<HashMap<String, Option<String>>> {
        let meta = self.find_model(repo_id).await?;
        Ok(meta
            .siblings
            .iter()
            .map(|s| (s.path.clone(), s.lfs.as_ref().and_then(|lfs| lfs.oid.clone())))
            .collect())
    }

    /// Open a byte-range stream over a single repository file, starting at
    /// `start_byte` (inclusive), for resumable downloads (§4.3, §4.5.6).
    pub async fn download_range(
        &self,
        repo_id: &str,
        path: &str,
        start_byte: u64,
    ) -> Result<(impl Stream<Item = Result<Bytes>>, FileHead)> {
        let url = format!("{}/{repo_id}/resolve/main/{path}", self.base_url);
        let range = format!("bytes={start_byte}-");
        let resp = with_retry(&self.retry_policy, is_retriable, || async {
            let resp = self
                .authed(self.http.get(&url))
                .header(reqwest::header::RANGE, range.clone())
                .send()
                .await
                .map_err(|e| map_transport(&e))?;
            let status = resp.status();
            if status.is_success() || status.as_u16() == 206 {
                Ok(resp)
            } else {
                Err(map_status(repo_id, status))
            }
        })
        .await?;

        let head = file_head_from_response(&resp);
        let stream = resp
            .bytes_stream()
            .map_err(|e| DepotError::Transient(e.to_string()));
        Ok((stream, head))
    }

    /// Probe a single file's current size/last-modified/etag without
    /// downloading its body (`HEAD .../resolve/main/{path}`) (§4.3).
    pub async fn head(&self, repo_id: &str, path: &str) -> Result<FileHead> {
        let url = format!("{}/{repo_id}/resolve/main/{path}", self.base_url);
        with_retry(&self.retry_policy, is_retriable, || async {
            let resp = self
                .authed(self.http.head(&url))
                .send()
                .await
                .map_err(|e| map_transport(&e))?;
            if !resp.status().is_success() {
                return Err(map_status(repo_id, resp.status()));
            }
            Ok(file_head_from_response(&resp))
        })
        .await
    }
}

fn file_head_from_response(resp: &reqwest::Response) -> FileHead {
    let size = resp
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    let last_modified = resp
        .headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let etag = resp
        .headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim_matches('"').to_string());
    if last_modified.is_none() {
        warn!("hub response missing Last-Modified header");
    }
    FileHead {
        size,
        last_modified,
        etag,
    }
}

/// True when `tags` intersects the text-generation discovery set (§4.3).
pub fn is_text_generation_tags(tags: &[String]) -> bool {
    has_any_tag(tags, ModelType::TextGeneration.discovery_tags())
}

/// True when `tags` intersects the embedding discovery set (§4.3).
pub fn is_embedding_tags(tags: &[String]) -> bool {
    has_any_tag(tags, ModelType::Embedding.discovery_tags())
}

fn has_any_tag(tags: &[String], candidates: &[&str]) -> bool {
    tags.iter()
        .any(|t| candidates.iter().any(|c| c.eq_ignore_ascii_case(t)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HubSibling;

    #[test]
    fn lfs_size_supersedes_git_size() {
        let sibling = HubSibling {
            path: "model.safetensors".into(),
            size: Some(100),
            lfs: Some(crate::types::HubLfsInfo { size: 999, oid: None }),
        };
        assert_eq!(sibling.effective_size(), 999);
    }

    #[test]
    fn git_size_used_when_not_lfs_tracked() {
        let sibling = HubSibling {
            path: "config.json".into(),
            size: Some(42),
            lfs: None,
        };
        assert_eq!(sibling.effective_size(), 42);
    }

    #[test]
    fn non_lfs_files_have_no_trustworthy_hash() {
        let sibling = HubSibling {
            path: "config.json".into(),
            size: Some(42),
            lfs: None,
        };
        assert_eq!(sibling.lfs.and_then(|l| l.oid), None);
    }

    #[test]
    fn tag_classification_is_case_insensitive() {
        let tags = vec!["Text-Generation".to_string(), "pytorch".to_string()];
        assert!(is_text_generation_tags(&tags));
        assert!(!is_embedding_tags(&tags));
    }
}

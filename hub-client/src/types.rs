//! Wire shapes returned by the hub's model-listing and tree APIs (§4.3).

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One entry in a repository's file tree, as the hub reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct HubSibling {
    #[serde(rename = "rfilename")]
    pub path: String,
    /// Git blob size. Superseded by `lfs.size` when the file is LFS-tracked (§4.3).
    pub size: Option<i64>,
    pub lfs: Option<HubLfsInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubLfsInfo {
    pub size: i64,
    /// Git LFS object id: a `sha256:{hex}`-less hex digest of the file's
    /// content, used to verify a completed download (§6.5 `VerifyChecksums`).
    #[serde(default)]
    pub oid: Option<String>,
}

impl HubSibling {
    /// The size that should be trusted for this file: LFS size wins when present.
    pub fn effective_size(&self) -> i64 {
        self.lfs.as_ref().map(|l| l.size).or(self.size).unwrap_or(0)
    }
}

/// A repository as described by the hub's model metadata endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct HubModelMeta {
    #[serde(rename = "id", alias = "modelId")]
    pub repo_id: String,
    #[serde(default)]
    pub pipeline_tag: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub siblings: Vec<HubSibling>,
    #[serde(default)]
    pub downloads: i64,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub gated: serde_json::Value,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "lastModified")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl HubModelMeta {
    pub fn is_gated(&self) -> bool {
        match &self.gated {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::String(s) => s != "false",
            _ => false,
        }
    }
}

/// Sort field accepted by the listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Downloads,
    Likes,
    LastModified,
}

impl SortField {
    pub fn as_query_value(self) -> &'static str {
        match self {
            SortField::Downloads => "downloads",
            SortField::Likes => "likes",
            SortField::LastModified => "lastModified",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_query_value(self) -> &'static str {
        match self {
            SortDirection::Ascending => "1",
            SortDirection::Descending => "-1",
        }
    }
}

/// Parameters accepted by [`crate::HubClient::list_models`].
#[derive(Debug, Clone, Default)]
pub struct ListModelsQuery {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<u32>,
    pub sort: Option<SortField>,
    pub direction: Option<SortDirection>,
}

/// Outcome of a HEAD probe against a single repository file (§4.3, used by
/// the Download Manager to detect size/ETag drift before resuming).
#[derive(Debug, Clone)]
pub struct FileHead {
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

//! Gateway to the remote model hub: metadata lookup, discovery listing, and
//! resumable byte-range downloads (§4.3).

mod client;
mod error;
mod retry;
mod types;

pub use client::{is_embedding_tags, is_text_generation_tags, HubClient};
pub use retry::RetryPolicy;
pub use types::{
    FileHead, HubLfsInfo, HubModelMeta, HubSibling, ListModelsQuery, SortDirection, SortField,
};

//! Adapter Registry and Loader (C7, §4.7): the seam between persisted model
//! metadata and a ready-to-use inference backend.

mod backend;
mod loader;
mod registry;

pub use backend::{Adapter, Backend, GeneratedToken, GenerationParams, LoadParams, TokenStream};
pub use loader::Loader;
pub use registry::AdapterRegistry;

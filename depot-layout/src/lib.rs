pub mod identifier;
pub mod layout;

pub use identifier::{ensure_gguf_extension, format, parse, remove_weight_extension};
pub use layout::{derive_paths, download_state_path, ArtifactPaths};

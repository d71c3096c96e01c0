pub mod config;
pub mod error;

pub use config::{CliArgs, ServerConfig};

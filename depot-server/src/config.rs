//! Configuration for the depot server (§6.5): CLI args > env > TOML file > defaults.

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "depot-server")]
#[command(about = "Local-first model supply depot: discovery, download, catalog, and inference over HTTP")]
#[command(version)]
pub struct CliArgs {
    /// HTTP listen port.
    #[arg(long, short = 'p', default_value = "8080", env = "DEPOT_PORT")]
    pub port: u16,

    /// TOML config file, merged under CLI/env overrides.
    #[arg(long, short = 'c', default_value = "depot.toml", env = "DEPOT_CONFIG")]
    pub config: PathBuf,

    /// Where models live on disk (§6.5 `ModelsDirectory`). Defaults to an
    /// OS-appropriate local-app-data subpath ending in `/models`.
    #[arg(long, env = "DEPOT_MODELS_DIR")]
    pub models_directory: Option<PathBuf>,

    /// §6.5 `MaxConcurrentDownloads`.
    #[arg(long, env = "DEPOT_MAX_CONCURRENT_DOWNLOADS")]
    pub max_concurrent_downloads: Option<usize>,

    /// §6.5 `VerifyChecksums`.
    #[arg(long, env = "DEPOT_VERIFY_CHECKSUMS")]
    pub verify_checksums: Option<bool>,

    /// §6.5 `MinimumFreeDiskSpace`, in bytes.
    #[arg(long, env = "DEPOT_MIN_FREE_DISK_SPACE")]
    pub minimum_free_disk_space: Option<u64>,

    /// §6.5 `MaxCachedModels`.
    #[arg(long, env = "DEPOT_MAX_CACHED_MODELS")]
    pub max_cached_models: Option<usize>,

    /// §6.5 `EnableModelCaching`.
    #[arg(long, env = "DEPOT_ENABLE_MODEL_CACHING")]
    pub enable_model_caching: Option<bool>,

    /// §6.5 `DefaultTimeoutMs`.
    #[arg(long, env = "DEPOT_DEFAULT_TIMEOUT_MS")]
    pub default_timeout_ms: Option<u64>,

    /// §6.5 `MaxConcurrentOperations`, per inference engine.
    #[arg(long, env = "DEPOT_MAX_CONCURRENT_OPERATIONS")]
    pub max_concurrent_operations: Option<usize>,

    /// Bearer token for the remote hub, when the hub requires authentication.
    #[arg(long, env = "HUB_TOKEN")]
    pub hub_token: Option<String>,

    /// Log level passed to the tracing subscriber's default filter.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,
}

/// Serialized shape of an on-disk `depot.toml`, with every field optional so a
/// partial file only overrides what it names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub models_directory: Option<PathBuf>,
    pub max_concurrent_downloads: Option<usize>,
    pub verify_checksums: Option<bool>,
    pub minimum_free_disk_space: Option<u64>,
    pub max_cached_models: Option<usize>,
    pub enable_model_caching: Option<bool>,
    pub default_timeout_ms: Option<u64>,
    pub max_concurrent_operations: Option<usize>,
    pub hub_token: Option<String>,
}

impl FileConfig {
    fn from_path(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse config file: {}", path.display()))
    }
}

/// Fully resolved server configuration, ready to build [`depot_api::DepotConfig`] from.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
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

const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 2;
const DEFAULT_VERIFY_CHECKSUMS: bool = true;
const DEFAULT_MINIMUM_FREE_DISK_SPACE: u64 = 10 * 1024 * 1024 * 1024;
const DEFAULT_MAX_CACHED_MODELS: usize = 2;
const DEFAULT_ENABLE_MODEL_CACHING: bool = true;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_CONCURRENT_OPERATIONS: usize = 1;

impl ServerConfig {
    /// Priority: CLI args/env (already merged into `args` by clap) > file > defaults.
    pub fn load(args: &CliArgs) -> Result<Self> {
        let file = if args.config.exists() {
            FileConfig::from_path(&args.config)?
        } else {
            FileConfig::default()
        };

        Ok(Self {
            port: args.port,
            models_directory: args
                .models_directory
                .clone()
                .or(file.models_directory)
                .unwrap_or_else(common::platform::default_models_dir),
            max_concurrent_downloads: args
                .max_concurrent_downloads
                .or(file.max_concurrent_downloads)
                .unwrap_or(DEFAULT_MAX_CONCURRENT_DOWNLOADS),
            verify_checksums: args
                .verify_checksums
                .or(file.verify_checksums)
                .unwrap_or(DEFAULT_VERIFY_CHECKSUMS),
            minimum_free_disk_space: args
                .minimum_free_disk_space
                .or(file.minimum_free_disk_space)
                .unwrap_or(DEFAULT_MINIMUM_FREE_DISK_SPACE),
            max_cached_models: args
                .max_cached_models
                .or(file.max_cached_models)
                .unwrap_or(DEFAULT_MAX_CACHED_MODELS),
            enable_model_caching: args
                .enable_model_caching
                .or(file.enable_model_caching)
                .unwrap_or(DEFAULT_ENABLE_MODEL_CACHING),
            default_timeout_ms: args
                .default_timeout_ms
                .or(file.default_timeout_ms)
                .unwrap_or(DEFAULT_TIMEOUT_MS),
            max_concurrent_operations: args
                .max_concurrent_operations
                .or(file.max_concurrent_operations)
                .unwrap_or(DEFAULT_MAX_CONCURRENT_OPERATIONS),
            hub_token: args.hub_token.clone().or(file.hub_token),
        })
    }

    pub fn into_api_config(self) -> depot_api::DepotConfig {
        depot_api::DepotConfig {
            models_directory: self.models_directory,
            max_concurrent_downloads: self.max_concurrent_downloads,
            verify_checksums: self.verify_checksums,
            minimum_free_disk_space: self.minimum_free_disk_space,
            max_cached_models: self.max_cached_models,
            enable_model_caching: self.enable_model_caching,
            default_timeout_ms: self.default_timeout_ms,
            max_concurrent_operations: self.max_concurrent_operations,
            hub_token: self.hub_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CliArgs {
        CliArgs {
            port: 8080,
            config: PathBuf::from("nonexistent-depot.toml"),
            models_directory: None,
            max_concurrent_downloads: None,
            verify_checksums: None,
            minimum_free_disk_space: None,
            max_cached_models: None,
            enable_model_caching: None,
            default_timeout_ms: None,
            max_concurrent_operations: None,
            hub_token: None,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn defaults_match_section_6_5() {
        let config = ServerConfig::load(&args()).unwrap();
        assert_eq!(config.max_concurrent_downloads, 2);
        assert!(config.verify_checksums);
        assert_eq!(config.minimum_free_disk_space, 10 * 1024 * 1024 * 1024);
        assert_eq!(config.max_cached_models, 2);
        assert!(config.enable_model_caching);
        assert_eq!(config.default_timeout_ms, 30_000);
        assert_eq!(config.max_concurrent_operations, 1);
    }

    #[test]
    fn cli_args_override_defaults() {
        let mut a = args();
        a.max_concurrent_downloads = Some(5);
        a.verify_checksums = Some(false);
        let config = ServerConfig::load(&a).unwrap();
        assert_eq!(config.max_concurrent_downloads, 5);
        assert!(!config.verify_checksums);
    }

    #[test]
    fn loads_and_overrides_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depot.toml");
        std::fs::write(&path, "max_cached_models = 7\nhub_token = \"from-file\"\n").unwrap();

        let mut a = args();
        a.config = path;
        let config = ServerConfig::load(&a).unwrap();
        assert_eq!(config.max_cached_models, 7);
        assert_eq!(config.hub_token.as_deref(), Some("from-file"));
        // unset in file, falls back to the library default
        assert_eq!(config.max_concurrent_downloads, 2);
    }
}

//! Platform-specific utilities for locating the depot's local-app-data directory.

use std::env;
use std::path::PathBuf;

/// Default OS-appropriate local-app-data directory for the depot, ending in `/models`.
///
/// - **Windows**: `%APPDATA%\ModelDepot\models\`
/// - **macOS**: `~/Library/Application Support/ModelDepot/models\`
/// - **Linux**: `~/.local/share/ModelDepot/models\` (XDG Base Directory spec)
pub fn default_models_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        windows_base_dir().join("models")
    }
    #[cfg(target_os = "macos")]
    {
        macos_base_dir().join("models")
    }
    #[cfg(target_os = "linux")]
    {
        linux_base_dir().join("models")
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        linux_base_dir().join("models")
    }
}

#[cfg(target_os = "windows")]
#[allow(dead_code)]
fn windows_base_dir() -> PathBuf {
    if let Ok(appdata) = env::var("APPDATA") {
        PathBuf::from(appdata).join("ModelDepot")
    } else {
        PathBuf::from(".").join("ModelDepot")
    }
}

#[cfg(target_os = "macos")]
#[allow(dead_code)]
fn macos_base_dir() -> PathBuf {
    if let Some(home) = env::var_os("HOME") {
        PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join("ModelDepot")
    } else {
        PathBuf::from(".").join("ModelDepot")
    }
}

#[cfg(any(target_os = "linux", not(any(target_os = "windows", target_os = "macos"))))]
#[allow(dead_code)]
fn linux_base_dir() -> PathBuf {
    if let Ok(xdg_data_home) = env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data_home).join("ModelDepot");
    }
    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".local").join("share").join("ModelDepot");
    }
    PathBuf::from(".").join("ModelDepot")
}

/// Ensure a directory exists, creating it (and parents) if necessary.
pub fn ensure_dir(path: &std::path::Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_models_dir_ends_in_models() {
        let dir = default_models_dir();
        assert_eq!(dir.file_name().unwrap(), "models");
    }
}

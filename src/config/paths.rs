//! Platform-specific configuration and data paths.

use crate::config::Config;
use crate::constants::{APP_NAME, DEFAULT_DB_FILE};
use crate::error::{Error, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the configuration directory for the current platform.
///
/// - Linux: `~/.config/fieldlog/`
/// - macOS: `~/Library/Application Support/fieldlog/`
/// - Windows: `%APPDATA%\fieldlog\`
pub fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(Error::ConfigDirNotFound)
}

/// Get the full path to the config file.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the data directory holding the detection store.
pub fn data_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(Error::DataDirNotFound)
}

/// Resolve the database path: configured path, else the platform default.
pub fn database_path(config: &Config) -> Result<PathBuf> {
    match &config.store.path {
        Some(path) => Ok(path.clone()),
        None => Ok(data_dir()?.join(DEFAULT_DB_FILE)),
    }
}

//! TOML configuration file loading
//!
//! Supports `~/.config/devcap/config.toml` as a persistent config source.
//! Every field is optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::CacheKind;
use crate::endpoint::Endpoint;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// `user:password` API key
    pub api_key: Option<String>,

    /// Remote endpoints; replaces the default pool when present
    pub servers: Option<Vec<Endpoint>>,

    /// Ask for gzip-compressed responses
    pub compression: Option<bool>,

    pub connection_timeout_ms: Option<u64>,

    pub read_timeout_ms: Option<u64>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Seconds between cache counter reports
    pub report_interval_secs: Option<u64>,

    /// Cache store selection
    #[serde(default)]
    pub cache: CacheFileConfig,
}

/// `[cache]` table
#[derive(Debug, Default, Deserialize)]
pub struct CacheFileConfig {
    /// `memory`, `cookie` or `none`
    pub store: Option<CacheKind>,

    /// Entry lifetime in seconds
    pub ttl_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    config_file_path().map_or_else(ConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file_from(path: &Path) -> ConfigFile {
    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/devcap/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("devcap").join("config.toml"))
}

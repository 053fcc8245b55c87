// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration: built-in defaults, an optional JSON file, and CLI overrides.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::http::DEFAULT_USER_AGENT;

const APP_DIR: &str = "podkeeper";
const CONFIG_FILE: &str = "config.json";
const STORE_FILE: &str = "podkeeper.json";
const DOWNLOADS_DIR: &str = "downloads";

pub const DEFAULT_EPISODES_TO_KEEP: u32 = 30;
pub const DEFAULT_MAX_CONCURRENT_FEEDS: usize = 3;
const MAX_CONCURRENT_FEEDS_LIMIT: usize = 32;

/// Values read from the config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Root directory for downloaded episodes.
    pub download_dir: Option<PathBuf>,
    /// Location of the JSON feed store.
    pub store_path: Option<PathBuf>,
    /// Retention count given to newly added feeds.
    pub episodes_to_keep: Option<u32>,
    /// Feeds processed at once by update and download (1..=32).
    pub max_concurrent_feeds: Option<usize>,
    /// User-Agent header for feed and media requests.
    pub user_agent: Option<String>,
}

impl FileConfig {
    /// Parse and validate file contents. `path` is only used for error messages.
    pub fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: FileConfig =
            serde_json::from_str(raw).map_err(|e| ConfigError::ParseFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(keep) = self.episodes_to_keep
            && keep == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "episodes_to_keep",
                reason: "must be at least 1".to_string(),
            });
        }

        if let Some(workers) = self.max_concurrent_feeds
            && !(1..=MAX_CONCURRENT_FEEDS_LIMIT).contains(&workers)
        {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_feeds",
                reason: format!("{workers} is outside 1..={MAX_CONCURRENT_FEEDS_LIMIT}"),
            });
        }

        if let Some(agent) = &self.user_agent
            && agent.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue {
                field: "user_agent",
                reason: "cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}

/// Settings given on the command line; they win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub download_dir: Option<PathBuf>,
    pub store_path: Option<PathBuf>,
}

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub download_dir: PathBuf,
    pub store_path: PathBuf,
    pub episodes_to_keep: u32,
    pub max_concurrent_feeds: usize,
    pub user_agent: String,
}

impl Config {
    /// Defaults rooted at `data_root`
    pub fn with_data_root(data_root: &Path) -> Self {
        Self {
            download_dir: data_root.join(DOWNLOADS_DIR),
            store_path: data_root.join(STORE_FILE),
            episodes_to_keep: DEFAULT_EPISODES_TO_KEEP,
            max_concurrent_feeds: DEFAULT_MAX_CONCURRENT_FEEDS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Load configuration from the environment.
    ///
    /// An explicit `config_path` must exist. Without one, the default
    /// location is used when a file is present there.
    pub fn load(
        config_path: Option<&Path>,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) => Some(load_file_config(path)?),
            None => match resolve_default_config_path() {
                Some(path) if path.exists() => Some(load_file_config(&path)?),
                _ => None,
            },
        };

        Self::resolve(file, overrides, resolve_data_root())
    }

    /// Merge sources, highest priority first: overrides, file, defaults.
    pub fn resolve(
        file: Option<FileConfig>,
        overrides: ConfigOverrides,
        data_root: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();
        file.validate()?;

        let download_dir = overrides
            .download_dir
            .or(file.download_dir)
            .or_else(|| data_root.as_ref().map(|root| root.join(DOWNLOADS_DIR)))
            .ok_or(ConfigError::NoDataDir)?;

        let store_path = overrides
            .store_path
            .or(file.store_path)
            .or_else(|| data_root.as_ref().map(|root| root.join(STORE_FILE)))
            .ok_or(ConfigError::NoDataDir)?;

        Ok(Self {
            download_dir,
            store_path,
            episodes_to_keep: file.episodes_to_keep.unwrap_or(DEFAULT_EPISODES_TO_KEEP),
            max_concurrent_feeds: file
                .max_concurrent_feeds
                .unwrap_or(DEFAULT_MAX_CONCURRENT_FEEDS),
            user_agent: file
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!(path = %path.display(), "Loaded config file");
    FileConfig::parse(&raw, path)
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/podkeeper/config.json`
/// 2. `$HOME/.config/podkeeper/config.json`
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_path_from(
        env_var_non_empty_os("XDG_CONFIG_HOME"),
        env_var_non_empty_os("HOME"),
    )
}

/// Resolves the default data root.
///
/// Priority:
/// 1. `$XDG_DATA_HOME/podkeeper`
/// 2. `$HOME/.local/share/podkeeper`
pub fn resolve_data_root() -> Option<PathBuf> {
    data_root_from(
        env_var_non_empty_os("XDG_DATA_HOME"),
        env_var_non_empty_os("HOME"),
    )
}

fn config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    let base = match xdg_config_home {
        Some(xdg) => PathBuf::from(xdg),
        None => PathBuf::from(home?).join(".config"),
    };
    Some(base.join(APP_DIR).join(CONFIG_FILE))
}

fn data_root_from(xdg_data_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    let base = match xdg_data_home {
        Some(xdg) => PathBuf::from(xdg),
        None => PathBuf::from(home?).join(".local").join("share"),
    };
    Some(base.join(APP_DIR))
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

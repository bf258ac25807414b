//! Run configuration loaded from `config.json`, with `.env`/environment
//! overrides for the endpoint settings.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;
use crate::util::env::{env_flag, env_opt, env_parse_opt};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROGRESS_EVERY: u64 = 100;

/// How `created_at` is written into the catalog `date` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateMode {
    /// Keep only the calendar date (`YYYY-MM-DD`).
    #[default]
    Truncate,
    /// Send the raw export timestamp unchanged.
    Full,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub stash_url: String,
    #[serde(default)]
    pub stash_api_key: String,
    #[serde(default)]
    pub data_directory: Option<PathBuf>,
    #[serde(default)]
    pub overwrite_existing_metadata: bool,
    #[serde(default)]
    pub import_artist: bool,
    #[serde(default)]
    pub import_creation_date: bool,
    #[serde(default)]
    pub import_description: bool,
    #[serde(default)]
    pub import_tags: bool,
    #[serde(default)]
    pub import_url: bool,
    #[serde(default)]
    pub date_mode: DateMode,
    /// 0 disables the client timeout.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_progress_every() -> u64 {
    DEFAULT_PROGRESS_EVERY
}

/// Per-field switches consumed by the reconciler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub overwrite: bool,
    pub artist: bool,
    pub date: bool,
    pub details: bool,
    pub tags: bool,
    pub url: bool,
    pub date_mode: DateMode,
}

impl SyncConfig {
    /// Read and parse the config file, then apply environment overrides.
    /// Does not check the data directory; see [`SyncConfig::validate_for_sync`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg = Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.apply_env_overrides();
        if cfg.stash_url.trim().is_empty() {
            return Err(ConfigError::Missing("stash_url"));
        }
        info!(config = %path.display(), stash_url = %cfg.stash_url, "configuration loaded");
        Ok(cfg)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(url) = env_opt("STASH_URL") {
            self.stash_url = url;
        }
        if let Some(key) = env_opt("STASH_API_KEY") {
            self.stash_api_key = key;
        }
        if let Some(secs) = env_parse_opt::<u64>("STASH_TIMEOUT_SECS") {
            self.request_timeout_secs = secs;
        }
        self.overwrite_existing_metadata =
            env_flag("STASH_OVERWRITE", self.overwrite_existing_metadata);
    }

    /// The sync command needs an existing data directory.
    pub fn validate_for_sync(&self) -> Result<&Path, ConfigError> {
        match self.data_directory.as_deref() {
            Some(dir) if dir.is_dir() => Ok(dir),
            Some(dir) => Err(ConfigError::DataDirectory(dir.to_path_buf())),
            None => Err(ConfigError::Missing("data_directory")),
        }
    }

    pub fn graphql_endpoint(&self) -> String {
        format!("{}/graphql", self.stash_url.trim_end_matches('/'))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            overwrite: self.overwrite_existing_metadata,
            artist: self.import_artist,
            date: self.import_creation_date,
            details: self.import_description,
            tags: self.import_tags,
            url: self.import_url,
            date_mode: self.date_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_original_config_shape() {
        let cfg = SyncConfig::from_json(
            r#"{
                "stash_url": "http://localhost:9999/",
                "stash_api_key": "k",
                "data_directory": "/srv/gallery",
                "overwrite_existing_metadata": false,
                "import_artist": true,
                "import_creation_date": true,
                "import_description": false,
                "import_tags": true,
                "import_url": true
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.graphql_endpoint(), "http://localhost:9999/graphql");
        assert_eq!(cfg.date_mode, DateMode::Truncate);
        assert_eq!(cfg.request_timeout(), Some(Duration::from_secs(30)));
        let opts = cfg.import_options();
        assert!(opts.artist && opts.date && opts.tags && opts.url);
        assert!(!opts.details && !opts.overwrite);
    }

    #[test]
    fn zero_timeout_disables_it() {
        let cfg = SyncConfig::from_json(
            r#"{"stash_url": "http://x", "request_timeout_secs": 0, "date_mode": "full"}"#,
        )
        .unwrap();
        assert_eq!(cfg.request_timeout(), None);
        assert_eq!(cfg.date_mode, DateMode::Full);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = SyncConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn data_directory_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = SyncConfig::from_json(r#"{"stash_url": "http://x"}"#).unwrap();
        assert!(matches!(
            cfg.validate_for_sync(),
            Err(ConfigError::Missing("data_directory"))
        ));
        cfg.data_directory = Some(dir.path().join("nope"));
        assert!(matches!(
            cfg.validate_for_sync(),
            Err(ConfigError::DataDirectory(_))
        ));
        cfg.data_directory = Some(dir.path().to_path_buf());
        assert!(cfg.validate_for_sync().is_ok());
    }
}

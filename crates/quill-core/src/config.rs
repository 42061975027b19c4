//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/quill/config.toml)
//! 3. Environment variables (QUILL_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::remote::{HttpApiConfig, RetryPolicy};

/// Environment variable prefix
const ENV_PREFIX: &str = "QUILL";

const DEFAULT_API_URL: &str = "https://api.notion.com/v1";
const DEFAULT_API_VERSION: &str = "2022-06-28";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root of the local record collection
    #[serde(default = "default_vault_dir")]
    pub vault_dir: PathBuf,

    /// Vault-relative folder that holds one folder per mirrored collection
    #[serde(default = "default_sync_folder")]
    pub sync_folder: PathBuf,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Integration token; required to sync
    #[serde(default)]
    pub api_token: Option<String>,

    /// Minimum spacing between request starts, in milliseconds
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,

    /// Attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Write logs here instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vault_dir: default_vault_dir(),
            sync_folder: default_sync_folder(),
            api_url: default_api_url(),
            api_version: default_api_version(),
            api_token: None,
            request_interval_ms: default_request_interval_ms(),
            max_attempts: default_max_attempts(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (QUILL_VAULT_DIR, QUILL_SYNC_FOLDER,
    ///    QUILL_API_URL, QUILL_API_TOKEN)
    /// 2. Config file (~/.config/quill/config.toml or QUILL_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load from an explicit path when one was given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_VAULT_DIR", ENV_PREFIX)) {
            self.vault_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_SYNC_FOLDER", ENV_PREFIX)) {
            self.sync_folder = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_API_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.api_url = val;
            }
        }

        // An empty token clears the configured one
        if let Ok(val) = std::env::var(format!("{}_API_TOKEN", ENV_PREFIX)) {
            self.api_token = if val.is_empty() { None } else { Some(val) };
        }
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with QUILL_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quill")
            .join("config.toml")
    }

    /// Retry and pacing settings for the remote client
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            min_interval: Duration::from_millis(self.request_interval_ms),
            max_attempts: self.max_attempts.max(1),
            ..RetryPolicy::default()
        }
    }

    /// Connection settings for the HTTP API
    pub fn http_config(&self) -> Result<HttpApiConfig> {
        let Some(token) = self.api_token.as_deref().filter(|t| !t.is_empty()) else {
            bail!(
                "API token not configured. Set it with:\n  \
                 quill config set api_token <token>\n\
                 or export {}_API_TOKEN",
                ENV_PREFIX
            );
        };

        Ok(HttpApiConfig {
            base_url: self.api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            api_version: self.api_version.clone(),
        })
    }
}

fn default_vault_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Quill")
}

fn default_sync_folder() -> PathBuf {
    PathBuf::from("Remote")
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_request_interval_ms() -> u64 {
    340
}

fn default_max_attempts() -> u32 {
    5
}

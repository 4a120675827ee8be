//! Uploader configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `$XDG_CONFIG_HOME/clipvault/uploader.toml`, falling back to
//!   `~/.config/clipvault/uploader.toml`
//! - Windows: `%APPDATA%/clipvault/uploader.toml`
//!
//! `CLIPVAULT_API_URL` and `CLIPVAULT_TOKEN` override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clipvault_protocol::constants::{API_REQUEST_TIMEOUT, DEFAULT_MAX_RETRIES, MIN_STORAGE_TIMEOUT};
use clipvault_transfer::DEFAULT_PART_SIZE;
use clipvault_upload_api::RetryPolicy;
use clipvault_uploader::UploadOptions;
use serde::{Deserialize, Serialize};

pub const ENV_API_URL: &str = "CLIPVAULT_API_URL";
pub const ENV_TOKEN: &str = "CLIPVAULT_TOKEN";

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    /// Base URL of the platform API.
    pub api_base_url: String,

    /// Bearer token for the platform API. Never sent to storage.
    pub auth_token: String,

    /// Bytes per part.
    pub part_size: u64,

    /// PUT attempts per part, including the first.
    pub max_retries: u32,

    /// Backoff unit in seconds; attempt `n` waits `unit * 2^n`.
    pub retry_base_delay_secs: u64,

    pub api_timeout_secs: u64,

    /// Raised to ten minutes if lower.
    pub storage_timeout_secs: u64,

    /// Parts in flight at once.
    pub concurrency: usize,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".into(),
            auth_token: String::new(),
            part_size: DEFAULT_PART_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_secs: 1,
            api_timeout_secs: API_REQUEST_TIMEOUT.as_secs(),
            storage_timeout_secs: MIN_STORAGE_TIMEOUT.as_secs(),
            concurrency: 1,
        }
    }
}

impl UploaderConfig {
    /// Loads `path`, or the default location when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an
    /// error. Environment overrides are applied either way.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let p = config_path()?;
                if p.exists() {
                    Self::from_file(&p)?
                } else {
                    tracing::debug!(path = %p.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Applies environment overrides; empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.is_empty()) {
            self.auth_token = token;
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs.max(1))
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs).max(MIN_STORAGE_TIMEOUT)
    }

    pub fn auth_token(&self) -> Option<&str> {
        Some(self.auth_token.as_str()).filter(|t| !t.is_empty())
    }

    pub fn upload_options(&self, content_type: Option<String>) -> UploadOptions {
        UploadOptions {
            part_size: self.part_size,
            retry: RetryPolicy {
                max_attempts: self.max_retries,
                backoff_unit: Duration::from_secs(self.retry_base_delay_secs),
            },
            concurrency: self.concurrency.max(1),
            content_type,
        }
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").context("APPDATA is not set")?;
        Ok(PathBuf::from(appdata).join("clipvault").join("uploader.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let base = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => PathBuf::from(std::env::var("HOME").context("HOME is not set")?).join(".config"),
        };
        Ok(base.join("clipvault").join("uploader.toml"))
    }
}

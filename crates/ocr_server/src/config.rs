//! Server configuration loaded from a JSON file.
//!
//! Every field has a default so a partial (or missing) file still yields a
//! usable configuration. The API key may also come from the environment.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ocr_engine::wire::{flexible_bool, ModelEntry};
use serde::Deserialize;

/// Environment variable that overrides `api_key` from the file.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_UPSTREAM_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::Read { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_key: String,
    pub models: Vec<ModelEntry>,
    pub default_model: String,
    pub system_prompt: String,
    #[serde(deserialize_with = "flexible_bool")]
    pub enable_reasoning_by_default: bool,
    pub http_referer: String,
    pub x_title: String,
    pub bind: String,
    pub upstream_url: String,
    pub request_timeout_secs: u64,
    pub history_limit: usize,
    /// Sessions whose history is kept before the idlest is evicted.
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            models: Vec::new(),
            default_model: String::new(),
            system_prompt: String::new(),
            enable_reasoning_by_default: true,
            http_referer: "https://aiocr.app".to_string(),
            x_title: "AI OCR Tool".to_string(),
            bind: "0.0.0.0:1203".to_string(),
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            request_timeout_secs: 60,
            history_limit: 50,
            max_sessions: 1000,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `OPENROUTER_API_KEY` when it is set and non-empty.
    pub fn with_env_overrides(self) -> Self {
        self.with_api_key_override(std::env::var(API_KEY_ENV).ok())
    }

    fn with_api_key_override(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|key| !key.trim().is_empty()) {
            self.api_key = key.trim().to_string();
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("api_key", &redact(&self.api_key))
            .field("models", &self.models)
            .field("default_model", &self.default_model)
            .field("system_prompt", &self.system_prompt)
            .field(
                "enable_reasoning_by_default",
                &self.enable_reasoning_by_default,
            )
            .field("http_referer", &self.http_referer)
            .field("x_title", &self.x_title)
            .field("bind", &self.bind)
            .field("upstream_url", &self.upstream_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("history_limit", &self.history_limit)
            .field("max_sessions", &self.max_sessions)
            .finish()
    }
}

/// Keeps a short prefix as a hint and masks the rest.
fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let hint: String = secret.chars().take(4).collect();
    if secret.chars().count() > 8 {
        format!("{hint}***")
    } else {
        "***".to_string()
    }
}

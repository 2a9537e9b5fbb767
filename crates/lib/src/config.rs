//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.painel/config.json`) and environment.
//! Every section is optional; a missing file yields the defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Backend location and auth header settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Cache freshness window.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Page workaround and per-conversation message loading.
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Metrics collection fetches.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Where login credentials are persisted (default `credentials.json` next to the config file).
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
}

/// REST backend base URL, token, and transport timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL of the backend (default "http://localhost:8002").
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Static API token. Overridden by PAINEL_API_TOKEN env; when both are unset the persisted login is used.
    pub token: Option<String>,

    /// Scheme placed before the token in the Authorization header (default "Token").
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,

    /// Per-request timeout in seconds (default 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Seconds a cached collection stays fresh (default 300).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

/// Page-echo workaround settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationConfig {
    /// Page size used while accumulating the full conversation list (default 100).
    #[serde(default = "default_large_page")]
    pub full_fetch_page_size: u32,

    /// Hard ceiling on pages requested while accumulating conversations (default 20).
    #[serde(default = "default_max_full_fetch_pages")]
    pub max_full_fetch_pages: u32,

    /// Page size used when loading every message of one conversation (default 100).
    #[serde(default = "default_large_page")]
    pub message_page_size: u32,

    /// Hard ceiling on pages requested for one conversation's messages (default 100).
    #[serde(default = "default_max_message_pages")]
    pub max_message_pages: u32,

    /// Fill each listed conversation's message count with an extra request (default true).
    #[serde(default = "default_true")]
    pub count_messages: bool,

    /// Maximum concurrent message-count requests (default 8).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsConfig {
    /// Page size for metrics collection fetches (default 100).
    #[serde(default = "default_large_page")]
    pub page_size: u32,

    /// Maximum pages in flight at once after the first page (default 8).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_base_url() -> String {
    "http://localhost:8002".to_string()
}

fn default_auth_scheme() -> String {
    "Token".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_large_page() -> u32 {
    100
}

fn default_max_full_fetch_pages() -> u32 {
    20
}

fn default_max_message_pages() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    8
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            auth_scheme: default_auth_scheme(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            full_fetch_page_size: default_large_page(),
            max_full_fetch_pages: default_max_full_fetch_pages(),
            message_page_size: default_large_page(),
            max_message_pages: default_max_message_pages(),
            count_messages: default_true(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            page_size: default_large_page(),
            concurrency: default_concurrency(),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve the backend base URL: env PAINEL_BASE_URL overrides config. Trailing slashes are trimmed.
pub fn resolve_base_url(config: &Config) -> String {
    non_empty_env("PAINEL_BASE_URL")
        .unwrap_or_else(|| config.backend.base_url.trim().to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Resolve a static API token: env PAINEL_API_TOKEN overrides config.
pub fn resolve_api_token(config: &Config) -> Option<String> {
    non_empty_env("PAINEL_API_TOKEN").or_else(|| {
        config
            .backend
            .token
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("PAINEL_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".painel").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Resolve where credentials live: `credentialsPath` if set (relative paths resolved against the
/// config file's parent), otherwise `credentials.json` beside the config file.
pub fn resolve_credentials_path(config: &Config, config_path: &Path) -> PathBuf {
    let config_parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match &config.credentials_path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                config_parent.join(p)
            }
        }
        _ => config_parent.join("credentials.json"),
    }
}

/// Load config from the given path, or the default path (or PAINEL_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used (for resolving the credentials file).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

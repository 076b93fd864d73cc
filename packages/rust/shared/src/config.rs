//! Application configuration for NewsDigest.
//!
//! User config lives at `~/.newsdigest/newsdigest.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file, only the env var names that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NewsDigestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "newsdigest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".newsdigest";

// ---------------------------------------------------------------------------
// SourceKind
// ---------------------------------------------------------------------------

/// The closed set of news backends a run can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Public news-feed search, no credentials.
    #[default]
    Feed,
    /// Keyword search API sorted by recency, requires an API key.
    KeywordApi,
}

impl SourceKind {
    /// Stable name used in logs and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::KeywordApi => "keyword-api",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Config structs (matching newsdigest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Run defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Language model settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Keyword search API settings.
    #[serde(default)]
    pub news_api: NewsApiConfig,

    /// News feed settings.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Enrichment pacing.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Backend used when the CLI does not pick one.
    #[serde(default)]
    pub source: SourceKind,

    /// Number of articles per digest.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            limit: default_limit(),
        }
    }
}

fn default_limit() -> u32 {
    5
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_llm_key_env(),
            base_url: default_llm_base_url(),
            model: default_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_llm_timeout() -> u64 {
    60
}

/// `[news_api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsApiConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_news_key_env")]
    pub api_key_env: String,

    /// API origin.
    #[serde(default = "default_news_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for NewsApiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_news_key_env(),
            base_url: default_news_base_url(),
            timeout_secs: default_http_timeout(),
        }
    }
}

fn default_news_key_env() -> String {
    "NEWS_API_KEY".into()
}
fn default_news_base_url() -> String {
    "https://newsapi.org".into()
}
fn default_http_timeout() -> u64 {
    15
}

/// `[feed]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed search origin.
    #[serde(default = "default_feed_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_base_url(),
            timeout_secs: default_http_timeout(),
        }
    }
}

fn default_feed_base_url() -> String {
    "https://news.google.com".into()
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Articles enriched at the same time.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Minimum ms between the starts of two article enrichments.
    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            min_interval_ms: default_min_interval(),
        }
    }
}

fn default_max_concurrent() -> usize {
    1
}
fn default_min_interval() -> u64 {
    100
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.newsdigest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| NewsDigestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.newsdigest/newsdigest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NewsDigestError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        NewsDigestError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NewsDigestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NewsDigestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NewsDigestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read an API key from the named env var. Empty values count as missing.
pub fn read_api_key(var_name: &str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Return the language-model API key, or a config error naming the env var.
pub fn validate_llm_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    read_api_key(var_name).ok_or_else(|| {
        NewsDigestError::config(format!(
            "language model API key not found. Set the {var_name} environment variable."
        ))
    })
}

//! Application configuration for redraft.
//!
//! User config lives at `~/.redraft/redraft.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RedraftError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "redraft.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".redraft";

// ---------------------------------------------------------------------------
// Config structs (matching redraft.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Article store backend settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Render sidecar settings.
    #[serde(default)]
    pub render: RenderConfig,

    /// Search provider settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the article store API.
    #[serde(default = "default_store_base_url")]
    pub base_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_base_url(),
        }
    }
}

fn default_store_base_url() -> String {
    "http://localhost:8000/api".into()
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Base URL of the headless-browser render sidecar.
    #[serde(default = "default_render_service_url")]
    pub service_url: String,

    /// Fetch mode: "render" (sidecar with static fallback) or "static" (HTTP GET only).
    #[serde(default = "default_render_mode")]
    pub mode: String,

    /// Navigation timeout for a single render, in seconds.
    #[serde(default = "default_render_timeout")]
    pub timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            service_url: default_render_service_url(),
            mode: default_render_mode(),
            timeout_secs: default_render_timeout(),
        }
    }
}

fn default_render_service_url() -> String {
    "http://localhost:3000".into()
}
fn default_render_mode() -> String {
    "render".into()
}
fn default_render_timeout() -> u64 {
    60
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the SerpAPI key (never store the key itself).
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,

    /// Search request timeout in seconds.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_api_key_env(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_api_key_env() -> String {
    "SERPAPI_KEY".into()
}
fn default_search_timeout() -> u64 {
    30
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,

    /// Chat-completions API base URL.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model used for enhancement synthesis.
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    /// Maximum output tokens.
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_llm_api_key_env(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".into()
}
fn default_llm_temperature() -> f32 {
    0.7
}
fn default_llm_max_tokens() -> u32 {
    2000
}
fn default_llm_timeout() -> u64 {
    120
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.redraft/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RedraftError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.redraft/redraft.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| RedraftError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| RedraftError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RedraftError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RedraftError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RedraftError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key named by `var_name`, treating empty values as unset.
pub fn resolve_api_key(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

/// Check that the LLM API key env var is set and non-empty.
pub fn validate_llm_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.llm.api_key_env;
    match resolve_api_key(var_name) {
        Some(_) => Ok(()),
        None => Err(RedraftError::llm_config(format!(
            "LLM API key not found. Set the {var_name} environment variable."
        ))),
    }
}

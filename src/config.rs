use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Smallest thinking budget the reasoning provider accepts.
pub const MIN_THINKING_BUDGET: u32 = 1024;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Credential and transport settings shared by both providers.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_key_env")]
    pub key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries for connection failures only; timeouts are reported, not retried.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key_env: default_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Chat-completion provider (no reasoning exposure).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Model variant used when web search is on. It rejects `temperature`.
    #[serde(default = "default_search_model")]
    pub search_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_search_context_size")]
    pub search_context_size: String,
    #[serde(default)]
    pub location: ApproximateLocation,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_base_url(),
            model: default_chat_model(),
            search_model: default_search_model(),
            temperature: default_temperature(),
            search_context_size: default_search_context_size(),
            location: ApproximateLocation::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApproximateLocation {
    pub country: String,
    pub city: String,
    pub region: String,
}

impl Default for ApproximateLocation {
    fn default() -> Self {
        Self {
            country: "RU".into(),
            city: "Moscow".into(),
            region: "Moscow".into(),
        }
    }
}

/// Extended-reasoning provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default = "default_reasoning_base_url")]
    pub base_url: String,
    #[serde(default = "default_reasoning_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: u32,
    #[serde(default = "default_anthropic_version")]
    pub anthropic_version: String,
    #[serde(default = "default_web_search_tool")]
    pub web_search_tool: String,
    #[serde(default = "default_web_search_max_uses")]
    pub web_search_max_uses: u32,
    /// Alternate ids for the same model family, tried in order when the
    /// primary id is rejected.
    #[serde(default = "default_fallback_models")]
    pub fallback_models: Vec<String>,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            base_url: default_reasoning_base_url(),
            model: default_reasoning_model(),
            max_tokens: default_max_tokens(),
            thinking_budget: default_thinking_budget(),
            anthropic_version: default_anthropic_version(),
            web_search_tool: default_web_search_tool(),
            web_search_max_uses: default_web_search_max_uses(),
            fallback_models: default_fallback_models(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
    #[serde(default = "default_true")]
    pub persist: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            history_file: default_history_file(),
            persist: true,
        }
    }
}

// Defaults
fn default_key_env() -> String {
    "PROXYAPI_KEY".into()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    2
}
fn default_chat_base_url() -> String {
    "https://openai.api.proxyapi.ru/v1".into()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".into()
}
fn default_search_model() -> String {
    "gpt-4o-mini-search-preview".into()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_search_context_size() -> String {
    "medium".into()
}
fn default_reasoning_base_url() -> String {
    "https://api.proxyapi.ru/anthropic".into()
}
fn default_reasoning_model() -> String {
    "claude-sonnet-4-5-20250929".into()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_thinking_budget() -> u32 {
    MIN_THINKING_BUDGET
}
fn default_anthropic_version() -> String {
    "2023-06-01".into()
}
fn default_web_search_tool() -> String {
    "web_search_20250305".into()
}
fn default_web_search_max_uses() -> u32 {
    5
}
fn default_fallback_models() -> Vec<String> {
    vec![
        "claude-sonnet-4-5-20250929".into(),
        "claude-sonnet-4-5-20250514".into(),
        "claude-sonnet-4-5".into(),
        "claude-3-7-sonnet-20250219".into(),
        "claude-3-5-sonnet-20241022".into(),
    ]
}
fn default_system_prompt() -> String {
    "You are a helpful assistant. Conduct the dialogue in Russian. Answer thoroughly and to the point.".into()
}
fn default_history_file() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".dualchat").join("history.json")
}
fn default_true() -> bool {
    true
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| Error::config(format!("Failed to parse config: {e}")))
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.timeout_secs == 0 {
            return Err(Error::config("api.timeout_secs must be greater than zero"));
        }
        if self.chat.model.is_empty() || self.chat.search_model.is_empty() {
            return Err(Error::config("chat.model and chat.search_model must be set"));
        }
        if self.reasoning.model.is_empty() {
            return Err(Error::config("reasoning.model must be set"));
        }
        if self.reasoning.thinking_budget < MIN_THINKING_BUDGET {
            return Err(Error::config(format!(
                "reasoning.thinking_budget must be at least {MIN_THINKING_BUDGET}"
            )));
        }
        if self.reasoning.max_tokens <= self.reasoning.thinking_budget {
            return Err(Error::config(
                "reasoning.max_tokens must exceed reasoning.thinking_budget",
            ));
        }
        Ok(())
    }

    /// Read the bearer credential from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api.key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(Error::MissingCredential(self.api.key_env.clone())),
        }
    }
}

//! Configuration system (layered: code > env > TOML file).

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ThreadError};

/// Model used for conversation rounds unless a prompt overrides it.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
/// Model used by the intent step.
pub const DEFAULT_THINKING_MODEL: &str = "gpt-4o-mini";

const API_KEY_VARS: [(&str, &str); 2] = [
    ("OPENAI_API_KEY", "openai"),
    ("ANTHROPIC_API_KEY", "anthropic"),
];

const BASE_URL_VARS: [(&str, &str); 2] = [
    ("OPENAI_BASE_URL", "openai"),
    ("ANTHROPIC_BASE_URL", "anthropic"),
];

/// Engine-wide settings, resolved once and handed to the runner.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Consult the chat rate limiter before each prompt.
    pub use_rate_limits: bool,
    /// Run the intent step instead of the keyword fallback.
    pub use_thinking: bool,
    pub default_model: String,
    pub thinking_model: String,
    /// Messages of history sent to the model each round.
    pub history_limit: usize,
    /// Tool calls dispatched concurrently per batch.
    pub tool_batch_size: usize,
    pub max_tokens: u32,
    /// Rounds allowed per turn before it is aborted.
    pub max_rounds: usize,
    pub api_keys: HashMap<String, String>,
    pub base_urls: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_rate_limits: false,
            use_thinking: false,
            default_model: DEFAULT_MODEL.to_string(),
            thinking_model: DEFAULT_THINKING_MODEL.to_string(),
            history_limit: 25,
            tool_batch_size: 4,
            max_tokens: 8192,
            max_rounds: 20,
            api_keys: HashMap::new(),
            base_urls: HashMap::new(),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers: Vec<&str> = self.api_keys.keys().map(String::as_str).collect();
        providers.sort_unstable();
        f.debug_struct("EngineConfig")
            .field("use_rate_limits", &self.use_rate_limits)
            .field("use_thinking", &self.use_thinking)
            .field("default_model", &self.default_model)
            .field("thinking_model", &self.thinking_model)
            .field("history_limit", &self.history_limit)
            .field("tool_batch_size", &self.tool_batch_size)
            .field("max_tokens", &self.max_tokens)
            .field("max_rounds", &self.max_rounds)
            .field("api_keys", &providers)
            .field("base_urls", &self.base_urls)
            .finish()
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with environment variables (`.env` is loaded first
    /// if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source)
            .map_err(|e| ThreadError::Configuration(format!("invalid config: {e}")))
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            ThreadError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let _ = dotenvy::dotenv();
        Ok(Self::from_toml_str(&source)?.with_env(|key| std::env::var(key).ok()))
    }

    /// Overlay values from a variable lookup.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("USE_RATE_LIMITS") {
            self.use_rate_limits = parse_flag(&v);
        }
        if let Some(v) = lookup("USE_THINKING") {
            self.use_thinking = parse_flag(&v);
        }
        if let Some(v) = lookup("THREADLOOP_MODEL").filter(|v| !v.is_empty()) {
            self.default_model = v;
        }
        for (var, provider) in API_KEY_VARS {
            if let Some(key) = lookup(var).filter(|v| !v.is_empty()) {
                self.api_keys.insert(provider.to_string(), key);
            }
        }
        for (var, provider) in BASE_URL_VARS {
            if let Some(url) = lookup(var).filter(|v| !v.is_empty()) {
                self.base_urls.insert(provider.to_string(), url);
            }
        }
        self
    }

    pub fn with_api_key(mut self, provider: &str, key: impl Into<String>) -> Self {
        self.api_keys.insert(provider.to_string(), key.into());
        self
    }

    pub fn with_base_url(mut self, provider: &str, url: impl Into<String>) -> Self {
        self.base_urls.insert(provider.to_string(), url.into());
        self
    }

    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.api_keys.get(provider).map(String::as_str)
    }

    pub fn base_url(&self, provider: &str) -> Option<&str> {
        self.base_urls.get(provider).map(String::as_str)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Per-invocation options for a thread prompt.
#[derive(Debug, Clone, Default, Builder, PartialEq, Eq)]
pub struct PromptOptions {
    /// Overrides the configured default model.
    #[builder(into)]
    pub model: Option<String>,
    /// Stream assistant tokens as they arrive.
    #[builder(default)]
    pub stream: bool,
    /// Reply even when the intent step would stay silent.
    #[builder(default)]
    pub force_reply: bool,
    /// The prompting user is another bot; the turn is dropped.
    #[builder(default)]
    pub user_is_bot: bool,
    /// Emit an update when each tool call starts.
    #[builder(default)]
    pub announce_tool_starts: bool,
}

impl PromptOptions {
    /// Model for this prompt, falling back to the configured default.
    pub fn model_or<'a>(&'a self, config: &'a EngineConfig) -> &'a str {
        self.model.as_deref().unwrap_or(&config.default_model)
    }
}

//! Configuration loading, validation, and management for Keepsake.
//!
//! Loads configuration from `~/.keepsake/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.keepsake/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model provider endpoint and model
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Debounce window and batch size ceiling
    #[serde(default)]
    pub batch: BatchConfig,

    /// Reasoning loop bounds and canned replies
    #[serde(default)]
    pub agent: AgentConfig,

    /// Model call retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Chat bot identity (used for invite links)
    #[serde(default)]
    pub bot: BotConfig,

    /// Log output
    #[serde(default)]
    pub log: LogConfig,
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("batch", &self.batch)
            .field("agent", &self.agent)
            .field("retry", &self.retry)
            .field("bot", &self.bot)
            .field("log", &self.log)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_api_url() -> String {
    "https://api.anthropic.com/v1".into()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Quiet period after the latest fragment before a batch flushes
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Flush immediately once a sender has this many pending fragments
    #[serde(default = "default_max_fragments")]
    pub max_fragments: usize,

    /// Joins fragment texts in the compiled batch
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_window_ms() -> u64 {
    12_500
}
fn default_max_fragments() -> usize {
    20
}
fn default_separator() -> String {
    "\n".into()
}

impl BatchConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_fragments: default_max_fragments(),
            separator: default_separator(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Past messages included in the prompt
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Reply when the iteration cap is hit
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,

    /// Reply when the model answers with nothing
    #[serde(default = "default_clarify_message")]
    pub clarify_message: String,

    /// Reply when the model cannot be reached or the turn cannot start
    #[serde(default = "default_apology_message")]
    pub apology_message: String,
}

fn default_max_iterations() -> u32 {
    5
}
fn default_history_limit() -> usize {
    10
}
fn default_fallback_message() -> String {
    "I couldn't finish that in one go. Could you tell me again, maybe in smaller steps?".into()
}
fn default_clarify_message() -> String {
    "I'm not sure what you want to do. Can you please clarify?".into()
}
fn default_apology_message() -> String {
    "Sorry, I encountered an error processing your messages. Please try again.".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            history_limit: default_history_limit(),
            fallback_message: default_fallback_message(),
            clarify_message: default_clarify_message(),
            apology_message: default_apology_message(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per model call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Upper bound on a single model call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    8_000
}
fn default_request_timeout_secs() -> u64 {
    90
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_bot_username")]
    pub username: String,
}

fn default_bot_username() -> String {
    "memories_bot".into()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self { username: default_bot_username() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl AppConfig {
    /// Load configuration from the default location.
    ///
    /// Environment overrides:
    /// - `KEEPSAKE_API_KEY`, then `ANTHROPIC_API_KEY` (when no key in file)
    /// - `KEEPSAKE_MODEL`
    /// - `KEEPSAKE_BATCH_WINDOW_MS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            self.api_key = std::env::var("KEEPSAKE_API_KEY")
                .ok()
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("KEEPSAKE_MODEL") {
            self.provider.model = model;
        }

        if let Ok(window) = std::env::var("KEEPSAKE_BATCH_WINDOW_MS") {
            self.batch.window_ms = window.parse().map_err(|_| {
                ConfigError::ValidationError(format!("KEEPSAKE_BATCH_WINDOW_MS is not a number: {window}"))
            })?;
        }

        self.validate()
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".keepsake")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.temperature < 0.0 || self.provider.temperature > 1.0 {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 1.0".into(),
            ));
        }

        if self.batch.window_ms == 0 {
            return Err(ConfigError::ValidationError("batch.window_ms must be > 0".into()));
        }

        if self.batch.max_fragments == 0 {
            return Err(ConfigError::ValidationError("batch.max_fragments must be > 0".into()));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError("agent.max_iterations must be > 0".into()));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError("retry.max_attempts must be > 0".into()));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::ValidationError(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }

        if self.bot.username.trim().is_empty() {
            return Err(ConfigError::ValidationError("bot.username must not be empty".into()));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderConfig::default(),
            batch: BatchConfig::default(),
            agent: AgentConfig::default(),
            retry: RetryConfig::default(),
            bot: BotConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch.window(), Duration::from_millis(12_500));
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.history_limit, 10);
        assert_eq!(config.bot.username, "memories_bot");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.batch.window_ms, config.batch.window_ms);
        assert_eq!(parsed.provider.model, config.provider.model);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[batch]\nwindow_ms = 2000\n\n[agent]\nmax_iterations = 3").unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.batch.window_ms, 2000);
        assert_eq!(config.batch.max_fragments, 20);
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.retry.initial_backoff_ms = 10_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unparseable_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[batch\nwindow_ms = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.batch.window_ms, 12_500);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-ant-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-ant-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("window_ms = 12500"));
        assert!(toml_str.contains("memories_bot"));
    }
}

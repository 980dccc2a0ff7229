//! Configuration loading, validation, and management for thriftbot.
//!
//! Loads configuration from `~/.thriftbot/config.toml` with environment
//! variable overrides. Every numeric knob has a default, so a missing file
//! yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.thriftbot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the LLM provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default max tokens per LLM response ("normal" tier)
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Where session records and notes are stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Provider connection settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Model ladder
    #[serde(default)]
    pub models: ModelConfig,

    /// Daily token budget
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Session store settings
    #[serde(default)]
    pub session: SessionConfig,

    /// History compression settings
    #[serde(default)]
    pub compression: CompressionConfig,

    /// Orchestration and background tick settings
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_max_tokens() -> u32 {
    2048
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
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
            .field("default_max_tokens", &self.default_max_tokens)
            .field("default_temperature", &self.default_temperature)
            .field("data_dir", &self.data_dir)
            .field("provider", &self.provider)
            .field("models", &self.models)
            .field("budget", &self.budget)
            .field("session", &self.session)
            .field("compression", &self.compression)
            .field("agent", &self.agent)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-attempt timeout for one LLM call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for transient failures (0 = single attempt)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    1000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model used while the budget is healthy
    #[serde(default = "default_model")]
    pub default: String,

    /// Cheap model used near the end of the daily budget
    #[serde(default = "default_fallback_model")]
    pub fallback: String,

    /// Upgrade target for requests with attachments or tool use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capable: Option<String>,

    /// Model used to summarize old history
    #[serde(default = "default_fallback_model")]
    pub summarizer: String,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_fallback_model() -> String {
    "claude-3-5-haiku-20241022".into()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default: default_model(),
            fallback: default_fallback_model(),
            capable: None,
            summarizer: default_fallback_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Daily token ceiling, reset at local midnight
    #[serde(default = "default_daily_tokens")]
    pub daily_tokens: u64,
}

fn default_daily_tokens() -> u64 {
    200_000
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_tokens: default_daily_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum stored messages per conversation
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Maximum sessions kept in memory
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Debounce window for write-back
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_max_history() -> usize {
    40
}
fn default_cache_size() -> usize {
    20
}
fn default_debounce_ms() -> u64 {
    1000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            cache_size: default_cache_size(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl SessionConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Compress once a session holds more than this many messages
    #[serde(default = "default_compression_threshold")]
    pub threshold: usize,

    /// Most recent messages kept verbatim after compression
    #[serde(default = "default_compression_keep")]
    pub keep: usize,
}

fn default_compression_threshold() -> usize {
    25
}
fn default_compression_keep() -> usize {
    12
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            threshold: default_compression_threshold(),
            keep: default_compression_keep(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on LLM rounds per message
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// Interval of the background tick (mood, budget reset, reminders)
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Whether tools are declared to the LLM
    #[serde(default = "default_true")]
    pub tools_enabled: bool,

    /// Persona text sent as the system prompt
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_max_tool_rounds() -> u32 {
    15
}
fn default_tick_interval_secs() -> u64 {
    60
}
fn default_system_prompt() -> String {
    "You are a friendly personal assistant running on a small home server. \
     Keep answers short and practical."
        .into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            tick_interval_secs: default_tick_interval_secs(),
            tools_enabled: true,
            system_prompt: default_system_prompt(),
        }
    }
}

impl AgentConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.thriftbot/config.toml).
    ///
    /// Environment overrides:
    /// - `THRIFTBOT_API_KEY`, then `ANTHROPIC_API_KEY` (only if no key in file)
    /// - `THRIFTBOT_MODEL`
    /// - `THRIFTBOT_DATA_DIR`
    /// - `THRIFTBOT_DAILY_TOKENS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
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

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            self.api_key = lookup("THRIFTBOT_API_KEY").or_else(|| lookup("ANTHROPIC_API_KEY"));
        }

        if let Some(model) = lookup("THRIFTBOT_MODEL") {
            self.models.default = model;
        }

        if let Some(dir) = lookup("THRIFTBOT_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(raw) = lookup("THRIFTBOT_DAILY_TOKENS") {
            self.budget.daily_tokens = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "THRIFTBOT_DAILY_TOKENS must be a positive integer, got '{raw}'"
                ))
            })?;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".thriftbot")
    }

    /// Directory holding session records and notes.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("data"))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.budget.daily_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "budget.daily_tokens must be > 0".into(),
            ));
        }

        if self.compression.keep >= self.compression.threshold {
            return Err(ConfigError::ValidationError(
                "compression.keep must be smaller than compression.threshold".into(),
            ));
        }

        if self.session.cache_size == 0 || self.session.max_history == 0 {
            return Err(ConfigError::ValidationError(
                "session.cache_size and session.max_history must be >= 1".into(),
            ));
        }

        if self.agent.max_tool_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_rounds must be >= 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_max_tokens: default_max_tokens(),
            default_temperature: default_temperature(),
            data_dir: None,
            provider: ProviderConfig::default(),
            models: ModelConfig::default(),
            budget: BudgetConfig::default(),
            session: SessionConfig::default(),
            compression: CompressionConfig::default(),
            agent: AgentConfig::default(),
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
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.cache_size, 20);
        assert_eq!(config.session.debounce_ms, 1000);
        assert_eq!(config.compression.threshold, 25);
        assert_eq!(config.compression.keep, 12);
        assert_eq!(config.agent.max_tool_rounds, 15);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.models.default, config.models.default);
        assert_eq!(parsed.budget.daily_tokens, config.budget.daily_tokens);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn keep_must_be_below_threshold() {
        let mut config = AppConfig::default();
        config.compression.keep = 30;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn zero_budget_rejected() {
        let mut config = AppConfig::default();
        config.budget.daily_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.session.max_history, 40);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[budget]
daily_tokens = 5000

[session]
debounce_ms = 250
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.budget.daily_tokens, 5000);
        assert_eq!(config.session.debounce_ms, 250);
        assert_eq!(config.session.cache_size, 20);
        assert_eq!(config.agent.tick_interval_secs, 60);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "budget = [not toml").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ANTHROPIC_API_KEY", "sk-ant-test"),
            ("THRIFTBOT_MODEL", "claude-opus-4-20250514"),
            ("THRIFTBOT_DAILY_TOKENS", "1234"),
            ("THRIFTBOT_DATA_DIR", "/var/lib/thriftbot"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("sk-ant-test"));
        assert_eq!(config.models.default, "claude-opus-4-20250514");
        assert_eq!(config.budget.daily_tokens, 1234);
        assert_eq!(config.data_dir(), PathBuf::from("/var/lib/thriftbot"));
    }

    #[test]
    fn env_bad_budget_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env(|k| (k == "THRIFTBOT_DAILY_TOKENS").then(|| "lots".into()));
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-ant-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-ant-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("daily_tokens"));
        assert!(toml_str.contains("max_tool_rounds"));
    }
}

//! Configuration for MANOR.
//!
//! Maps directly to `manor.toml`. Every field has a default, so an empty file
//! (or no file) is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::retry::MAX_ATTEMPTS;

/// Top-level MANOR configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManorConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Completion-service settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Turn pipeline settings.
    #[serde(default)]
    pub turns: TurnsConfig,
    /// World-state store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

impl ManorConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ManorError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::ManorError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log format: `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Completion-service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: `openai`, `ollama` or `none`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Base URL of the provider.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Model used for planning, NPC actions and narration.
    #[serde(default = "default_planner_model")]
    pub planner_model: String,
    /// Model used for perception, summaries, sounds and facts.
    #[serde(default = "default_light_model")]
    pub light_model: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Transport retries per request.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Override for every template's temperature.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Directory of prompt overrides (`*.toml`).
    #[serde(default)]
    pub prompt_dir: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            planner_model: default_planner_model(),
            light_model: default_light_model(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            temperature: None,
            prompt_dir: None,
        }
    }
}

/// Turn pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnsConfig {
    /// Execution attempts per intent. Clamped to `1..=2`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// History entries kept for planner context.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Whether turns generate sounds.
    #[serde(default = "default_true")]
    pub sensory_events: bool,
    /// Whether perception uses the semantic filter.
    #[serde(default = "default_true")]
    pub semantic_perception: bool,
}

impl TurnsConfig {
    /// `max_attempts` clamped to the retry bound.
    #[must_use]
    pub fn effective_max_attempts(&self) -> usize {
        self.max_attempts.clamp(1, MAX_ATTEMPTS)
    }
}

impl Default for TurnsConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            history_size: default_history_size(),
            sensory_events: true,
            semantic_perception: true,
        }
    }
}

/// World-state store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Command spawning an MCP world-state server. Empty: in-memory store.
    #[serde(default)]
    pub command: String,
    /// Arguments for `command`.
    #[serde(default)]
    pub args: Vec<String>,
    /// JSON snapshot seeding the in-memory store.
    #[serde(default)]
    pub world_file: Option<String>,
}

impl StoreConfig {
    /// Whether an external server is configured.
    #[must_use]
    pub fn is_external(&self) -> bool {
        !self.command.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Default value functions (used by serde)
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_planner_model() -> String {
    "gpt-4o".to_string()
}
fn default_light_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_max_retries() -> u32 {
    2
}
fn default_max_attempts() -> usize {
    MAX_ATTEMPTS
}
fn default_history_size() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn empty_toml_is_all_defaults() {
        let config = ManorConfig::from_toml("").expect("empty config");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.turns.max_attempts, 2);
        assert_eq!(config.turns.history_size, 10);
        assert!(config.turns.sensory_events);
        assert!(!config.store.is_external());
    }

    #[test]
    fn retry_bound_is_never_raised() {
        let config = ManorConfig::from_toml("[turns]\nmax_attempts = 7\n").expect("config");
        assert_eq!(config.turns.effective_max_attempts(), 2);
        let config = ManorConfig::from_toml("[turns]\nmax_attempts = 0\n").expect("config");
        assert_eq!(config.turns.effective_max_attempts(), 1);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "[llm]\nprovider = \"ollama\"\nbase_url = \"http://localhost:11434\"\n\n[store]\ncommand = \"python\"\nargs = [\"server.py\"]"
        )
        .expect("write");
        let config = ManorConfig::from_file(file.path()).expect("config file");
        assert_eq!(config.llm.provider, "ollama");
        assert!(config.store.is_external());
        assert_eq!(config.store.args, ["server.py"]);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = ManorConfig::from_toml("[turns\n").expect_err("broken");
        assert!(err.to_string().starts_with("Configuration error"));
    }
}

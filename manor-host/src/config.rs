//! Layered configuration and runtime construction.
//!
//! Precedence, lowest first:
//!
//! 1. built-in defaults ([`ManorConfig::default`])
//! 2. the TOML file passed with `--config`
//! 3. `MANOR__SECTION__KEY` environment variables
//!
//! e.g. `MANOR__TURNS__HISTORY_SIZE=20` or `MANOR__LLM__PROVIDER=ollama`.

use std::path::Path;
use std::sync::Arc;

use ::config::{Config, Environment, File, FileFormat};
use manor_core::config::{LlmConfig, StoreConfig};
use manor_core::{InMemoryWorldStore, ManorConfig, StoreSnapshot, WorldStore};
use manor_llm::{LlmClient, LlmProvider, PromptEngine};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{HostError, Result};
use crate::mcp::McpWorldStore;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "MANOR";

/// Load configuration from defaults, `path` and the process environment.
///
/// # Errors
///
/// [`HostError::Config`] if a layer cannot be read or the merged result does
/// not deserialize.
pub fn load(path: Option<&Path>) -> Result<ManorConfig> {
    layered(path, Environment::with_prefix(ENV_PREFIX).separator("__"))
}

fn layered(path: Option<&Path>, env: Environment) -> Result<ManorConfig> {
    let mut builder = Config::builder().add_source(Config::try_from(&ManorConfig::default())?);
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }
    let config = builder
        .add_source(env.try_parsing(true))
        .build()?
        .try_deserialize::<ManorConfig>()?;
    Ok(config)
}

/// Force the offline setup: no completion provider, in-memory store.
pub fn apply_offline(config: &mut ManorConfig) {
    config.llm.provider = "none".into();
    config.store.command.clear();
    config.store.args.clear();
}

/// Build the completion client `llm` describes.
///
/// # Errors
///
/// [`HostError::UnknownProvider`], or [`HostError::MissingApiKey`] for an
/// OpenAI-compatible provider whose key variable is unset.
pub fn llm_client(llm: &LlmConfig) -> Result<LlmClient> {
    let provider = match llm.provider.to_ascii_lowercase().as_str() {
        "none" => return Ok(LlmClient::none()),
        "ollama" => LlmProvider::Ollama { base_url: llm.base_url.clone() },
        "openai" => {
            let api_key = std::env::var(&llm.api_key_env)
                .map_err(|_| HostError::MissingApiKey(llm.api_key_env.clone()))?;
            LlmProvider::OpenAiCompatible { base_url: llm.base_url.clone(), api_key }
        }
        other => return Err(HostError::UnknownProvider(other.to_string())),
    };

    let mut client = LlmClient::new(provider, &llm.light_model, &llm.planner_model, llm.max_retries)
        .with_request_timeout(llm.request_timeout_ms);
    if let Some(temperature) = llm.temperature {
        client = client.with_temperature(temperature);
    }
    info!(provider = %llm.provider, planner = %llm.planner_model, light = %llm.light_model, "completion client ready");
    Ok(client)
}

/// Built-in prompts, overridden from `llm.prompt_dir` when set.
///
/// # Errors
///
/// [`HostError::Llm`] if the override directory cannot be loaded.
pub fn prompt_engine(llm: &LlmConfig) -> Result<PromptEngine> {
    match &llm.prompt_dir {
        Some(dir) => Ok(PromptEngine::builtin_with_overrides(dir)?),
        None => Ok(PromptEngine::builtin()),
    }
}

/// The seed snapshot for the in-memory store.
///
/// # Errors
///
/// [`HostError::WorldFile`] if the file cannot be read or parsed.
pub fn seed_snapshot(path: Option<&Path>) -> Result<StoreSnapshot> {
    let Some(path) = path else {
        return Ok(StoreSnapshot::manor());
    };
    let world_file = |reason: String| HostError::WorldFile { path: path.display().to_string(), reason };
    let text = std::fs::read_to_string(path).map_err(|e| world_file(e.to_string()))?;
    StoreSnapshot::from_json(&text).map_err(|e| world_file(e.to_string()))
}

/// Connect the configured world store.
///
/// An external server when `store.command` is set, otherwise an in-memory
/// store seeded from `world` (falling back to `store.world_file`).
///
/// # Errors
///
/// [`HostError::Store`] if the server cannot be started or initialized, or
/// [`HostError::WorldFile`] for a bad seed file.
pub async fn world_store(
    store: &StoreConfig,
    world: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<Arc<dyn WorldStore>> {
    if store.is_external() {
        let server = McpWorldStore::spawn(&store.command, &store.args, cancel).await?;
        info!(command = %store.command, "connected to world-state server");
        return Ok(Arc::new(server));
    }
    let seed = world.or(store.world_file.as_deref().map(Path::new));
    let snapshot = seed_snapshot(seed)?;
    info!(locations = snapshot.locations.len(), npcs = snapshot.npcs.len(), "using in-memory world store");
    Ok(Arc::new(InMemoryWorldStore::new(snapshot)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write as _;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        Environment::with_prefix(ENV_PREFIX).separator("__").source(Some(source))
    }

    #[test]
    fn defaults_survive_an_empty_stack() {
        let config = layered(None, env(&[])).expect("defaults");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.turns.max_attempts, 2);
        assert!(config.llm.temperature.is_none());
        assert!(!config.store.is_external());
    }

    #[test]
    fn file_then_environment_take_precedence() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().expect("tempfile");
        writeln!(file, "[llm]\nprovider = \"ollama\"\nlight_model = \"llama3.2\"\n\n[turns]\nhistory_size = 4").expect("write");

        let config = layered(
            Some(file.path()),
            env(&[("MANOR__TURNS__HISTORY_SIZE", "20"), ("MANOR__GENERAL__LOG_FORMAT", "json")]),
        )
        .expect("layered config");

        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.light_model, "llama3.2");
        assert_eq!(config.llm.planner_model, "gpt-4o");
        assert_eq!(config.turns.history_size, 20);
        assert_eq!(config.general.log_format, "json");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = layered(Some(Path::new("/nonexistent/manor.toml")), env(&[])).expect_err("missing file");
        assert!(matches!(err, HostError::Config(_)));
    }

    #[test]
    fn offline_disables_provider_and_server() {
        let mut config = ManorConfig::default();
        config.store.command = "python".into();
        apply_offline(&mut config);
        assert_eq!(config.llm.provider, "none");
        assert!(!config.store.is_external());
        let client = llm_client(&config.llm).expect("none provider");
        assert!(!manor_llm::CompletionBackend::is_available(&client));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let llm = LlmConfig { provider: "carrier-pigeon".into(), ..LlmConfig::default() };
        assert!(matches!(llm_client(&llm), Err(HostError::UnknownProvider(_))));
    }

    #[test]
    fn seed_snapshot_reads_a_world_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        let manor = serde_json::to_string(&StoreSnapshot::manor()).expect("serialize");
        file.write_all(manor.as_bytes()).expect("write");
        assert_eq!(seed_snapshot(Some(file.path())).expect("seed"), StoreSnapshot::manor());

        let err = seed_snapshot(Some(Path::new("/nonexistent/world.json"))).expect_err("missing");
        assert!(err.to_string().starts_with("world file /nonexistent/world.json"));
    }
}

/// `load_config` module: loads the static YAML config and injects endpoints and
/// secrets from the environment.
///
/// This is the only place where the user-supplied YAML is parsed into the
/// strongly-typed [`AppConfig`] from `recording-sync-core`.
///
/// # Environment
/// - `GRAPHQL_URL` overrides `graphql.endpoint`.
/// - The Gemini key is the first of `GENAI_API_KEY`, `GEMINI_API_KEY`,
///   `GOOGLE_API_KEY`, `API_KEY` that is set. It stays `None` when none is;
///   commands that need it fail when they build the client.
/// - The MongoDB URI is `MONGODB_URI`, then `MONGO_URI`, then the local default.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{anyhow, Result};
use recording_sync_core::config::{AppConfig, DEFAULT_MONGO_URI};
use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

pub const GRAPHQL_URL_ENV: &str = "GRAPHQL_URL";
pub const AI_KEY_ENVS: &[&str] = &["GENAI_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];
pub const MONGO_URI_ENVS: &[&str] = &["MONGODB_URI", "MONGO_URI"];

/// Loads a static YAML config file (no secrets) and injects env vars for secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            debug!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let mut config = parse_config(&config_content)?;
    apply_env(&mut config);
    config.trace_loaded();
    Ok(config)
}

/// Parse YAML text. An empty document yields the defaults.
pub fn parse_config(content: &str) -> Result<AppConfig> {
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    match serde_yaml::from_str::<AppConfig>(content) {
        Ok(conf) => {
            debug!("Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, "Failed to parse config YAML");
            Err(anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Overlay endpoint and secrets from the process environment.
pub fn apply_env(config: &mut AppConfig) {
    if let Some(url) = first_env(&[GRAPHQL_URL_ENV]) {
        info!(endpoint = %url, "GraphQL endpoint overridden from environment");
        config.graphql.endpoint = url;
    }

    config.ai.api_key = first_env(AI_KEY_ENVS);
    if config.ai.api_key.is_none() {
        debug!(vars = ?AI_KEY_ENVS, "No Gemini API key in environment");
    }

    config.store.uri = first_env(MONGO_URI_ENVS).unwrap_or_else(|| DEFAULT_MONGO_URI.to_string());
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

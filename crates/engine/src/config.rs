use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use tether_registry::{default_manifest_path, manifest_path_from_env};
use tether_types::ExecutionContext;
use tether_util::expand_tilde;
use tracing::debug;

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "TETHER_CONFIG_PATH";

/// Runtime settings for the gateway and its backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub manifest_path: Option<PathBuf>,
    /// Base URL for operations whose binding carries none
    pub base_url: Option<String>,
    /// Upper bound for every backend call
    pub timeout_ms: u64,
    /// List payloads longer than this are cut; zero disables limiting
    pub max_response_items: usize,
    /// Environment variable holding the bearer token
    pub token_env: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            manifest_path: None,
            base_url: None,
            timeout_ms: 30_000,
            max_response_items: 50,
            token_env: "TETHER_API_TOKEN".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from the default location; a missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = default_config_path();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).with_context(|| format!("read config {}", path.display()))?;
        let config = serde_json::from_str(&content).with_context(|| format!("parse config {}", path.display()))?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `TETHER_MANIFEST_PATH`, then the configured path, then the default location.
    pub fn resolved_manifest_path(&self) -> PathBuf {
        manifest_path_from_env()
            .or_else(|| {
                self.manifest_path
                    .as_ref()
                    .map(|path| expand_tilde(&path.to_string_lossy()))
            })
            .unwrap_or_else(default_manifest_path)
    }

    /// Execution context carrying the bearer token from `token_env`, if set.
    pub fn execution_context(&self) -> ExecutionContext {
        match env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => ExecutionContext::bearer(token.trim()),
            _ => ExecutionContext::new(),
        }
    }
}

/// Get the default path for the configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tether")
        .join("config.json")
}

use std::{env, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use tether_types::CatalogManifest;
use tether_util::expand_tilde;
use tracing::debug;

/// Environment variable overriding the catalogue manifest location.
pub const MANIFEST_PATH_ENV: &str = "TETHER_MANIFEST_PATH";

/// Manifest path from `TETHER_MANIFEST_PATH`, when set and non-blank.
pub fn manifest_path_from_env() -> Option<PathBuf> {
    env::var(MANIFEST_PATH_ENV)
        .ok()
        .filter(|path| !path.trim().is_empty())
        .map(|path| expand_tilde(&path))
}

/// Get the default path for the catalogue manifest.
pub fn default_manifest_path() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tether")
        .join("manifest.json")
}

/// Read a manifest file. `.yaml`/`.yml` files are parsed as YAML, anything else as JSON.
pub fn load_manifest(path: &Path) -> Result<CatalogManifest> {
    let content = std::fs::read_to_string(path).with_context(|| format!("read manifest {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("yaml") || extension.eq_ignore_ascii_case("yml"));
    let manifest: CatalogManifest = if is_yaml {
        serde_yaml::from_str(&content).with_context(|| format!("parse YAML manifest {}", path.display()))?
    } else {
        serde_json::from_str(&content).with_context(|| format!("parse JSON manifest {}", path.display()))?
    };
    debug!(
        path = %path.display(),
        operations = manifest.operations.len(),
        rules = manifest.rules.len(),
        intents = manifest.intents.len(),
        "manifest loaded"
    );
    Ok(manifest)
}

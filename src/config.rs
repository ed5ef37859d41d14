use anyhow::{Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::Path;

use crate::models::DEFAULT_DOCUMENT_VERSION;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScanConfig {
    /// Extra document patterns on top of the built-in naming conventions.
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_version")]
    pub default_version: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            default_version: default_version(),
        }
    }
}

fn default_version() -> String {
    DEFAULT_DOCUMENT_VERSION.to_string()
}

impl Config {
    /// Configuration used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    for pattern in config
        .scan
        .include_globs
        .iter()
        .chain(&config.scan.exclude_globs)
    {
        Glob::new(pattern).with_context(|| format!("Invalid glob in [scan]: '{}'", pattern))?;
    }

    if config.documents.default_version.trim().is_empty() {
        anyhow::bail!("documents.default_version must not be empty");
    }

    Ok(config)
}

/// Load `path` if given, else `fallback` if it exists, else defaults.
pub fn resolve_config(path: Option<&Path>, fallback: Option<&Path>) -> Result<Config> {
    match (path, fallback) {
        (Some(p), _) => load_config(p),
        (None, Some(f)) if f.is_file() => load_config(f),
        _ => Ok(Config::minimal()),
    }
}

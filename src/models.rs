//! Core data models used throughout the context registry.
//!
//! These types are serialized verbatim into `registry.yml`, so field names
//! follow the on-disk shape (`last_synced`, `target_checksum`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Registry file format version written into `meta.version`.
pub const REGISTRY_VERSION: &str = "1.0.0";

/// Document version assumed when the metadata block omits one.
pub const DEFAULT_DOCUMENT_VERSION: &str = "1.0.0";

/// Where a document lives relative to the code it describes.
///
/// Orthogonal to project-vs-global registry location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Companion file next to code: `<name>.ctx.md` or `ctx.md`.
    Local,
    /// Organized under the dedicated contexts subtree.
    #[default]
    Project,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Project => "project",
        }
    }
}

/// Minimal summary of a document, required for an entry to be valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Preview {
    pub what: String,
    pub keywords: Vec<String>,
}

impl Preview {
    pub fn is_valid(&self) -> bool {
        !self.what.trim().is_empty() && !self.keywords.is_empty()
    }
}

/// One tracked context document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub source: String,
    /// Exact path, glob, or folder prefix. `None` means standalone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_checksum: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub preview: Preview,
    #[serde(default)]
    pub scope: Scope,
}

impl ContextEntry {
    pub fn is_bound(&self) -> bool {
        self.target.is_some()
    }

    pub fn category(&self) -> &'static str {
        if self.is_bound() {
            "bound"
        } else {
            "standalone"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMeta {
    pub version: String,
    #[serde(default)]
    pub last_synced: Option<DateTime<Utc>>,
}

impl Default for RegistryMeta {
    fn default() -> Self {
        Self {
            version: REGISTRY_VERSION.to_string(),
            last_synced: None,
        }
    }
}

/// An extra discovery pattern with a human description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextPath {
    pub path: String,
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub context_paths: Vec<ContextPath>,
}

/// Per-context summary cached in the global index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedContext {
    pub path: String,
    pub what: String,
    pub keywords: Vec<String>,
}

/// Snapshot of one project's registry, cached in the global registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIndexEntry {
    pub path: String,
    pub last_synced: DateTime<Utc>,
    pub context_count: usize,
    #[serde(default)]
    pub contexts: Vec<IndexedContext>,
}

/// A registry file: project-scoped or global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Registry {
    #[serde(default)]
    pub meta: RegistryMeta,
    #[serde(default)]
    pub contexts: BTreeMap<String, ContextEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<BTreeMap<String, ProjectIndexEntry>>,
}

impl Registry {
    /// Extra discovery patterns declared under `settings.context_paths`.
    pub fn context_path_patterns(&self) -> Vec<String> {
        self.settings
            .as_ref()
            .map(|s| s.context_paths.iter().map(|p| p.path.clone()).collect())
            .unwrap_or_default()
    }

    /// Summaries for the global index.
    pub fn indexed_contexts(&self) -> Vec<IndexedContext> {
        self.contexts
            .iter()
            .map(|(id, entry)| IndexedContext {
                path: id.clone(),
                what: entry.preview.what.clone(),
                keywords: entry.preview.keywords.clone(),
            })
            .collect()
    }
}

//! Registry store: the on-disk record of tracked context documents.
//!
//! Two registries coexist, with the same YAML shape:
//!
//! ```text
//! <project>/.ctx/registry.yml          project registry (found by upward search)
//! <project>/.ctx/contexts/             project contexts subtree
//! <home>/.ctx-global/registry.yml      global registry (fixed location)
//! <home>/.ctx-global/contexts/         global contexts subtree
//! ```
//!
//! Document identifiers are `/`-separated paths relative to the registry's
//! base: the project root, or the global directory.
//!
//! Every write is a whole-file read-modify-write with no locking. Two `ctx`
//! processes writing the same registry at once can lose updates (the last
//! writer wins).

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::error::{ContextError, Result};
use crate::models::{ContextPath, ProjectIndexEntry, Registry, Settings};

pub const PROJECT_DIR: &str = ".ctx";
pub const GLOBAL_DIR: &str = ".ctx-global";
pub const REGISTRY_FILE: &str = "registry.yml";
pub const CONTEXTS_DIR: &str = "contexts";
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    Project,
    Global,
}

impl RegistryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryKind::Project => "project",
            RegistryKind::Global => "global",
        }
    }
}

/// Locates and reads/writes one registry file.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    kind: RegistryKind,
    base: PathBuf,
}

impl RegistryStore {
    /// Registry rooted at a project working tree.
    pub fn project(root: &Path) -> Self {
        Self {
            kind: RegistryKind::Project,
            base: root.to_path_buf(),
        }
    }

    /// Registry under the user's home directory.
    pub fn global(home: &Path) -> Self {
        Self {
            kind: RegistryKind::Global,
            base: home.join(GLOBAL_DIR),
        }
    }

    pub fn kind(&self) -> RegistryKind {
        self.kind
    }

    /// Directory that document identifiers are relative to.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory holding `registry.yml`.
    pub fn registry_dir(&self) -> PathBuf {
        match self.kind {
            RegistryKind::Project => self.base.join(PROJECT_DIR),
            RegistryKind::Global => self.base.clone(),
        }
    }

    pub fn registry_path(&self) -> PathBuf {
        self.registry_dir().join(REGISTRY_FILE)
    }

    pub fn contexts_dir(&self) -> PathBuf {
        self.registry_dir().join(CONTEXTS_DIR)
    }

    /// Identifier prefix of the contexts subtree (`.ctx/contexts` or `contexts`).
    pub fn contexts_prefix(&self) -> String {
        match self.kind {
            RegistryKind::Project => format!("{}/{}", PROJECT_DIR, CONTEXTS_DIR),
            RegistryKind::Global => CONTEXTS_DIR.to_string(),
        }
    }

    pub fn document_path(&self, id: &str) -> PathBuf {
        self.base.join(id)
    }

    /// Identifier for an on-disk document path, if it lies under the base.
    ///
    /// The path is normalized lexically first. A `..` that would climb above
    /// the base yields `None`, so an identifier never names a file outside it.
    pub fn document_id(&self, path: &Path) -> Option<String> {
        let rel = if path.is_absolute() {
            path.strip_prefix(&self.base).ok()?
        } else {
            path
        };
        let mut parts: Vec<String> = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => {
                    parts.push(part.to_string_lossy().replace('\\', "/"));
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    parts.pop()?;
                }
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }

    pub fn exists(&self) -> bool {
        self.registry_path().is_file()
    }

    fn not_initialized(&self) -> ContextError {
        match self.kind {
            RegistryKind::Project => ContextError::NotInitialized,
            RegistryKind::Global => ContextError::GlobalNotInitialized,
        }
    }

    /// Read the registry. Missing or unparsable files read as empty.
    pub async fn load(&self) -> Registry {
        let path = self.registry_path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "registry not readable, using empty");
                return Registry::default();
            }
        };
        match serde_yaml::from_str::<Registry>(&content) {
            Ok(reg) => reg,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "registry unparsable, treating as empty");
                Registry::default()
            }
        }
    }

    /// Read the registry, failing if it was never initialized.
    pub async fn load_required(&self) -> Result<Registry> {
        if !self.exists() {
            return Err(self.not_initialized());
        }
        Ok(self.load().await)
    }

    /// Write the registry, stamping `meta.last_synced`.
    ///
    /// Optional sections are materialized as empty collections.
    pub async fn save(&self, registry: &mut Registry) -> Result<()> {
        registry.meta.last_synced = Some(Utc::now());
        if registry.settings.is_none() {
            registry.settings = Some(Settings::default());
        }
        if self.kind == RegistryKind::Global && registry.index.is_none() {
            registry.index = Some(BTreeMap::new());
        }

        let dir = self.registry_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ContextError::io(&dir, e))?;

        let path = self.registry_path();
        let yaml = serde_yaml::to_string(registry)
            .map_err(|e| ContextError::parse(path.display().to_string(), e))?;

        let tmp = path.with_extension("yml.tmp");
        tokio::fs::write(&tmp, yaml)
            .await
            .map_err(|e| ContextError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| ContextError::io(&path, e))?;
        Ok(())
    }

    /// Create an empty registry and the contexts directory.
    ///
    /// Returns `false` without touching anything if the registry exists.
    pub async fn init(&self) -> Result<bool> {
        if self.exists() {
            return Ok(false);
        }
        let contexts = self.contexts_dir();
        tokio::fs::create_dir_all(&contexts)
            .await
            .map_err(|e| ContextError::io(&contexts, e))?;

        let mut registry = Registry {
            settings: Some(self.default_settings()),
            ..Registry::default()
        };
        self.save(&mut registry).await?;
        Ok(true)
    }

    pub fn default_settings(&self) -> Settings {
        Settings {
            context_paths: vec![ContextPath {
                path: format!("{}/**/*.md", self.contexts_prefix()),
                purpose: format!("{} contexts", self.kind.as_str()),
            }],
        }
    }
}

/// Walk from `start` upward to the first directory holding a project registry.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(PROJECT_DIR).join(REGISTRY_FILE).is_file() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Key used for a project in the global index.
pub fn project_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| root.display().to_string())
}

/// Replace one project's snapshot in the global index.
pub fn update_index(global: &mut Registry, root: &Path, project: &Registry) {
    let snapshot = ProjectIndexEntry {
        path: root.display().to_string(),
        last_synced: project.meta.last_synced.unwrap_or_else(Utc::now),
        context_count: project.contexts.len(),
        contexts: project.indexed_contexts(),
    };
    global
        .index
        .get_or_insert_with(BTreeMap::new)
        .insert(project_name(root), snapshot);
}

/// Outcome of rebuilding the global index.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexRebuild {
    pub refreshed: Vec<String>,
    pub dropped: Vec<String>,
}

/// Rebuild every index snapshot by re-reading each project's own registry.
///
/// Projects whose registry no longer exists are dropped.
pub async fn rebuild_index(global: &mut Registry) -> IndexRebuild {
    let previous = global.index.take().unwrap_or_default();
    let mut rebuilt = BTreeMap::new();
    let mut outcome = IndexRebuild::default();

    for (name, entry) in previous {
        let root = PathBuf::from(&entry.path);
        let store = RegistryStore::project(&root);
        if !store.exists() {
            tracing::info!(project = %name, path = %entry.path, "project registry gone, dropping from index");
            outcome.dropped.push(name);
            continue;
        }
        let project = store.load().await;
        let mut scratch = Registry::default();
        update_index(&mut scratch, &root, &project);
        if let Some(snapshot) = scratch.index.and_then(|mut i| i.remove(&project_name(&root))) {
            rebuilt.insert(name.clone(), snapshot);
        }
        outcome.refreshed.push(name);
    }

    global.index = Some(rebuilt);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContextEntry, Preview, Scope};

    fn entry(id: &str) -> ContextEntry {
        ContextEntry {
            source: id.to_string(),
            target: Some("src/a.ts".to_string()),
            checksum: "abc".to_string(),
            target_checksum: Some("def".to_string()),
            last_modified: Utc::now(),
            preview: Preview {
                what: "A module".to_string(),
                keywords: vec!["a".to_string()],
            },
            scope: Scope::Local,
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips_contexts() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::project(dir.path());
        let mut reg = Registry::default();
        reg.contexts
            .insert("src/a.ctx.md".to_string(), entry("src/a.ctx.md"));
        store.save(&mut reg).await.unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded.contexts, reg.contexts);
        assert!(loaded.meta.last_synced.is_some());
        assert_eq!(loaded.settings, Some(Settings::default()));
        assert!(loaded.index.is_none());
    }

    #[tokio::test]
    async fn global_save_materializes_index() {
        let home = tempfile::tempdir().unwrap();
        let store = RegistryStore::global(home.path());
        let mut reg = Registry::default();
        store.save(&mut reg).await.unwrap();
        assert!(store.registry_path().starts_with(home.path().join(GLOBAL_DIR)));
        assert_eq!(store.load().await.index, Some(BTreeMap::new()));
    }

    #[tokio::test]
    async fn missing_registry_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::project(dir.path());
        assert!(!store.exists());
        assert!(store.load().await.contexts.is_empty());
        assert!(matches!(
            store.load_required().await,
            Err(ContextError::NotInitialized)
        ));
        assert!(matches!(
            RegistryStore::global(dir.path()).load_required().await,
            Err(ContextError::GlobalNotInitialized)
        ));
    }

    #[tokio::test]
    async fn garbage_registry_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::project(dir.path());
        std::fs::create_dir_all(store.registry_dir()).unwrap();
        std::fs::write(store.registry_path(), "contexts: [not, a, map").unwrap();
        assert!(store.load().await.contexts.is_empty());
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::project(dir.path());
        assert!(store.init().await.unwrap());
        assert!(store.contexts_dir().is_dir());

        let mut reg = store.load().await;
        reg.contexts.insert("x.ctx.md".to_string(), entry("x.ctx.md"));
        store.save(&mut reg).await.unwrap();

        assert!(!store.init().await.unwrap());
        assert_eq!(store.load().await.contexts.len(), 1);
        assert_eq!(
            store.load().await.context_path_patterns(),
            vec![".ctx/contexts/**/*.md"]
        );
    }

    #[tokio::test]
    async fn find_root_from_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        RegistryStore::project(dir.path()).init().await.unwrap();
        let nested = dir.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn find_root_returns_none_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        // A bare .ctx directory without a registry is not a project.
        std::fs::create_dir_all(dir.path().join(PROJECT_DIR)).unwrap();
        assert!(find_project_root(&nested).is_none());
    }

    #[test]
    fn document_id_is_base_relative() {
        let store = RegistryStore::project(Path::new("/repo"));
        assert_eq!(
            store.document_id(Path::new("/repo/src/a.ctx.md")).as_deref(),
            Some("src/a.ctx.md")
        );
        assert_eq!(
            store.document_id(Path::new("./src/a.ctx.md")).as_deref(),
            Some("src/a.ctx.md")
        );
        assert!(store.document_id(Path::new("/elsewhere/a.md")).is_none());
    }

    #[test]
    fn document_id_stays_inside_base() {
        let store = RegistryStore::project(Path::new("/repo"));
        assert!(store
            .document_id(Path::new("/repo/../secret.ctx.md"))
            .is_none());
        assert!(store.document_id(Path::new("../x.ctx.md")).is_none());
        assert!(store
            .document_id(Path::new("src/../../x.ctx.md"))
            .is_none());
        assert_eq!(
            store
                .document_id(Path::new("/repo/src/../lib/b.ctx.md"))
                .as_deref(),
            Some("lib/b.ctx.md")
        );
        assert!(store.document_id(Path::new("/repo")).is_none());
        assert_eq!(
            store.document_id(Path::new("/repo/./src/a.ctx.md")).as_deref(),
            Some("src/a.ctx.md")
        );
    }

    #[tokio::test]
    async fn rebuild_index_refreshes_and_drops() {
        let home = tempfile::tempdir().unwrap();
        let live = tempfile::tempdir().unwrap();
        let project = RegistryStore::project(live.path());
        let mut reg = Registry::default();
        reg.contexts.insert("a.ctx.md".to_string(), entry("a.ctx.md"));
        project.save(&mut reg).await.unwrap();

        let mut global = Registry::default();
        // Stale snapshot for the live project, plus a project that vanished.
        update_index(&mut global, live.path(), &Registry::default());
        update_index(&mut global, &home.path().join("gone"), &Registry::default());

        let outcome = rebuild_index(&mut global).await;
        assert_eq!(outcome.refreshed, vec![project_name(live.path())]);
        assert_eq!(outcome.dropped, vec!["gone".to_string()]);

        let index = global.index.unwrap();
        let snapshot = &index[&project_name(live.path())];
        assert_eq!(snapshot.context_count, 1);
        assert_eq!(snapshot.contexts[0].what, "A module");
    }
}

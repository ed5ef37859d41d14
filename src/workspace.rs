//! Explicit invocation context: where we are, which project, which home.
//!
//! Nothing in the library reads the current directory or `$HOME`; the binary
//! resolves both once and passes a [`Workspace`] down.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::error::ContextError;
use crate::models::Registry;
use crate::registry::{self, RegistryStore, CONFIG_FILE, PROJECT_DIR};

#[derive(Debug, Clone)]
pub struct Workspace {
    /// Directory the command was started from.
    pub cwd: PathBuf,
    /// Project root, if a project registry was found above `cwd`.
    pub root: Option<PathBuf>,
    pub home: PathBuf,
    pub config: Config,
}

impl Workspace {
    /// Find the project root above `cwd` and load configuration.
    ///
    /// `config_path` wins over `<root>/.ctx/config.toml`; with neither, the
    /// minimal config is used.
    pub fn discover(cwd: &Path, home: &Path, config_path: Option<&Path>) -> Result<Self> {
        let root = registry::find_project_root(cwd);
        let fallback = root
            .as_ref()
            .map(|r| r.join(PROJECT_DIR).join(CONFIG_FILE));
        let config = config::resolve_config(config_path, fallback.as_deref())?;
        Ok(Self {
            cwd: cwd.to_path_buf(),
            root,
            home: home.to_path_buf(),
            config,
        })
    }

    pub fn global_store(&self) -> RegistryStore {
        RegistryStore::global(&self.home)
    }

    /// The project store, or `NotInitialized`.
    pub fn project_store(&self) -> Result<RegistryStore, ContextError> {
        self.root
            .as_deref()
            .map(RegistryStore::project)
            .ok_or(ContextError::NotInitialized)
    }

    /// The initialized store selected by `--global`.
    pub fn store(&self, global: bool) -> Result<RegistryStore, ContextError> {
        if global {
            let store = self.global_store();
            if !store.exists() {
                return Err(ContextError::GlobalNotInitialized);
            }
            Ok(store)
        } else {
            self.project_store()
        }
    }

    /// Global store if initialized, for operations that use it opportunistically.
    pub fn global_if_initialized(&self) -> Option<RegistryStore> {
        Some(self.global_store()).filter(|s| s.exists())
    }

    /// Both registries, each `None` when not initialized.
    pub async fn load_registries(&self) -> (Option<Registry>, Option<Registry>) {
        let project = match self.project_store() {
            Ok(store) => Some(store.load().await),
            Err(_) => None,
        };
        let global = match self.global_if_initialized() {
            Some(store) => Some(store.load().await),
            None => None,
        };
        (project, global)
    }

    /// Base directory for resolving user-supplied relative paths.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// Root for target matching: the project root, else `cwd`.
    pub fn match_root(&self) -> &Path {
        self.root.as_deref().unwrap_or(&self.cwd)
    }
}

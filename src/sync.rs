//! Sync: rescan context documents and rewrite registry entries to match.
//!
//! Sync only adds or updates entries; removal is `ctx remove`. One bad
//! document is logged and skipped without stopping the rest. Documents are
//! processed one at a time, in sorted order.

use anyhow::Result;

use crate::config::ScanConfig;
use crate::document;
use crate::models::Registry;
use crate::registry::{self, RegistryKind, RegistryStore};
use crate::scan;

/// Counts from one sync run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries created or whose content changed.
    pub updated: Vec<String>,
    pub unchanged: usize,
    /// Files matching a document pattern that are not context documents.
    pub skipped: Vec<String>,
    /// Documents that failed to read, parse, or validate, with the reason.
    pub errors: Vec<(String, String)>,
}

impl SyncReport {
    pub fn synced(&self) -> usize {
        self.updated.len() + self.unchanged
    }
}

/// Sync `registry` in memory against the documents under `store`.
///
/// With `only`, just that document is synced and no discovery scan runs.
pub async fn sync_registry(
    store: &RegistryStore,
    registry: &mut Registry,
    scan_config: &ScanConfig,
    only: Option<&str>,
) -> Result<SyncReport> {
    let ids = match only {
        Some(id) => vec![id.to_string()],
        None => {
            let patterns = scan::discovery_patterns(store, registry, scan_config);
            scan::scan_documents(
                store.base(),
                &patterns,
                &scan_config.exclude_globs,
                scan_config.follow_symlinks,
            )?
        }
    };

    let mut report = SyncReport::default();

    for id in ids {
        let previous = registry.contexts.get(&id);
        match document::build_entry(store, &id, previous).await {
            Ok(Some(entry)) => {
                if previous == Some(&entry) {
                    report.unchanged += 1;
                } else {
                    tracing::debug!(document = %id, "registry entry updated");
                    report.updated.push(id.clone());
                    registry.contexts.insert(id, entry);
                }
            }
            Ok(None) => {
                tracing::warn!(document = %id, "skipping: no valid 'what'/'keywords' metadata");
                report.skipped.push(id);
            }
            Err(e) => {
                tracing::warn!(document = %id, error = %e, "skipping document");
                report.errors.push((id, e.to_string()));
            }
        }
    }

    Ok(report)
}

/// Load, sync, and save a registry. A project sync also refreshes its
/// snapshot in the global index when the global registry exists.
pub async fn sync_and_save(
    store: &RegistryStore,
    global: Option<&RegistryStore>,
    scan_config: &ScanConfig,
    only: Option<&str>,
) -> Result<SyncReport> {
    let mut registry = store.load_required().await?;
    let report = sync_registry(store, &mut registry, scan_config, only).await?;
    store.save(&mut registry).await?;

    if store.kind() == RegistryKind::Project {
        if let Some(global_store) = global.filter(|g| g.exists()) {
            let mut global_registry = global_store.load().await;
            registry::update_index(&mut global_registry, store.base(), &registry);
            global_store.save(&mut global_registry).await?;
        }
    }

    Ok(report)
}

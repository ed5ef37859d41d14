//! Read-only freshness check: compare registry checksums against disk.
//!
//! Per entry:
//!
//! | Result    | Condition |
//! |-----------|-----------|
//! | `fresh`   | document hash equals `checksum`; bound target present and unchanged |
//! | `stale`   | document hash differs, or the exact target's hash differs from `target_checksum` |
//! | `deleted` | document no longer on disk |
//! | `error`   | bound target missing, or the document could not be read |
//!
//! Discovered documents with no entry are reported as `new`. Discovery is
//! skipped when the check is restricted to one identifier. The registry is
//! never written.

use serde::Serialize;

use crate::checksum;
use crate::config::ScanConfig;
use crate::document;
use crate::error::ContextError;
use crate::models::{ContextEntry, Registry, Scope};
use crate::registry::{RegistryKind, RegistryStore};
use crate::scan;
use crate::target::{classify, is_separator, TargetKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Stale,
    New,
    Deleted,
    Error,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Stale => "stale",
            IssueType::New => "new",
            IssueType::Deleted => "deleted",
            IssueType::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueType,
    pub category: String,
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct Summary {
    pub fresh: usize,
    pub stale: usize,
    pub new: usize,
    pub deleted: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Fresh,
    Stale,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Fresh => "fresh",
            Status::Stale => "stale",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub status: Status,
    pub summary: Summary,
    pub issues: Vec<Issue>,
}

impl CheckReport {
    fn from_parts(summary: Summary, issues: Vec<Issue>) -> Self {
        let status = if summary.stale + summary.errors + summary.deleted > 0 {
            Status::Stale
        } else {
            Status::Fresh
        };
        Self {
            status,
            summary,
            issues,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.status == Status::Fresh
    }
}

/// Classification of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(String),
    Deleted,
    Error(String),
}

/// Classify a single entry against the filesystem.
///
/// Target checks only apply to project registries; global targets are
/// patterns meant for any project.
pub async fn classify_entry(store: &RegistryStore, id: &str, entry: &ContextEntry) -> Freshness {
    let path = store.document_path(id);
    if !path.exists() {
        return Freshness::Deleted;
    }
    match checksum::hash_file(&path).await {
        Ok(current) if current != entry.checksum => {
            return Freshness::Stale("document changed since last sync".to_string())
        }
        Ok(_) => {}
        Err(e) => return Freshness::Error(e.to_string()),
    }

    let Some(target) = entry.target.as_deref() else {
        return Freshness::Fresh;
    };
    if store.kind() != RegistryKind::Project {
        return Freshness::Fresh;
    }

    let missing = || {
        Freshness::Error(
            ContextError::TargetMissing {
                document: id.to_string(),
                target: target.to_string(),
            }
            .to_string(),
        )
    };

    match classify(target) {
        TargetKind::Glob => Freshness::Fresh,
        TargetKind::Folder => {
            let folder = target_on_disk(target);
            if folder.is_empty() || store.base().join(&folder).is_dir() {
                Freshness::Fresh
            } else {
                missing()
            }
        }
        TargetKind::Exact => {
            let target_path = store.base().join(target_on_disk(target));
            if !target_path.is_file() {
                return missing();
            }
            let Some(stored) = entry.target_checksum.as_deref() else {
                return Freshness::Fresh;
            };
            match checksum::hash_file(&target_path).await {
                Ok(current) if current != stored => {
                    Freshness::Stale(format!("target {} changed since last sync", target))
                }
                Ok(_) => Freshness::Fresh,
                Err(e) => Freshness::Error(e.to_string()),
            }
        }
    }
}

/// Base-relative path for a stored target, accepting either separator.
fn target_on_disk(target: &str) -> String {
    target
        .trim_start_matches(is_separator)
        .trim_end_matches(is_separator)
        .replace('\\', "/")
}

/// Check a registry against disk without modifying it.
///
/// With `only`, just that entry is evaluated and no discovery scan runs.
pub async fn check(
    store: &RegistryStore,
    registry: &Registry,
    scan_config: &ScanConfig,
    only: Option<&str>,
) -> CheckReport {
    let mut summary = Summary::default();
    let mut issues = Vec::new();

    let entries: Vec<(&String, &ContextEntry)> = match only {
        Some(id) => match registry.contexts.get_key_value(id) {
            Some(pair) => vec![pair],
            None => {
                summary.errors += 1;
                issues.push(Issue {
                    kind: IssueType::Error,
                    category: "standalone".to_string(),
                    path: id.to_string(),
                    message: ContextError::UnknownContext(id.to_string()).to_string(),
                });
                return CheckReport::from_parts(summary, issues);
            }
        },
        None => registry.contexts.iter().collect(),
    };

    for (id, entry) in entries {
        let issue = |kind, message: String| Issue {
            kind,
            category: entry.category().to_string(),
            path: id.clone(),
            message,
        };
        match classify_entry(store, id, entry).await {
            Freshness::Fresh => summary.fresh += 1,
            Freshness::Stale(msg) => {
                summary.stale += 1;
                issues.push(issue(IssueType::Stale, msg));
            }
            Freshness::Deleted => {
                summary.deleted += 1;
                issues.push(issue(
                    IssueType::Deleted,
                    "document no longer exists".to_string(),
                ));
            }
            Freshness::Error(msg) => {
                summary.errors += 1;
                issues.push(issue(IssueType::Error, msg));
            }
        }
    }

    if only.is_none() {
        for (id, category) in discover_new(store, registry, scan_config).await {
            summary.new += 1;
            issues.push(Issue {
                kind: IssueType::New,
                category: category.to_string(),
                path: id,
                message: "not registered; run `ctx sync`".to_string(),
            });
        }
    }

    CheckReport::from_parts(summary, issues)
}

/// Context documents on disk that have no registry entry.
async fn discover_new(
    store: &RegistryStore,
    registry: &Registry,
    scan_config: &ScanConfig,
) -> Vec<(String, &'static str)> {
    let patterns = scan::discovery_patterns(store, registry, scan_config);
    let found = match scan::scan_documents(
        store.base(),
        &patterns,
        &scan_config.exclude_globs,
        scan_config.follow_symlinks,
    ) {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(error = %e, "discovery scan failed");
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for id in found {
        if registry.contexts.contains_key(&id) {
            continue;
        }
        let category = match document::read_document(store, &id).await {
            Ok(Some((_, doc))) if doc.meta.target.is_some() => "bound",
            Ok(Some(_)) => match scan::scope_for(&id) {
                Scope::Local => "bound",
                Scope::Project => "standalone",
            },
            Ok(None) => continue,
            // Broken companion files still count as new so they get noticed.
            Err(_) => "bound",
        };
        out.push((id, category));
    }
    out
}

//! Turning an on-disk context document into a registry entry.
//!
//! Companion documents (`*.ctx.md`, `ctx.md`, legacy `*.ctx.*`) must carry a
//! valid metadata block; a broken one is an error for that file. Anything
//! else is only a context document if a preview can be extracted from it.

use chrono::Utc;
use std::path::Path;

use crate::checksum;
use crate::error::{ContextError, Result};
use crate::frontmatter::{self, ParsedDocument, LEGACY_SUFFIXES};
use crate::models::{ContextEntry, Scope};
use crate::registry::{RegistryKind, RegistryStore};
use crate::scan::{is_companion_name, scope_for};
use crate::target::{classify, TargetKind};

/// Read and parse a document by identifier.
///
/// `Ok(None)` means the file is not a context document (lenient mode only).
pub async fn read_document(
    store: &RegistryStore,
    id: &str,
) -> Result<Option<(String, ParsedDocument)>> {
    let path = store.document_path(id);
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| ContextError::io(&path, e))?;

    let parsed = match scope_for(id) {
        Scope::Local => {
            let doc = frontmatter::parse(id, &content)?;
            frontmatter::validate(&doc).into_result(id)?;
            doc
        }
        Scope::Project => match frontmatter::parse(id, &content) {
            Ok(doc) if doc.preview().is_valid() => doc,
            _ => return Ok(None),
        },
    };
    Ok(Some((content, parsed)))
}

/// Strip `./` and a single leading separator; `/` alone (the root folder)
/// is kept.
pub fn normalize_target(target: &str) -> String {
    let mut t = target.trim();
    while let Some(rest) = t.strip_prefix("./") {
        t = rest;
    }
    if t.len() > 1 {
        if let Some(rest) = t.strip_prefix('/') {
            t = rest;
        }
    }
    t.to_string()
}

/// Infer a target from a companion document's file name.
///
/// `dir/ctx.md` targets the folder `dir/`. `dir/name.ctx.md` targets
/// `dir/name` when it exists, else the only sibling named `name.*`.
pub async fn infer_target(base: &Path, id: &str) -> Option<String> {
    let (parent, file_name) = match id.rsplit_once('/') {
        Some((p, f)) => (p, f),
        None => ("", id),
    };

    if file_name == "ctx.md" {
        return (!parent.is_empty()).then(|| format!("{}/", parent));
    }

    let stem = std::iter::once(".ctx.md")
        .chain(LEGACY_SUFFIXES)
        .find_map(|suffix| file_name.strip_suffix(suffix))?;
    if stem.is_empty() {
        return None;
    }

    let join = |name: &str| {
        if parent.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", parent, name)
        }
    };

    let direct = base.join(join(stem));
    if direct.is_dir() {
        return Some(format!("{}/", join(stem)));
    }
    if direct.is_file() {
        return Some(join(stem));
    }

    let mut dir = tokio::fs::read_dir(base.join(parent)).await.ok()?;
    let prefix = format!("{}.", stem);
    let mut candidates = Vec::new();
    while let Ok(Some(entry)) = dir.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(&prefix) && !is_companion_name(&name) && entry.path().is_file() {
            candidates.push(name);
        }
    }
    match candidates.as_slice() {
        [only] => Some(join(only)),
        _ => None,
    }
}

/// Build the registry entry for a document as it is on disk right now.
///
/// `previous` keeps `last_modified` stable when nothing changed.
pub async fn build_entry(
    store: &RegistryStore,
    id: &str,
    previous: Option<&ContextEntry>,
) -> Result<Option<ContextEntry>> {
    let Some((content, parsed)) = read_document(store, id).await? else {
        return Ok(None);
    };
    let scope = scope_for(id);

    let target = match parsed.meta.target.as_deref() {
        Some(t) => Some(normalize_target(t)),
        None if scope == Scope::Local && store.kind() == RegistryKind::Project => {
            infer_target(store.base(), id).await
        }
        None => None,
    };

    let target_checksum = match target.as_deref() {
        Some(t) if store.kind() == RegistryKind::Project && classify(t) == TargetKind::Exact => {
            let path = store.base().join(t);
            if path.is_file() {
                Some(checksum::hash_file(&path).await?)
            } else {
                None
            }
        }
        _ => None,
    };

    let mut entry = ContextEntry {
        source: id.to_string(),
        target,
        checksum: checksum::hash(&content),
        target_checksum,
        last_modified: Utc::now(),
        preview: parsed.preview(),
        scope,
    };

    if let Some(prev) = previous {
        let unchanged = ContextEntry {
            last_modified: prev.last_modified,
            ..entry.clone()
        };
        if &unchanged == prev {
            entry.last_modified = prev.last_modified;
        }
    }

    Ok(Some(entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(base: &Path, rel: &str, content: &str) {
        let p = base.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, content).unwrap();
    }

    const A_DOC: &str = "---\ntarget: src/a.ts\nwhat: A module\nkeywords: [a]\n---\nBody\n";

    #[tokio::test]
    async fn builds_bound_entry_with_target_checksum() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.ctx.md", A_DOC);
        write(dir.path(), "src/a.ts", "export const a = 1;\n");
        let store = RegistryStore::project(dir.path());

        let entry = build_entry(&store, "src/a.ctx.md", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.source, "src/a.ctx.md");
        assert_eq!(entry.target.as_deref(), Some("src/a.ts"));
        assert_eq!(entry.checksum, checksum::hash(A_DOC));
        assert_eq!(
            entry.target_checksum,
            Some(checksum::hash("export const a = 1;\n"))
        );
        assert_eq!(entry.scope, Scope::Local);
        assert_eq!(entry.preview.keywords, vec!["a"]);
    }

    #[tokio::test]
    async fn unchanged_document_keeps_last_modified() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.ctx.md", A_DOC);
        let store = RegistryStore::project(dir.path());
        let mut first = build_entry(&store, "src/a.ctx.md", None)
            .await
            .unwrap()
            .unwrap();
        first.last_modified = first.last_modified - chrono::Duration::days(1);
        let second = build_entry(&store, "src/a.ctx.md", Some(&first))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn malformed_companion_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/b.ctx.md", "no block here\n");
        let store = RegistryStore::project(dir.path());
        let err = build_entry(&store, "src/b.ctx.md", None).await.unwrap_err();
        assert!(matches!(err, ContextError::Parse { .. }));
    }

    #[tokio::test]
    async fn incomplete_companion_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/b.ctx.md", "---\nwhat: B\nkeywords: []\n---\n");
        let store = RegistryStore::project(dir.path());
        let err = build_entry(&store, "src/b.ctx.md", None).await.unwrap_err();
        assert!(matches!(err, ContextError::Validation { .. }));
    }

    #[tokio::test]
    async fn plain_markdown_is_not_a_context_document() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".ctx/contexts/notes.md", "# Notes\n");
        let store = RegistryStore::project(dir.path());
        assert!(build_entry(&store, ".ctx/contexts/notes.md", None)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn target_normalization() {
        assert_eq!(normalize_target("./src/a.ts"), "src/a.ts");
        assert_eq!(normalize_target("/src/a.ts"), "src/a.ts");
        assert_eq!(normalize_target("/"), "/");
        assert_eq!(normalize_target("src/"), "src/");
    }

    #[tokio::test]
    async fn infers_folder_for_ctx_md() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            infer_target(dir.path(), "src/api/ctx.md").await.as_deref(),
            Some("src/api/")
        );
        assert!(infer_target(dir.path(), "ctx.md").await.is_none());
    }

    #[tokio::test]
    async fn infers_single_sibling() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.ts", "");
        write(dir.path(), "src/a.ctx.md", "");
        write(dir.path(), "src/ab.ts", "");
        assert_eq!(
            infer_target(dir.path(), "src/a.ctx.md").await.as_deref(),
            Some("src/a.ts")
        );
    }

    #[tokio::test]
    async fn ambiguous_siblings_infer_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.ts", "");
        write(dir.path(), "src/a.test.ts", "");
        assert!(infer_target(dir.path(), "src/a.ctx.md").await.is_none());
    }

    #[tokio::test]
    async fn infers_exact_name_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Makefile", "");
        write(dir.path(), "src/util/mod.rs", "");
        assert_eq!(
            infer_target(dir.path(), "Makefile.ctx.md").await.as_deref(),
            Some("Makefile")
        );
        assert_eq!(
            infer_target(dir.path(), "src/util.ctx.md").await.as_deref(),
            Some("src/util/")
        );
    }
}

//! CLI command implementations.
//!
//! Each `run_*` function is a thin adapter from parsed flags to the registry,
//! sync, check, and matching code. Output goes to stdout; diagnostics go
//! through `tracing` on stderr.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncReadExt;

use crate::document;
use crate::error::ContextError;
use crate::freshness::{self, CheckReport};
use crate::frontmatter::{self, DocumentMeta, Frontmatter, ParsedDocument, LEGACY_SUFFIXES};
use crate::models::{ContextPath, Registry, Settings};
use crate::registry::{self, RegistryKind, RegistryStore};
use crate::scan;
use crate::search;
use crate::sync::{self, SyncReport};
use crate::target::{self, Origin};
use crate::workspace::Workspace;

// ═══════════════════════════════════════════════════════════════════════
// Setup
// ═══════════════════════════════════════════════════════════════════════

/// `ctx init`: create the project (or global) registry.
pub async fn run_init(ws: &Workspace, global: bool) -> Result<()> {
    let store = if global {
        ws.global_store()
    } else {
        RegistryStore::project(ws.root.as_deref().unwrap_or(&ws.cwd))
    };

    if store.init().await? {
        println!(
            "Initialized {} registry at {}",
            store.kind().as_str(),
            store.registry_path().display()
        );
    } else {
        println!(
            "{} registry already initialized at {}",
            capitalize(store.kind().as_str()),
            store.registry_path().display()
        );
    }
    Ok(())
}

/// `ctx create`: write a new document from the template and register it.
pub async fn run_create(
    ws: &Workspace,
    name: &str,
    target: Option<String>,
    what: Option<String>,
    keywords: Vec<String>,
    global: bool,
) -> Result<()> {
    let store = ws.store(global)?;
    let id = if !global && is_companion_path(name) {
        store
            .document_id(&ws.resolve_path(Path::new(name)))
            .with_context(|| format!("{} is outside the project", name))?
    } else {
        contexts_id(&store, name)?
    };

    let path = store.document_path(&id);
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    let title = title_from(name);
    let keywords = if keywords.is_empty() {
        vec![title.to_lowercase()]
    } else {
        keywords
    };
    let doc = ParsedDocument {
        source: id.clone(),
        meta: DocumentMeta {
            version: ws.config.documents.default_version.clone(),
            target: target.map(|t| document::normalize_target(&t)),
        },
        frontmatter: Frontmatter {
            what: what.unwrap_or_else(|| format!("Context for {}", title)),
            keywords,
            future: Vec::new(),
        },
        body: format!("# {}\n\n## Overview\n\n## Details\n", title),
    };

    write_document(&path, &frontmatter::render_markdown(&doc)?).await?;
    register(&store, &id).await?;
    println!("Created {}", path.display());
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Sync & check
// ═══════════════════════════════════════════════════════════════════════

/// `ctx sync`: rescan documents and persist checksums.
pub async fn run_sync(ws: &Workspace, path: Option<&str>, global: bool) -> Result<()> {
    let store = ws.store(global)?;
    let only = path.map(|p| to_id(ws, &store, p)).transpose()?;
    let global_store = ws.global_if_initialized();

    let report = sync::sync_and_save(&store, global_store.as_ref(), &ws.config.scan, only.as_deref())
        .await?;
    print_sync_report(store.kind(), &report);
    Ok(())
}

fn print_sync_report(kind: RegistryKind, report: &SyncReport) {
    println!("sync {}", kind.as_str());
    println!("  synced: {}", report.synced());
    println!("  updated: {}", report.updated.len());
    println!("  skipped: {}", report.skipped.len());
    println!("  errors: {}", report.errors.len());
    for (id, err) in &report.errors {
        eprintln!("  ! {}: {}", id, err);
    }
    println!("ok");
}

/// `ctx check`: read-only freshness report. Returns `false` when strict
/// mode should fail the process.
pub async fn run_check(
    ws: &Workspace,
    path: Option<&str>,
    global: bool,
    strict: bool,
    json: bool,
) -> Result<bool> {
    let store = ws.store(global)?;
    let registry = store.load_required().await?;
    let only = path.map(|p| to_id(ws, &store, p)).transpose()?;

    let report = freshness::check(&store, &registry, &ws.config.scan, only.as_deref()).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_check_report(store.kind(), &report);
    }

    Ok(!(strict && !report.is_fresh()))
}

fn print_check_report(kind: RegistryKind, report: &CheckReport) {
    let s = &report.summary;
    println!("check {}: {}", kind.as_str(), report.status.as_str());
    println!(
        "  fresh: {}  stale: {}  new: {}  deleted: {}  errors: {}",
        s.fresh, s.stale, s.new, s.deleted, s.errors
    );
    for issue in &report.issues {
        println!(
            "  [{:<7}] {:<10} {}  ({})",
            issue.kind.as_str(),
            issue.category,
            issue.path,
            issue.message
        );
    }
}

/// `ctx refresh`: sync the project, then rebuild the global index.
pub async fn run_refresh(ws: &Workspace) -> Result<()> {
    let global_store = ws.global_if_initialized();
    let project_store = ws.project_store().ok();

    if project_store.is_none() && global_store.is_none() {
        return Err(ContextError::NotInitialized.into());
    }

    if let Some(store) = &project_store {
        let report = sync::sync_and_save(store, global_store.as_ref(), &ws.config.scan, None).await?;
        print_sync_report(RegistryKind::Project, &report);
    }

    if let Some(store) = &global_store {
        let mut global = store.load().await;
        let outcome = registry::rebuild_index(&mut global).await;
        store.save(&mut global).await?;
        println!("index rebuilt");
        println!("  projects: {}", outcome.refreshed.len());
        for name in &outcome.dropped {
            println!("  dropped: {}", name);
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Inspection
// ═══════════════════════════════════════════════════════════════════════

/// `ctx status`: where the registries are and whether they are fresh.
pub async fn run_status(ws: &Workspace) -> Result<()> {
    let stores = [
        ("project", ws.project_store().ok()),
        ("global", ws.global_if_initialized()),
    ];

    for (label, store) in stores {
        let Some(store) = store else {
            println!("{:<8} not initialized", label);
            continue;
        };
        let registry = store.load().await;
        let report = freshness::check(&store, &registry, &ws.config.scan, None).await;
        println!("{:<8} {}", label, store.registry_path().display());
        println!("  contexts:    {}", registry.contexts.len());
        println!(
            "  last synced: {}",
            registry
                .meta
                .last_synced
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string())
        );
        println!(
            "  status:      {} ({} stale, {} new, {} deleted, {} errors)",
            report.status.as_str(),
            report.summary.stale,
            report.summary.new,
            report.summary.deleted,
            report.summary.errors
        );
        if let Some(index) = &registry.index {
            println!("  projects:    {}", index.len());
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ListRow<'a> {
    id: &'a str,
    scope: &'static str,
    target: Option<&'a str>,
    what: &'a str,
    keywords: &'a [String],
}

/// `ctx list`: tabulate registry entries.
pub async fn run_list(ws: &Workspace, global: bool, json: bool) -> Result<()> {
    let store = ws.store(global)?;
    let registry = store.load_required().await?;

    let rows: Vec<ListRow> = registry
        .contexts
        .iter()
        .map(|(id, e)| ListRow {
            id,
            scope: e.scope.as_str(),
            target: e.target.as_deref(),
            what: &e.preview.what,
            keywords: &e.preview.keywords,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No contexts registered.");
        return Ok(());
    }
    println!("{:<40} {:<8} {:<24} WHAT", "CONTEXT", "SCOPE", "TARGET");
    for r in &rows {
        println!(
            "{:<40} {:<8} {:<24} {}",
            r.id,
            r.scope,
            r.target.unwrap_or("-"),
            r.what
        );
    }
    Ok(())
}

/// `ctx load`: surface the contexts for a file, or by keywords.
pub async fn run_load(
    ws: &Workspace,
    target_path: Option<&str>,
    keywords: &[String],
    all: bool,
) -> Result<()> {
    let (project, global) = ws.load_registries().await;
    if project.is_none() && global.is_none() {
        return Err(ContextError::NotInitialized.into());
    }
    let project_store = ws.project_store().ok();
    let global_store = ws.global_store();

    let store_for = |origin: Origin| -> Option<RegistryStore> {
        match origin {
            Origin::Project => project_store.clone(),
            Origin::Global => Some(global_store.clone()),
        }
    };

    if let Some(path) = target_path {
        let candidate = ws.resolve_path(Path::new(path));
        let matches = target::resolve(
            &candidate,
            project.as_ref(),
            global.as_ref(),
            ws.match_root(),
        );
        if matches.is_empty() {
            println!("No context applies to {}", path);
            return Ok(());
        }
        let shown = if all { matches.len() } else { 1 };
        for m in matches.iter().take(shown) {
            let Some(store) = store_for(m.origin) else {
                continue;
            };
            print_document(&store, &m.id, m.origin, &format!("rank {}", m.rank)).await;
        }
        return Ok(());
    }

    if keywords.is_empty() {
        bail!("give a target path or --keywords");
    }

    let hits = search::search_all(keywords, project.as_ref(), global.as_ref());
    if hits.is_empty() {
        println!("No contexts match {}", keywords.join(", "));
        return Ok(());
    }
    if all {
        for h in &hits {
            if let Some(store) = store_for(h.origin) {
                print_document(&store, &h.id, h.origin, &format!("score {}", h.score)).await;
            }
        }
    } else {
        println!("{:<6} {:<8} {:<40} WHAT", "SCORE", "ORIGIN", "CONTEXT");
        for h in &hits {
            println!(
                "{:<6} {:<8} {:<40} {}",
                h.score,
                h.origin.as_str(),
                h.id,
                h.entry.preview.what
            );
        }
    }
    Ok(())
}

async fn print_document(store: &RegistryStore, id: &str, origin: Origin, detail: &str) {
    println!("=== {} ({}, {}) ===", id, origin.as_str(), detail);
    let path = store.document_path(id);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => match frontmatter::parse(id, &content) {
            Ok(doc) => println!("{}", doc.body.trim_end()),
            Err(_) => println!("{}", content.trim_end()),
        },
        Err(e) => {
            tracing::warn!(document = %id, error = %e, "cannot read context document");
            println!("(unreadable: {})", e);
        }
    }
    println!();
}

#[derive(Serialize)]
struct SessionRow<'a> {
    origin: &'static str,
    id: &'a str,
    target: Option<&'a str>,
    what: &'a str,
    keywords: &'a [String],
}

/// `ctx session`: compact digest of every known context for priming an
/// assistant session.
pub async fn run_session(ws: &Workspace, json: bool) -> Result<()> {
    let (project, global) = ws.load_registries().await;
    if project.is_none() && global.is_none() {
        return Err(ContextError::NotInitialized.into());
    }

    let mut rows = Vec::new();
    for (origin, reg) in [(Origin::Project, &project), (Origin::Global, &global)] {
        let Some(reg) = reg else { continue };
        for (id, e) in &reg.contexts {
            rows.push(SessionRow {
                origin: origin.as_str(),
                id,
                target: e.target.as_deref(),
                what: &e.preview.what,
                keywords: &e.preview.keywords,
            });
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    println!("# Available contexts ({})", rows.len());
    println!();
    for r in &rows {
        let target = r.target.map(|t| format!(" -> {}", t)).unwrap_or_default();
        println!("- [{}] {}{}: {}", r.origin, r.id, target, r.what);
        println!("  keywords: {}", r.keywords.join(", "));
    }
    println!();
    println!("Run `ctx load <file>` or `ctx load --keywords <words>` to read one.");
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Registry edits
// ═══════════════════════════════════════════════════════════════════════

/// `ctx add`: register an existing document.
pub async fn run_add(ws: &Workspace, path: &str, global: bool) -> Result<()> {
    let store = ws.store(global)?;
    let id = to_id(ws, &store, path)?;
    if !store.document_path(&id).is_file() {
        bail!("{} does not exist", store.document_path(&id).display());
    }
    register(&store, &id).await?;
    println!("Registered {}", id);
    Ok(())
}

/// `ctx remove`: unregister an entry; the file is left alone.
pub async fn run_remove(ws: &Workspace, id: &str, global: bool) -> Result<()> {
    let store = ws.store(global)?;
    let mut registry = store.load_required().await?;

    let key = if registry.contexts.contains_key(id) {
        id.to_string()
    } else {
        to_id(ws, &store, id)?
    };
    if registry.contexts.remove(&key).is_none() {
        return Err(ContextError::UnknownContext(id.to_string()).into());
    }
    store.save(&mut registry).await?;
    println!("Removed {} from the {} registry", key, store.kind().as_str());
    Ok(())
}

/// `ctx save`: store body text as a standalone context.
pub async fn run_save(
    ws: &Workspace,
    name: &str,
    what: String,
    keywords: Vec<String>,
    file: Option<&Path>,
    global: bool,
) -> Result<()> {
    let store = ws.store(global)?;

    let body = match file {
        Some(f) => {
            let path = ws.resolve_path(f);
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read context body from stdin")?;
            buf
        }
    };

    let id = contexts_id(&store, name)?;
    let doc = ParsedDocument {
        source: id.clone(),
        meta: DocumentMeta {
            version: ws.config.documents.default_version.clone(),
            target: None,
        },
        frontmatter: Frontmatter {
            what,
            keywords,
            future: Vec::new(),
        },
        body,
    };
    frontmatter::validate(&doc).into_result(&id)?;

    let path = store.document_path(&id);
    write_document(&path, &frontmatter::render_markdown(&doc)?).await?;
    register(&store, &id).await?;
    println!("Saved {}", path.display());
    Ok(())
}

/// `ctx adopt`: bring an arbitrary markdown file under management.
pub async fn run_adopt(
    ws: &Workspace,
    path: &str,
    what: Option<String>,
    keywords: Vec<String>,
    target: Option<String>,
) -> Result<()> {
    let store = ws.project_store()?;
    let id = to_id(ws, &store, path)?;
    let file = store.document_path(&id);
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let existing = frontmatter::parse(&id, &content).ok();
    let already_valid = existing
        .as_ref()
        .map(|d| d.preview().is_valid())
        .unwrap_or(false);

    if !already_valid || what.is_some() || !keywords.is_empty() || target.is_some() {
        let mut doc = existing.unwrap_or_else(|| ParsedDocument {
            source: id.clone(),
            meta: DocumentMeta {
                version: ws.config.documents.default_version.clone(),
                target: None,
            },
            frontmatter: Frontmatter::default(),
            body: content.clone(),
        });
        if let Some(w) = what {
            doc.frontmatter.what = w;
        }
        if !keywords.is_empty() {
            doc.frontmatter.keywords = keywords;
        }
        if let Some(t) = target {
            doc.meta.target = Some(document::normalize_target(&t));
        }
        frontmatter::validate(&doc)
            .into_result(&id)
            .context("adopting a file without metadata needs --what and --keywords")?;
        write_document(&file, &frontmatter::render_markdown(&doc)?).await?;
    }

    let mut registry = store.load_required().await?;
    ensure_discoverable(&store, &mut registry, ws, &id)?;
    store.save(&mut registry).await?;
    register(&store, &id).await?;
    println!("Adopted {}", id);
    Ok(())
}

/// Add `id` to `settings.context_paths` unless discovery already finds it,
/// so later syncs keep it current.
fn ensure_discoverable(
    store: &RegistryStore,
    registry: &mut Registry,
    ws: &Workspace,
    id: &str,
) -> Result<()> {
    let patterns = scan::discovery_patterns(store, registry, &ws.config.scan);
    let mut builder = globset::GlobSetBuilder::new();
    for p in &patterns {
        builder.add(globset::Glob::new(p)?);
    }
    if builder.build()?.is_match(id) {
        return Ok(());
    }
    registry
        .settings
        .get_or_insert_with(Settings::default)
        .context_paths
        .push(ContextPath {
            path: id.to_string(),
            purpose: "adopted".to_string(),
        });
    Ok(())
}

/// `ctx migrate`: rewrite legacy structured documents as markdown.
pub async fn run_migrate(ws: &Workspace, global: bool) -> Result<()> {
    let store = ws.store(global)?;
    let mut registry = store.load_required().await?;

    let mut legacy: Vec<String> = registry
        .contexts
        .keys()
        .filter(|id| frontmatter::is_legacy_path(id))
        .cloned()
        .collect();
    let patterns = scan::discovery_patterns(&store, &registry, &ws.config.scan);
    for id in scan::scan_documents(
        store.base(),
        &patterns,
        &ws.config.scan.exclude_globs,
        ws.config.scan.follow_symlinks,
    )? {
        if frontmatter::is_legacy_path(&id) && !legacy.contains(&id) {
            legacy.push(id);
        }
    }

    let mut migrated = 0usize;
    let mut failed = 0usize;
    for old_id in legacy {
        match migrate_one(&store, &mut registry, &old_id).await {
            Ok(new_id) => {
                println!("  {} -> {}", old_id, new_id);
                migrated += 1;
            }
            Err(e) => {
                tracing::warn!(document = %old_id, error = %e, "migration failed");
                eprintln!("  ! {}: {:#}", old_id, e);
                failed += 1;
            }
        }
    }

    store.save(&mut registry).await?;
    println!("migrated: {}  failed: {}", migrated, failed);
    Ok(())
}

async fn migrate_one(store: &RegistryStore, registry: &mut Registry, old_id: &str) -> Result<String> {
    let old_path = store.document_path(old_id);
    let content = tokio::fs::read_to_string(&old_path)
        .await
        .map_err(|e| ContextError::io(&old_path, e))?;
    let mut doc = frontmatter::parse(old_id, &content)?;

    let stem = LEGACY_SUFFIXES
        .iter()
        .find_map(|s| old_id.strip_suffix(s))
        .unwrap_or(old_id);
    let new_id = format!("{}.ctx.md", stem);
    let new_path = store.document_path(&new_id);
    if new_path.exists() {
        bail!("{} already exists", new_path.display());
    }

    doc.source = new_id.clone();
    write_document(&new_path, &frontmatter::render_markdown(&doc)?).await?;
    tokio::fs::remove_file(&old_path)
        .await
        .map_err(|e| ContextError::io(&old_path, e))?;

    registry.contexts.remove(old_id);
    if let Some(entry) = document::build_entry(store, &new_id, None).await? {
        registry.contexts.insert(new_id.clone(), entry);
    }
    Ok(new_id)
}

// ═══════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════

/// Build the entry for `id` and write it into the store's registry.
async fn register(store: &RegistryStore, id: &str) -> Result<()> {
    let mut registry = store.load_required().await?;
    let entry = document::build_entry(store, id, registry.contexts.get(id))
        .await?
        .ok_or_else(|| ContextError::Validation {
            document: id.to_string(),
            errors: vec!["no valid 'what'/'keywords' metadata".to_string()],
        })?;
    registry.contexts.insert(id.to_string(), entry);
    store.save(&mut registry).await?;
    Ok(())
}

async fn write_document(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Map a user-supplied path to a registry identifier.
fn to_id(ws: &Workspace, store: &RegistryStore, path: &str) -> Result<String> {
    let id = store
        .document_id(&ws.resolve_path(Path::new(path)))
        .with_context(|| {
            format!(
                "{} is outside {}",
                path,
                store.base().display()
            )
        })?;
    Ok(id)
}

fn is_companion_path(name: &str) -> bool {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    file_name == "ctx.md" || file_name.ends_with(".ctx.md")
}

/// Identifier inside the contexts subtree for a short name. Names that
/// resolve outside the subtree are refused.
fn contexts_id(store: &RegistryStore, name: &str) -> Result<String> {
    let name = name.trim_matches('/');
    let name = name.strip_suffix(".md").unwrap_or(name);
    let prefix = store.contexts_prefix();
    let candidate = format!("{}/{}.md", prefix, name);
    match store.document_id(Path::new(&candidate)) {
        Some(id) if id.starts_with(&format!("{}/", prefix)) => Ok(id),
        _ => bail!("{} is outside {}", name, store.contexts_dir().display()),
    }
}

fn title_from(name: &str) -> String {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = file_name
        .strip_suffix(".ctx.md")
        .or_else(|| file_name.strip_suffix(".md"))
        .unwrap_or(file_name);
    if stem == "ctx" {
        // `dir/ctx.md` describes its directory.
        let mut parts = name.rsplit(['/', '\\']);
        parts.next();
        return parts.next().unwrap_or("project").to_string();
    }
    stem.to_string()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_ids_live_under_the_subtree() {
        let project = RegistryStore::project(Path::new("/repo"));
        assert_eq!(contexts_id(&project, "arch").unwrap(), ".ctx/contexts/arch.md");
        assert_eq!(
            contexts_id(&project, "arch.md").unwrap(),
            ".ctx/contexts/arch.md"
        );
        let global = RegistryStore::global(Path::new("/home/u"));
        assert_eq!(
            contexts_id(&global, "rust/style").unwrap(),
            "contexts/rust/style.md"
        );
    }

    #[test]
    fn contexts_ids_cannot_leave_the_subtree() {
        let project = RegistryStore::project(Path::new("/repo"));
        assert!(contexts_id(&project, "../../evil").is_err());
        assert!(contexts_id(&project, "../notes").is_err());
        assert_eq!(
            contexts_id(&project, "ops/../deploy").unwrap(),
            ".ctx/contexts/deploy.md"
        );
    }

    #[tokio::test]
    async fn paths_outside_the_project_are_refused() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("repo");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(
            outer.path().join("x.ctx.md"),
            "---\nwhat: X\nkeywords: [x]\n---\n",
        )
        .unwrap();
        let store = RegistryStore::project(&root);
        store.init().await.unwrap();
        let ws = Workspace::discover(&root, outer.path(), None).unwrap();

        assert!(run_add(&ws, "../x.ctx.md", false).await.is_err());
        assert!(run_sync(&ws, Some("../x.ctx.md"), false).await.is_err());
        assert!(
            run_create(&ws, "../../y.ctx.md", None, None, Vec::new(), false)
                .await
                .is_err()
        );
        assert!(store.load().await.contexts.is_empty());
        assert!(!outer.path().join("y.ctx.md").exists());
    }

    #[test]
    fn companion_paths_are_recognized() {
        assert!(is_companion_path("src/a.ctx.md"));
        assert!(is_companion_path("src/api/ctx.md"));
        assert!(!is_companion_path("architecture"));
        assert!(!is_companion_path("notes.md"));
    }

    #[test]
    fn titles_come_from_names() {
        assert_eq!(title_from("src/auth.ctx.md"), "auth");
        assert_eq!(title_from("src/api/ctx.md"), "api");
        assert_eq!(title_from("ctx.md"), "project");
        assert_eq!(title_from("deploy"), "deploy");
    }

    #[tokio::test]
    async fn adopt_records_undiscoverable_paths() {
        let dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let store = RegistryStore::project(dir.path());
        store.init().await.unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/guide.md"), "# Guide\n\nSteps.\n").unwrap();

        let ws = Workspace::discover(dir.path(), home.path(), None).unwrap();
        run_adopt(
            &ws,
            "docs/guide.md",
            Some("Setup guide".to_string()),
            vec!["setup".to_string()],
            None,
        )
        .await
        .unwrap();

        let reg = store.load().await;
        assert_eq!(reg.contexts["docs/guide.md"].preview.what, "Setup guide");
        assert!(reg
            .context_path_patterns()
            .contains(&"docs/guide.md".to_string()));
        let content = std::fs::read_to_string(dir.path().join("docs/guide.md")).unwrap();
        assert!(content.starts_with("---\n"));
        assert!(content.contains("# Guide"));
    }

    #[tokio::test]
    async fn adopt_without_metadata_or_flags_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::project(dir.path());
        store.init().await.unwrap();
        std::fs::write(dir.path().join("plain.md"), "# Plain\n").unwrap();

        let ws = Workspace::discover(dir.path(), dir.path(), None).unwrap();
        assert!(run_adopt(&ws, "plain.md", None, Vec::new(), None)
            .await
            .is_err());
        assert!(store.load().await.contexts.is_empty());
    }

    #[tokio::test]
    async fn migrate_rewrites_legacy_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::project(dir.path());
        store.init().await.unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/a.ctx.yml"),
            "meta:\n  version: 1.0.0\n  target: src/a.ts\nfrontmatter:\n  what: A\n  keywords: [a]\ncontent: Body\n",
        )
        .unwrap();
        let ws = Workspace::discover(dir.path(), dir.path(), None).unwrap();
        run_sync(&ws, None, false).await.unwrap();
        assert!(store.load().await.contexts.contains_key("src/a.ctx.yml"));

        run_migrate(&ws, false).await.unwrap();

        let reg = store.load().await;
        assert!(!reg.contexts.contains_key("src/a.ctx.yml"));
        let entry = &reg.contexts["src/a.ctx.md"];
        assert_eq!(entry.target.as_deref(), Some("src/a.ts"));
        assert!(!dir.path().join("src/a.ctx.yml").exists());
        let md = std::fs::read_to_string(dir.path().join("src/a.ctx.md")).unwrap();
        assert!(md.contains("Body"));
    }

    #[tokio::test]
    async fn remove_unknown_context_fails() {
        let dir = tempfile::tempdir().unwrap();
        RegistryStore::project(dir.path()).init().await.unwrap();
        let ws = Workspace::discover(dir.path(), dir.path(), None).unwrap();
        let err = run_remove(&ws, "nope.md", false).await.unwrap_err();
        assert!(err.to_string().contains("nope.md"));
    }
}

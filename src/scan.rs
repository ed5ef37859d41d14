//! Filesystem discovery of context documents.
//!
//! Walks a registry base with `walkdir`, keeping files whose base-relative path
//! matches a discovery pattern and no exclude pattern. Results are sorted.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::frontmatter::LEGACY_SUFFIXES;
use crate::models::{Registry, Scope};
use crate::registry::{RegistryKind, RegistryStore};

/// Document naming conventions searched in every project.
pub const PROJECT_PATTERNS: [&str; 6] = [
    "**/*.ctx.md",
    "**/ctx.md",
    ".ctx/contexts/**/*.md",
    "**/*.ctx.yml",
    "**/*.ctx.yaml",
    "**/*.ctx.json",
];

pub const GLOBAL_PATTERNS: [&str; 4] = [
    "contexts/**/*.md",
    "contexts/**/*.ctx.yml",
    "contexts/**/*.ctx.yaml",
    "contexts/**/*.ctx.json",
];

pub const DEFAULT_EXCLUDES: [&str; 3] = ["**/.git/**", "**/node_modules/**", "**/target/**"];

/// Companion file names: `<name>.ctx.md`, `ctx.md`, or a legacy `.ctx.*` file.
pub fn is_companion_name(file_name: &str) -> bool {
    file_name == "ctx.md"
        || file_name.ends_with(".ctx.md")
        || LEGACY_SUFFIXES.iter().any(|s| file_name.ends_with(s))
}

pub fn scope_for(id: &str) -> Scope {
    let file_name = id.rsplit('/').next().unwrap_or(id);
    if is_companion_name(file_name) {
        Scope::Local
    } else {
        Scope::Project
    }
}

/// Discovery patterns for a registry: built-ins, `settings.context_paths`,
/// and configured extras.
pub fn discovery_patterns(
    store: &RegistryStore,
    registry: &Registry,
    scan: &ScanConfig,
) -> Vec<String> {
    let builtin: &[&str] = match store.kind() {
        RegistryKind::Project => &PROJECT_PATTERNS,
        RegistryKind::Global => &GLOBAL_PATTERNS,
    };
    let mut patterns: Vec<String> = builtin.iter().map(|s| s.to_string()).collect();
    for p in registry
        .context_path_patterns()
        .into_iter()
        .chain(scan.include_globs.iter().cloned())
    {
        if !patterns.contains(&p) {
            patterns.push(p);
        }
    }
    patterns
}

/// Walk `base` and return sorted `/`-separated relative paths of files that
/// match `include` and not `exclude` (plus the built-in excludes).
pub fn scan_documents(
    base: &Path,
    include: &[String],
    exclude: &[String],
    follow_symlinks: bool,
) -> Result<Vec<String>> {
    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let include_set = build_globset(include)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(exclude.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut found = Vec::new();

    let walker = WalkDir::new(base).follow_links(follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable path during scan");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(base).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }
        found.push(rel_str);
    }

    // Sort for deterministic ordering
    found.sort();
    found.dedup();

    Ok(found)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(base: &Path, rel: &str) {
        let p = base.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, "x").unwrap();
    }

    fn project_patterns() -> Vec<String> {
        PROJECT_PATTERNS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn finds_companion_and_contexts_documents() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        touch(base, "src/a.ctx.md");
        touch(base, "src/a.ts");
        touch(base, "ctx.md");
        touch(base, "lib/ctx.md");
        touch(base, ".ctx/contexts/arch.md");
        touch(base, ".ctx/registry.yml");
        touch(base, "README.md");
        touch(base, "old/b.ctx.yml");

        let found = scan_documents(base, &project_patterns(), &[], false).unwrap();
        assert_eq!(
            found,
            vec![
                ".ctx/contexts/arch.md",
                "ctx.md",
                "lib/ctx.md",
                "old/b.ctx.yml",
                "src/a.ctx.md",
            ]
        );
    }

    #[test]
    fn default_and_configured_excludes_apply() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        touch(base, "node_modules/pkg/x.ctx.md");
        touch(base, "target/debug/y.ctx.md");
        touch(base, "vendor/z.ctx.md");
        touch(base, "src/keep.ctx.md");

        let found =
            scan_documents(base, &project_patterns(), &["vendor/**".to_string()], false).unwrap();
        assert_eq!(found, vec!["src/keep.ctx.md"]);
    }

    #[test]
    fn missing_base_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let found = scan_documents(&dir.path().join("nope"), &project_patterns(), &[], false);
        assert!(found.unwrap().is_empty());
    }

    #[test]
    fn scope_follows_file_name() {
        assert_eq!(scope_for("src/a.ctx.md"), Scope::Local);
        assert_eq!(scope_for("src/ctx.md"), Scope::Local);
        assert_eq!(scope_for("ctx.md"), Scope::Local);
        assert_eq!(scope_for("a.ctx.json"), Scope::Local);
        assert_eq!(scope_for(".ctx/contexts/arch.md"), Scope::Project);
        assert_eq!(scope_for("docs/myctx.md"), Scope::Project);
    }

    #[test]
    fn patterns_include_settings_and_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::project(dir.path());
        let registry = Registry {
            settings: Some(store.default_settings()),
            ..Registry::default()
        };
        let scan = ScanConfig {
            include_globs: vec!["docs/**/*.md".to_string()],
            ..ScanConfig::default()
        };
        let patterns = discovery_patterns(&store, &registry, &scan);
        assert!(patterns.contains(&"docs/**/*.md".to_string()));
        // The default context path duplicates a built-in and is not repeated.
        assert_eq!(
            patterns
                .iter()
                .filter(|p| p.as_str() == ".ctx/contexts/**/*.md")
                .count(),
            1
        );
    }
}

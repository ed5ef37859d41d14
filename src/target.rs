//! Target matching: which registry entries apply to a given file.
//!
//! A stored target is one of three kinds, decided in this order:
//!
//! 1. **Folder prefix**: ends with `/` (or `\`). Checked before the glob test,
//!    so `src/*/` is a folder, not a glob.
//! 2. **Glob**: contains `*`, `?`, or `[`. A single `*` does not cross a path
//!    separator; hidden files and directories are matched.
//! 3. **Exact** path otherwise.
//!
//! A single leading `/` on the stored target is ignored. When several entries
//! match, [`resolve`] ranks them: project exact (1), global exact (2),
//! project glob/folder (3), global glob/folder (4). Within one rank the
//! registry's key order is kept.

use globset::GlobBuilder;
use std::path::Path;

use crate::models::{ContextEntry, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Exact,
    Glob,
    Folder,
}

/// Which registry an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    Project,
    Global,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Project => "project",
            Origin::Global => "global",
        }
    }
}

/// A registry entry that applies to a candidate path.
#[derive(Debug, Clone)]
pub struct TargetMatch {
    pub id: String,
    pub entry: ContextEntry,
    pub origin: Origin,
    pub kind: TargetKind,
    pub rank: u8,
}

pub(crate) fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

pub fn classify(target: &str) -> TargetKind {
    if target.ends_with(is_separator) {
        TargetKind::Folder
    } else if target.contains(['*', '?', '[']) {
        TargetKind::Glob
    } else {
        TargetKind::Exact
    }
}

/// Rank a match; lower wins.
pub fn rank(origin: Origin, kind: TargetKind) -> u8 {
    match (kind, origin) {
        (TargetKind::Exact, Origin::Project) => 1,
        (TargetKind::Exact, Origin::Global) => 2,
        (_, Origin::Project) => 3,
        (_, Origin::Global) => 4,
    }
}

/// Make `candidate` relative to `root` with `/` separators.
///
/// Relative candidates are taken as already relative to `root`.
pub fn normalize_candidate(candidate: &Path, root: &Path) -> String {
    let relative = if candidate.is_absolute() {
        candidate.strip_prefix(root).unwrap_or(candidate)
    } else {
        candidate
    };
    let s = relative.to_string_lossy().replace('\\', "/");
    let mut s = s.as_str();
    while let Some(rest) = s.strip_prefix("./") {
        s = rest;
    }
    s.to_string()
}

/// Decide whether `candidate` satisfies the stored `target`.
pub fn matches(candidate: &Path, target: &str, root: &Path) -> bool {
    let rel = normalize_candidate(candidate, root);

    if classify(target) == TargetKind::Folder {
        let folder = target
            .trim_end_matches(is_separator)
            .trim_start_matches(is_separator)
            .replace('\\', "/");
        if folder.is_empty() {
            return true;
        }
        return rel == folder || rel.starts_with(&format!("{}/", folder));
    }

    let spec = target.strip_prefix(is_separator).unwrap_or(target);

    if classify(spec) == TargetKind::Glob {
        return match GlobBuilder::new(spec).literal_separator(true).build() {
            Ok(glob) => glob.compile_matcher().is_match(&rel),
            Err(e) => {
                tracing::debug!(pattern = spec, error = %e, "invalid glob target");
                false
            }
        };
    }

    rel == spec
}

/// Every entry in `registry` whose target matches `candidate`.
pub fn matching_entries(
    candidate: &Path,
    registry: &Registry,
    origin: Origin,
    root: &Path,
) -> Vec<TargetMatch> {
    registry
        .contexts
        .iter()
        .filter_map(|(id, entry)| {
            let target = entry.target.as_deref()?;
            if !matches(candidate, target, root) {
                return None;
            }
            let kind = classify(target);
            Some(TargetMatch {
                id: id.clone(),
                entry: entry.clone(),
                origin,
                kind,
                rank: rank(origin, kind),
            })
        })
        .collect()
}

/// Collect matches from both registries, best rank first.
pub fn resolve(
    candidate: &Path,
    project: Option<&Registry>,
    global: Option<&Registry>,
    root: &Path,
) -> Vec<TargetMatch> {
    let mut out = Vec::new();
    if let Some(reg) = project {
        out.extend(matching_entries(candidate, reg, Origin::Project, root));
    }
    if let Some(reg) = global {
        out.extend(matching_entries(candidate, reg, Origin::Global, root));
    }
    out.sort_by_key(|m| m.rank);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Preview, Scope};
    use chrono::Utc;

    fn root() -> &'static Path {
        Path::new("/repo")
    }

    fn m(candidate: &str, target: &str) -> bool {
        matches(Path::new(candidate), target, root())
    }

    fn registry(entries: &[(&str, Option<&str>)]) -> Registry {
        let mut reg = Registry::default();
        for (id, target) in entries {
            reg.contexts.insert(
                id.to_string(),
                ContextEntry {
                    source: id.to_string(),
                    target: target.map(str::to_string),
                    checksum: "c".to_string(),
                    target_checksum: None,
                    last_modified: Utc::now(),
                    preview: Preview {
                        what: id.to_string(),
                        keywords: vec!["k".to_string()],
                    },
                    scope: Scope::Local,
                },
            );
        }
        reg
    }

    #[test]
    fn exact_match() {
        assert!(m("src/a.ts", "src/a.ts"));
        assert!(!m("src/a.ts", "src/b.ts"));
    }

    #[test]
    fn leading_separator_is_ignored() {
        assert!(m("src/a.ts", "/src/a.ts"));
        assert!(m("src/a.ts", "/src/*.ts"));
    }

    #[test]
    fn absolute_candidate_is_made_relative() {
        assert!(m("/repo/src/a.ts", "src/a.ts"));
        assert!(m("./src/a.ts", "src/a.ts"));
    }

    #[test]
    fn glob_single_level() {
        assert!(m("src/a.ts", "src/*.ts"));
        assert!(!m("src/sub/a.ts", "src/*.ts"));
        assert!(m("src/sub/a.ts", "src/**/*.ts"));
        assert!(m("src/a1.ts", "src/a?.ts"));
        assert!(m("src/b.ts", "src/[ab].ts"));
    }

    #[test]
    fn glob_matches_dotfiles() {
        assert!(m(".github/workflows/ci.yml", "**/*.yml"));
        assert!(m("src/.env", "src/*"));
    }

    #[test]
    fn folder_prefix() {
        assert!(m("src/sub/file.ts", "src/"));
        assert!(m("src/sub/file.ts", "/src/sub/"));
        assert!(m("src", "src/"));
        assert!(!m("srcx/file.ts", "src/"));
    }

    #[test]
    fn folder_check_wins_over_glob() {
        assert_eq!(classify("src/*/"), TargetKind::Folder);
        assert!(!m("src/a/b.ts", "src/*/"));
        assert!(m("src/*/b.ts", "src/*/"));
    }

    #[test]
    fn invalid_glob_never_matches() {
        assert!(!m("src/a.ts", "src/[a.ts"));
    }

    #[test]
    fn rank_table() {
        assert_eq!(rank(Origin::Project, TargetKind::Exact), 1);
        assert_eq!(rank(Origin::Global, TargetKind::Exact), 2);
        assert_eq!(rank(Origin::Project, TargetKind::Glob), 3);
        assert_eq!(rank(Origin::Project, TargetKind::Folder), 3);
        assert_eq!(rank(Origin::Global, TargetKind::Glob), 4);
    }

    #[test]
    fn resolve_orders_exact_project_before_global_glob() {
        let global = registry(&[("ts.md", Some("**/*.ts"))]);
        let project = registry(&[("src/a.ctx.md", Some("src/a.ts"))]);
        let out = resolve(Path::new("src/a.ts"), Some(&project), Some(&global), root());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "src/a.ctx.md");
        assert_eq!(out[0].rank, 1);
        assert_eq!(out[1].rank, 4);
        assert_eq!(out[1].origin, Origin::Global);
    }

    #[test]
    fn standalone_entries_never_match() {
        let project = registry(&[("notes.md", None)]);
        assert!(resolve(Path::new("src/a.ts"), Some(&project), None, root()).is_empty());
    }

    #[test]
    fn same_rank_keeps_key_order() {
        let project = registry(&[("b.md", Some("src/*.ts")), ("a.md", Some("src/"))]);
        let out = resolve(Path::new("src/x.ts"), Some(&project), None, root());
        let ids: Vec<_> = out.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a.md", "b.md"]);
    }
}

//! Metadata extraction for context documents.
//!
//! Two encodings normalize into one [`ParsedDocument`]:
//!
//! ```text
//! ---                          meta:
//! what: Auth middleware          version: 1.0.0
//! keywords: [auth, session]      target: src/auth.rs
//! target: src/auth.rs          frontmatter:
//! ---                            what: Auth middleware
//! Body text...                   keywords: [auth, session]
//!                              content: |
//!                                Body text...
//! ```
//!
//! The left form is a markdown document (`*.md`); the right is the legacy
//! structured file (`*.ctx.yml`, `*.ctx.yaml`, `*.ctx.json`). Dispatch
//! happens on the file extension in [`parse`] and nowhere else.

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::error::{ContextError, Result};
use crate::models::{Preview, DEFAULT_DOCUMENT_VERSION};

/// Extensions of the legacy structured encoding.
pub const LEGACY_SUFFIXES: [&str; 3] = [".ctx.yml", ".ctx.yaml", ".ctx.json"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    pub version: String,
    /// Authoritative when present; overrides filename inference.
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frontmatter {
    pub what: String,
    pub keywords: Vec<String>,
    pub future: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub source: String,
    pub meta: DocumentMeta,
    pub frontmatter: Frontmatter,
    pub body: String,
}

impl ParsedDocument {
    pub fn preview(&self) -> Preview {
        Preview {
            what: self.frontmatter.what.clone(),
            keywords: self.frontmatter.keywords.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Validation {
    /// Convert a failed validation into a [`ContextError::Validation`].
    pub fn into_result(self, source: &str) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(ContextError::Validation {
                document: source.to_string(),
                errors: self.errors,
            })
        }
    }
}

/// Returns `true` if `path` uses the legacy structured encoding.
pub fn is_legacy_path(path: &str) -> bool {
    LEGACY_SUFFIXES.iter().any(|s| path.ends_with(s))
}

/// Strictly parse a document, choosing the encoding from the identifier.
pub fn parse(source: &str, content: &str) -> Result<ParsedDocument> {
    if is_legacy_path(source) {
        parse_structured(source, content)
    } else {
        parse_markdown(source, content)
    }
}

/// Lenient preview extraction: `None` unless the document parses and has a
/// valid preview.
pub fn extract_preview(source: &str, content: &str) -> Option<Preview> {
    let doc = parse(source, content).ok()?;
    let preview = doc.preview();
    preview.is_valid().then_some(preview)
}

/// Check required fields. A missing `target` is not an error.
pub fn validate(doc: &ParsedDocument) -> Validation {
    let mut errors = Vec::new();
    if doc.meta.version.trim().is_empty() {
        errors.push("missing meta.version".to_string());
    }
    if doc.frontmatter.what.trim().is_empty() {
        errors.push("missing or empty 'what'".to_string());
    }
    if doc.frontmatter.keywords.is_empty() {
        errors.push("missing or empty 'keywords'".to_string());
    }
    Validation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Split a markdown document into its metadata block and body.
///
/// The first line must be `---` (an optional BOM is allowed); the block ends
/// at the next `---` or `...` line.
pub fn split_frontmatter(content: &str) -> Option<(String, String)> {
    let content = content.trim_start_matches('\u{feff}');
    let mut lines = content.split_inclusive('\n');

    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }

    let mut yaml = String::new();
    let mut consumed = first.len();
    let mut closed = false;
    for line in lines.by_ref() {
        consumed += line.len();
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            closed = true;
            break;
        }
        yaml.push_str(line);
    }
    if !closed {
        return None;
    }

    let body = content[consumed..].trim_start_matches(['\r', '\n']);
    Some((yaml, body.to_string()))
}

fn parse_markdown(source: &str, content: &str) -> Result<ParsedDocument> {
    let (yaml, body) = split_frontmatter(content)
        .ok_or_else(|| ContextError::parse(source, "missing metadata block"))?;
    let map = parse_mapping(source, &yaml)?;

    Ok(ParsedDocument {
        source: source.to_string(),
        meta: DocumentMeta {
            version: get_str(&map, "version")
                .unwrap_or_else(|| DEFAULT_DOCUMENT_VERSION.to_string()),
            target: get_str(&map, "target"),
        },
        frontmatter: read_fields(&map),
        body,
    })
}

fn parse_structured(source: &str, content: &str) -> Result<ParsedDocument> {
    let map = parse_mapping(source, content)?;

    let meta = match map.get("meta") {
        Some(Value::Mapping(m)) => m.clone(),
        Some(_) => return Err(ContextError::parse(source, "'meta' must be a mapping")),
        None => return Err(ContextError::parse(source, "missing 'meta' object")),
    };
    let fields = match map.get("frontmatter").or_else(|| map.get("fields")) {
        Some(Value::Mapping(m)) => m.clone(),
        Some(_) => {
            return Err(ContextError::parse(
                source,
                "'frontmatter' must be a mapping",
            ))
        }
        None => return Err(ContextError::parse(source, "missing 'frontmatter' object")),
    };

    let body = get_str(&map, "content")
        .or_else(|| get_str(&map, "body"))
        .unwrap_or_default();

    Ok(ParsedDocument {
        source: source.to_string(),
        meta: DocumentMeta {
            version: get_str(&meta, "version")
                .unwrap_or_else(|| DEFAULT_DOCUMENT_VERSION.to_string()),
            target: get_str(&meta, "target").or_else(|| get_str(&fields, "target")),
        },
        frontmatter: read_fields(&fields),
        body,
    })
}

fn parse_mapping(source: &str, text: &str) -> Result<Mapping> {
    let value: Value = serde_yaml::from_str(text).map_err(|e| ContextError::parse(source, e))?;
    match value {
        Value::Mapping(map) => Ok(map),
        _ => Err(ContextError::parse(source, "metadata block is not a mapping")),
    }
}

fn read_fields(map: &Mapping) -> Frontmatter {
    Frontmatter {
        what: get_str(map, "what").unwrap_or_default(),
        keywords: get_list(map, "keywords"),
        future: get_list(map, "future"),
    }
}

fn get_str(map: &Mapping, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A sequence of scalars, or a comma-separated string.
fn get_list(map: &Mapping, key: &str) -> Vec<String> {
    let items: Vec<String> = match map.get(key) {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Serialize)]
struct RenderedFrontmatter<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
    what: &'a str,
    keywords: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    future: &'a [String],
    version: &'a str,
}

/// Render a document back to the markdown encoding.
pub fn render_markdown(doc: &ParsedDocument) -> Result<String> {
    let block = RenderedFrontmatter {
        target: doc.meta.target.as_deref(),
        what: &doc.frontmatter.what,
        keywords: &doc.frontmatter.keywords,
        future: &doc.frontmatter.future,
        version: &doc.meta.version,
    };
    let yaml = serde_yaml::to_string(&block).map_err(|e| ContextError::parse(&doc.source, e))?;

    let mut out = format!("---\n{}---\n", yaml);
    if !doc.body.is_empty() {
        out.push('\n');
        out.push_str(&doc.body);
        if !doc.body.ends_with('\n') {
            out.push('\n');
        }
    }
    Ok(out)
}

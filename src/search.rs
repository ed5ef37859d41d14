//! Keyword relevance lookup over registry previews.
//!
//! Each entry's corpus is its `what` plus all keywords, lowercased. The score
//! is the number of query keywords found as substrings of that corpus.
//! Project hits are doubled before merging with global hits so equally
//! relevant project contexts sort first.

use crate::models::{ContextEntry, Registry};
use crate::target::Origin;

/// Weight applied to project-origin scores when merging registries.
pub const PROJECT_WEIGHT: usize = 2;

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub entry: ContextEntry,
    pub origin: Origin,
    pub score: usize,
}

fn corpus(entry: &ContextEntry) -> String {
    let mut text = entry.preview.what.to_lowercase();
    for kw in &entry.preview.keywords {
        text.push(' ');
        text.push_str(&kw.to_lowercase());
    }
    text
}

/// Count how many query keywords occur in the entry's corpus.
pub fn score(query: &[String], entry: &ContextEntry) -> usize {
    let text = corpus(entry);
    query
        .iter()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty() && text.contains(q.as_str()))
        .count()
}

/// Score entries of one registry; zero scores are dropped and ties keep
/// registry order.
pub fn search<'a>(
    query: &[String],
    entries: impl IntoIterator<Item = (&'a String, &'a ContextEntry)>,
    origin: Origin,
) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = entries
        .into_iter()
        .filter_map(|(id, entry)| {
            let score = score(query, entry);
            (score > 0).then(|| SearchHit {
                id: id.clone(),
                entry: entry.clone(),
                origin,
                score,
            })
        })
        .collect();
    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits
}

/// Search both registries and merge, project scores weighted.
pub fn search_all(
    query: &[String],
    project: Option<&Registry>,
    global: Option<&Registry>,
) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    if let Some(reg) = project {
        hits.extend(
            search(query, &reg.contexts, Origin::Project)
                .into_iter()
                .map(|mut h| {
                    h.score *= PROJECT_WEIGHT;
                    h
                }),
        );
    }
    if let Some(reg) = global {
        hits.extend(search(query, &reg.contexts, Origin::Global));
    }
    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits
}

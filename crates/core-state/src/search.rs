//! Substring search over labels and ids.
//!
//! Matching is ASCII case-insensitive and reports `[start, end)` byte ranges
//! into the original field text, tagged with the field that matched, so a UI
//! can highlight occurrences without re-deriving offsets. Results follow
//! store insertion order: all nodes first, then all containers.

use core_graph::{ElementKind, GraphStore};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Id,
    Label,
    LongLabel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub field: SearchField,
    /// Half-open byte range into the matched field's text.
    pub range: (usize, usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub label: String,
    pub kind: ElementKind,
    pub matches: Vec<SearchMatch>,
}

pub fn perform_search(store: &GraphStore, query: &str) -> Vec<SearchResult> {
    if query.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for node in store.nodes().iter() {
        let mut matches = Vec::new();
        push_matches(&mut matches, SearchField::Id, &node.id, query);
        push_matches(&mut matches, SearchField::Label, &node.short_label, query);
        push_matches(&mut matches, SearchField::LongLabel, &node.long_label, query);
        if !matches.is_empty() {
            out.push(SearchResult {
                id: node.id.clone(),
                label: node.short_label.clone(),
                kind: ElementKind::Node,
                matches,
            });
        }
    }
    for container in store.containers().iter() {
        let mut matches = Vec::new();
        push_matches(&mut matches, SearchField::Id, &container.id, query);
        push_matches(&mut matches, SearchField::Label, &container.label, query);
        push_matches(
            &mut matches,
            SearchField::LongLabel,
            &container.long_label,
            query,
        );
        if !matches.is_empty() {
            out.push(SearchResult {
                id: container.id.clone(),
                label: container.label.clone(),
                kind: ElementKind::Container,
                matches,
            });
        }
    }
    tracing::debug!(target: "state.search", query, hits = out.len(), "search");
    out
}

fn push_matches(out: &mut Vec<SearchMatch>, field: SearchField, haystack: &str, query: &str) {
    for range in find_all_ignore_ascii_case(haystack, query) {
        out.push(SearchMatch { field, range });
    }
}

/// All non-overlapping occurrences of `needle` in `haystack`, ASCII
/// case-insensitive, as byte ranges into `haystack`.
fn find_all_ignore_ascii_case(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    let needle_len = needle.len();
    if needle_len == 0 || haystack.len() < needle_len {
        return Vec::new();
    }
    let hay = haystack.as_bytes();
    let mut ranges = Vec::new();
    let mut start = 0;
    while start + needle_len <= hay.len() {
        // Candidate windows must begin on a char boundary.
        if haystack.is_char_boundary(start)
            && haystack.is_char_boundary(start + needle_len)
            && haystack[start..start + needle_len].eq_ignore_ascii_case(needle)
        {
            ranges.push((start, start + needle_len));
            start += needle_len;
        } else {
            start += 1;
        }
    }
    ranges
}

//! Query side of fandex: open a persisted index and turn ranked hits into
//! displayable results (title, URL, highlighted snippet).

use fandex_core::persist::{load_index, load_meta, IndexPaths, MetaFile};
use fandex_core::tokenizer::is_stopword;
use fandex_core::{count_matches, search, CharacterProfile, IndexError, InvertedIndex};
use regex::RegexBuilder;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

const SNIPPET_BEFORE: usize = 60;
const SNIPPET_AFTER: usize = 180;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("cannot open index at {dir}: {source}\nrebuild it with `indexer build --input <corpus> --output {dir}`")]
    IndexUnavailable { dir: PathBuf, source: IndexError },
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    /// Documents matching at least one query term, before truncation to `k`.
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub doc_id: u32,
    pub score: f64,
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<CharacterProfile>,
}

pub struct Searcher {
    root: PathBuf,
    index: InvertedIndex,
    meta: Option<MetaFile>,
}

impl Searcher {
    pub fn open(dir: &Path) -> Result<Self, SearchError> {
        let paths = IndexPaths::new(dir);
        let unavailable = |source| SearchError::IndexUnavailable { dir: dir.to_path_buf(), source };
        let index = load_index(&paths).map_err(unavailable)?;
        let meta = match load_meta(&paths) {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(error = %e, "meta.json unreadable, continuing without it");
                None
            }
        };
        tracing::info!(
            root = %dir.display(),
            docs = index.total_documents,
            terms = index.num_terms(),
            created_at = meta.as_ref().map(|m| m.created_at.as_str()).unwrap_or("unknown"),
            "index loaded"
        );
        Ok(Self { root: dir.to_path_buf(), index, meta })
    }

    pub fn index(&self) -> &InvertedIndex { &self.index }

    pub fn meta(&self) -> Option<&MetaFile> { self.meta.as_ref() }

    pub fn root(&self) -> &Path { &self.root }

    pub fn search(&self, query: &str, k: usize) -> SearchResponse {
        let start = Instant::now();
        let hits = search(&self.index, query, k);
        let total_hits = if hits.is_empty() { 0 } else { count_matches(&self.index, query) };
        let raw_terms = highlight_terms_of(query);

        let results = hits
            .iter()
            .enumerate()
            .filter_map(|(i, hit)| {
                let meta = self.index.docs.get(&hit.doc_id)?;
                Some(SearchHit {
                    rank: i + 1,
                    doc_id: hit.doc_id,
                    score: hit.score,
                    title: meta.title.clone(),
                    url: meta.url.clone(),
                    snippet: snippet_from_excerpt(&meta.excerpt, &raw_terms),
                    profile: (!meta.profile.is_empty()).then(|| meta.profile.clone()),
                })
            })
            .collect();

        let took_s = start.elapsed().as_secs_f64();
        tracing::debug!(query, total_hits, took_s, "query answered");
        SearchResponse { query: query.to_string(), took_s, total_hits, results }
    }
}

/// Plain-text rendering for a terminal.
pub fn render_text(resp: &SearchResponse) -> String {
    if resp.results.is_empty() {
        return "No results found.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} of {} result(s) for {:?} ({:.3}s)\n",
        resp.results.len(),
        resp.total_hits,
        resp.query,
        resp.took_s
    );
    for hit in &resp.results {
        let title = if hit.title.is_empty() { "(untitled)" } else { hit.title.as_str() };
        let _ = writeln!(out, "{:>3}. {}  [{:.4}]", hit.rank, title, hit.score);
        let _ = writeln!(out, "     {}", hit.url);
        if let Some(s) = &hit.snippet {
            let _ = writeln!(out, "     {}", s);
        }
        if let Some(profile) = &hit.profile {
            for (section, fields) in profile.sections() {
                let _ = writeln!(out, "     {section}");
                for (label, value) in fields {
                    let _ = writeln!(out, "       {label}: {value}");
                }
            }
        }
        out.push('\n');
    }
    out
}

/// Raw query words worth highlighting: punctuation trimmed, stopwords dropped.
fn highlight_terms_of(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in query.split_whitespace() {
        let w = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        if w.is_empty() || is_stopword(&w) || terms.contains(&w) { continue; }
        terms.push(w);
    }
    terms
}

fn snippet_from_excerpt(text: &str, raw_terms: &[String]) -> Option<String> {
    if text.trim().is_empty() { return None; }
    let first_idx = raw_terms.iter().find_map(|t| find_case_insensitive(text, t));
    let snippet = match first_idx {
        Some(idx) => {
            let start = floor_boundary(text, idx.saturating_sub(SNIPPET_BEFORE));
            let end = ceil_boundary(text, (idx + SNIPPET_AFTER).min(text.len()));
            let mut s = String::new();
            if start > 0 { s.push_str("..."); }
            s.push_str(text[start..end].trim());
            if end < text.len() { s.push_str("..."); }
            s
        }
        None => {
            let head: String = text.chars().take(SNIPPET_BEFORE + SNIPPET_AFTER).collect();
            if head.len() < text.len() { format!("{}...", head.trim_end()) } else { head }
        }
    };
    Some(highlight_terms(&snippet, raw_terms))
}

fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.to_lowercase();
    let idx = h.find(&needle.to_lowercase())?;
    // lowercasing may change byte lengths outside ASCII
    if h.len() == haystack.len() && haystack.is_char_boundary(idx) { Some(idx) } else { Some(0) }
}

fn floor_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) { i -= 1; }
    i
}

fn ceil_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) { i += 1; }
    i
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    if terms.is_empty() { return snippet.to_string(); }
    let alternation = terms.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
    match RegexBuilder::new(&alternation).case_insensitive(true).build() {
        Ok(pat) => pat.replace_all(snippet, |caps: &regex::Captures| format!("**{}**", &caps[0])).into_owned(),
        Err(_) => snippet.to_string(),
    }
}

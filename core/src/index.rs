use crate::profile::CharacterProfile;
use crate::tokenizer::Analyzer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type DocId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    /// Crawler-assigned id (SHA-1 of the normalized URL).
    pub external_id: String,
    pub url: String,
    pub title: String,
    /// Leading slice of the document text, used for result snippets.
    pub excerpt: String,
    /// Infobox fields found in the text; empty for non-character pages.
    #[serde(default)]
    pub profile: CharacterProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocStats {
    pub doc_id: DocId,
    /// Number of terms after normalization.
    pub length: u32,
}

/// Immutable inverted index. Ordered maps keep serialization byte-stable for a
/// given corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub postings: BTreeMap<String, Vec<Posting>>, // postings sorted by doc_id
    pub doc_stats: BTreeMap<DocId, DocStats>,
    pub docs: BTreeMap<DocId, DocMeta>,
    pub total_documents: u32,
    pub average_document_length: f64,
    pub analyzer: Analyzer,
}

impl InvertedIndex {
    /// Assemble an index from finished postings and stats, computing the
    /// global statistics. Postings lists are sorted here.
    pub fn from_parts(
        mut postings: BTreeMap<String, Vec<Posting>>,
        doc_stats: BTreeMap<DocId, DocStats>,
        docs: BTreeMap<DocId, DocMeta>,
        analyzer: Analyzer,
    ) -> Self {
        for plist in postings.values_mut() {
            plist.sort_by_key(|p| p.doc_id);
        }
        let total_documents = doc_stats.len() as u32;
        let total_length: u64 = doc_stats.values().map(|s| s.length as u64).sum();
        let average_document_length = if total_documents == 0 { 0.0 } else { total_length as f64 / total_documents as f64 };
        Self { postings, doc_stats, docs, total_documents, average_document_length, analyzer }
    }

    pub fn postings(&self, term: &str) -> Option<&[Posting]> { self.postings.get(term).map(Vec::as_slice) }

    pub fn doc_length(&self, doc_id: DocId) -> Option<u32> { self.doc_stats.get(&doc_id).map(|s| s.length) }

    pub fn num_terms(&self) -> usize { self.postings.len() }

    /// Check the structural invariants: sorted, duplicate-free postings, a
    /// stats entry for every posted document and vice versa, consistent
    /// totals. Returns a description of the first violation.
    pub fn check_consistency(&self) -> Result<(), String> {
        let mut referenced: BTreeSet<DocId> = BTreeSet::new();
        for (term, plist) in &self.postings {
            if plist.is_empty() {
                return Err(format!("term {term:?} has an empty postings list"));
            }
            for pair in plist.windows(2) {
                if pair[0].doc_id >= pair[1].doc_id {
                    return Err(format!("postings for {term:?} are not strictly ordered by doc id"));
                }
            }
            for p in plist {
                if !self.doc_stats.contains_key(&p.doc_id) {
                    return Err(format!("term {term:?} references doc {} without stats", p.doc_id));
                }
                referenced.insert(p.doc_id);
            }
        }
        if let Some(orphan) = self.doc_stats.keys().find(|id| !referenced.contains(id)) {
            return Err(format!("doc {orphan} has stats but appears in no postings list"));
        }
        if self.total_documents as usize != self.doc_stats.len() {
            return Err(format!("total_documents is {} but {} docs have stats", self.total_documents, self.doc_stats.len()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(doc_id: DocId, length: u32) -> (DocId, DocStats) { (doc_id, DocStats { doc_id, length }) }

    #[test]
    fn from_parts_sorts_and_averages() {
        let mut postings = BTreeMap::new();
        postings.insert("hulk".to_string(), vec![Posting { doc_id: 3, tf: 1 }, Posting { doc_id: 1, tf: 2 }]);
        let doc_stats: BTreeMap<_, _> = [stats(1, 4), stats(3, 2)].into_iter().collect();
        let idx = InvertedIndex::from_parts(postings, doc_stats, BTreeMap::new(), Analyzer::default());
        assert_eq!(idx.postings("hulk").unwrap()[0].doc_id, 1);
        assert_eq!(idx.total_documents, 2);
        assert!((idx.average_document_length - 3.0).abs() < f64::EPSILON);
        assert!(idx.check_consistency().is_ok());
    }

    #[test]
    fn detects_orphan_stats() {
        let mut postings = BTreeMap::new();
        postings.insert("thor".to_string(), vec![Posting { doc_id: 0, tf: 1 }]);
        let doc_stats: BTreeMap<_, _> = [stats(0, 1), stats(9, 1)].into_iter().collect();
        let idx = InvertedIndex::from_parts(postings, doc_stats, BTreeMap::new(), Analyzer::default());
        assert!(idx.check_consistency().unwrap_err().contains("doc 9"));
    }
}

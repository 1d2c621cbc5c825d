//! BM25 ranking over an [`InvertedIndex`].

use crate::{DocId, InvertedIndex};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25 {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25 {
    fn default() -> Self { Self { k1: 1.2, b: 0.75 } }
}

impl Bm25 {
    /// `ln(1 + (N - df + 0.5) / (df + 0.5))`; positive whenever `df <= N`.
    pub fn idf(&self, total_docs: u32, df: usize) -> f64 {
        let n = total_docs as f64;
        let df = df as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    pub fn term_weight(&self, tf: u32, doc_len: u32, avg_len: f64) -> f64 {
        if tf == 0 { return 0.0; }
        let tf = tf as f64;
        let norm = if avg_len > 0.0 { doc_len as f64 / avg_len } else { 1.0 };
        tf * (self.k1 + 1.0) / (tf + self.k1 * (1.0 - self.b + self.b * norm))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f64,
}

/// Descending score, then ascending doc id.
fn rank_order(a: &ScoredDoc, b: &ScoredDoc) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id))
}

/// Rank documents for `query` and return at most `k` of them.
///
/// The query is normalized with the analyzer stored in the index. Terms the
/// index has never seen contribute nothing; a query with no usable terms
/// returns an empty list.
pub fn search(index: &InvertedIndex, query: &str, k: usize) -> Vec<ScoredDoc> {
    search_with(index, query, k, &Bm25::default())
}

pub fn search_with(index: &InvertedIndex, query: &str, k: usize, params: &Bm25) -> Vec<ScoredDoc> {
    if k == 0 { return Vec::new(); }
    // BTreeMap keeps the per-term accumulation order fixed, so float sums are
    // reproducible run to run.
    let mut query_tf: BTreeMap<String, u32> = BTreeMap::new();
    for term in index.analyzer.normalize(query) {
        *query_tf.entry(term).or_insert(0) += 1;
    }
    if query_tf.is_empty() { return Vec::new(); }

    let mut scores: HashMap<DocId, f64> = HashMap::new();
    for (term, qtf) in &query_tf {
        let Some(postings) = index.postings(term) else { continue };
        let idf = params.idf(index.total_documents, postings.len());
        for p in postings {
            let doc_len = index.doc_length(p.doc_id).unwrap_or(0);
            let w = idf * params.term_weight(p.tf, doc_len, index.average_document_length);
            *scores.entry(p.doc_id).or_insert(0.0) += w * *qtf as f64;
        }
    }

    let mut ranked: Vec<ScoredDoc> = scores.into_iter().map(|(doc_id, score)| ScoredDoc { doc_id, score }).collect();
    if ranked.len() > k {
        ranked.select_nth_unstable_by(k - 1, rank_order);
        ranked.truncate(k);
    }
    ranked.sort_by(rank_order);
    ranked
}

/// Number of documents containing at least one of the query's terms.
pub fn count_matches(index: &InvertedIndex, query: &str) -> usize {
    let terms: BTreeSet<String> = index.analyzer.normalize(query).into_iter().collect();
    let matched: HashSet<DocId> = terms
        .iter()
        .filter_map(|t| index.postings(t))
        .flat_map(|plist| plist.iter().map(|p| p.doc_id))
        .collect();
    matched.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{DocStats, Posting};
    use crate::tokenizer::Analyzer;

    fn index_of(docs: &[(DocId, &[(&str, u32)])]) -> InvertedIndex {
        let mut postings: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
        let mut stats = BTreeMap::new();
        for (doc_id, terms) in docs {
            let length = terms.iter().map(|(_, tf)| tf).sum();
            stats.insert(*doc_id, DocStats { doc_id: *doc_id, length });
            for (term, tf) in terms.iter() {
                postings.entry(term.to_string()).or_default().push(Posting { doc_id: *doc_id, tf: *tf });
            }
        }
        InvertedIndex::from_parts(postings, stats, BTreeMap::new(), Analyzer::new(false))
    }

    #[test]
    fn idf_is_positive_even_for_common_terms() {
        let bm = Bm25::default();
        assert!(bm.idf(10, 10) > 0.0);
        assert!(bm.idf(10, 1) > bm.idf(10, 9));
    }

    #[test]
    fn empty_and_unknown_queries_return_nothing() {
        let idx = index_of(&[(0, &[("hulk", 1)])]);
        assert!(search(&idx, "", 5).is_empty());
        assert!(search(&idx, "the and of", 5).is_empty());
        assert!(search(&idx, "zzz-nonexistent-term", 5).is_empty());
        assert!(search(&idx, "hulk", 0).is_empty());
    }

    #[test]
    fn ties_break_by_doc_id_and_k_truncates() {
        let idx = index_of(&[(4, &[("loki", 1)]), (2, &[("loki", 1)]), (7, &[("loki", 1)]), (1, &[("odin", 1)])]);
        let hits = search(&idx, "loki", 2);
        assert_eq!(hits.iter().map(|h| h.doc_id).collect::<Vec<_>>(), vec![2, 4]);
        assert_eq!(hits[0].score, hits[1].score);
    }

    #[test]
    fn higher_term_frequency_never_lowers_score() {
        let other: &[(&str, u32)] = &[("thor", 1), ("hammer", 2)];
        let mut prev = 0.0;
        for tf in 1..6 {
            let target: Vec<(&str, u32)> = vec![("thor", tf), ("asgard", 3)];
            let idx = index_of(&[(0, target.as_slice()), (1, other), (2, &[("asgard", 1)])]);
            let score = search(&idx, "thor", 10).into_iter().find(|h| h.doc_id == 0).unwrap().score;
            assert!(score >= prev, "tf={tf} score {score} < {prev}");
            prev = score;
        }
    }

    #[test]
    fn results_sorted_non_increasing() {
        let idx = index_of(&[
            (0, &[("stark", 1), ("iron", 3)]),
            (1, &[("stark", 4)]),
            (2, &[("iron", 1), ("man", 1)]),
            (3, &[("pepper", 2)]),
        ]);
        let hits = search(&idx, "iron stark man", 10);
        assert_eq!(hits.len(), 3);
        assert_eq!(count_matches(&idx, "iron stark man"), 3);
        assert_eq!(count_matches(&idx, "pepper pepper"), 1);
        for pair in hits.windows(2) {
            assert!(pair[0].score > pair[1].score || (pair[0].score == pair[1].score && pair[0].doc_id < pair[1].doc_id));
        }
    }
}

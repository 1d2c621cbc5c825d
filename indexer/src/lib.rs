//! Parallel construction of the inverted index from a crawled corpus.
//!
//! Documents are fed through a bounded channel to a fixed pool of worker
//! threads. Each worker analyzes one document at a time and merges its term
//! frequencies into [`ShardedPostings`]. After the pool has drained and
//! joined, the postings are sorted and the global statistics computed, so the
//! result does not depend on the number of workers or on scheduling.

pub mod shard;

use fandex_core::persist::{save_index, IndexPaths, MetaFile};
use fandex_core::tokenizer::Analyzer;
use fandex_core::{CharacterProfile, DocId, DocMeta, DocStats, Document, IndexError, InvertedIndex};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::thread;
use std::time::{Duration, Instant};

pub use shard::{ShardedPostings, SHARD_COUNT};

/// Characters of body text kept per document for result snippets.
pub const EXCERPT_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub max_workers: usize,
    pub analyzer: Analyzer,
}

impl BuildOptions {
    pub fn new(max_workers: usize) -> Self { Self { max_workers, analyzer: Analyzer::default() } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing left after normalization (empty or all stopwords).
    NoTerms,
    /// An earlier corpus entry already had this URL.
    DuplicateUrl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub position: usize,
    pub url: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub indexed: usize,
    pub skipped: Vec<SkippedDocument>,
    pub workers: usize,
    pub elapsed: Duration,
}

/// Term frequencies of a document's title and text.
pub fn analyze_document(analyzer: &Analyzer, doc: &Document) -> HashMap<String, u32> {
    let mut tf: HashMap<String, u32> = HashMap::new();
    for term in analyzer.normalize(&doc.title).into_iter().chain(analyzer.normalize(&doc.text)) {
        *tf.entry(term).or_insert(0) += 1;
    }
    tf
}

/// Build an index from `corpus` with `opts.max_workers` threads.
///
/// Documents without any terms and repeated URLs are skipped and listed in
/// the report. If any worker panics the whole build is discarded.
pub fn build_index(corpus: &[Document], opts: &BuildOptions) -> Result<(InvertedIndex, BuildReport), IndexError> {
    let analyzer = opts.analyzer;
    build_with(corpus, opts, move |doc| analyze_document(&analyzer, doc))
}

/// Build, then persist to `paths`. Nothing is written unless the build succeeds.
pub fn build_and_save(
    corpus: &[Document],
    opts: &BuildOptions,
    paths: &IndexPaths,
) -> Result<(InvertedIndex, BuildReport, MetaFile), IndexError> {
    let (index, report) = build_index(corpus, opts)?;
    let meta = save_index(paths, &index)?;
    tracing::info!(root = %paths.root.display(), docs = meta.num_docs, terms = meta.num_terms, "index persisted");
    Ok((index, report, meta))
}

fn build_with<F>(corpus: &[Document], opts: &BuildOptions, analyze: F) -> Result<(InvertedIndex, BuildReport), IndexError>
where
    F: Fn(&Document) -> HashMap<String, u32> + Sync,
{
    let start = Instant::now();
    let workers = opts.max_workers.max(1);
    let mut skipped: Vec<SkippedDocument> = Vec::new();

    // Doc ids are corpus positions, fixed before any work is scheduled.
    let mut seen_urls: HashSet<&str> = HashSet::new();
    let mut work: Vec<(DocId, &Document)> = Vec::with_capacity(corpus.len());
    for (position, doc) in corpus.iter().enumerate() {
        if !seen_urls.insert(doc.url.as_str()) {
            tracing::warn!(url = %doc.url, position, "duplicate URL in corpus, skipping");
            skipped.push(SkippedDocument { position, url: doc.url.clone(), reason: SkipReason::DuplicateUrl });
            continue;
        }
        work.push((position as DocId, doc));
    }

    let postings = ShardedPostings::new(SHARD_COUNT);
    let docs: Mutex<BTreeMap<DocId, (u32, DocMeta)>> = Mutex::new(BTreeMap::new());
    let empty: Mutex<Vec<SkippedDocument>> = Mutex::new(Vec::new());
    let (tx, rx) = crossbeam_channel::bounded::<(DocId, &Document)>(workers * 4);

    let faults: Vec<String> = thread::scope(|s| -> Result<Vec<String>, IndexError> {
        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let rx = rx.clone();
            let (postings, docs, empty, analyze) = (&postings, &docs, &empty, &analyze);
            let handle = thread::Builder::new().name(format!("indexer-{i}")).spawn_scoped(s, move || {
                for (doc_id, doc) in rx.iter() {
                    let terms = analyze(doc);
                    if terms.is_empty() {
                        tracing::warn!(url = %doc.url, "document has no indexable terms, skipping");
                        empty.lock().push(SkippedDocument { position: doc_id as usize, url: doc.url.clone(), reason: SkipReason::NoTerms });
                        continue;
                    }
                    let length: u32 = terms.values().sum();
                    postings.merge(doc_id, terms);
                    let meta = DocMeta {
                        external_id: doc.id.clone(),
                        url: doc.url.clone(),
                        title: doc.title.clone(),
                        excerpt: doc.excerpt(EXCERPT_CHARS),
                        profile: CharacterProfile::extract(&doc.text),
                    };
                    docs.lock().insert(doc_id, (length, meta));
                }
            })?;
            handles.push(handle);
        }
        drop(rx);

        for (n, item) in work.into_iter().enumerate() {
            // every worker gone: stop feeding, the join below reports why
            if tx.send(item).is_err() { break; }
            if (n + 1) % 1000 == 0 {
                tracing::info!(queued = n + 1, "documents dispatched");
            }
        }
        drop(tx);

        Ok(handles.into_iter().filter_map(|h| h.join().err()).map(panic_message).collect())
    })?;

    if !faults.is_empty() {
        tracing::error!(faults = faults.len(), first = %faults[0], "index build aborted");
        return Err(IndexError::WorkerFault(faults.join("; ")));
    }

    let mut doc_stats = BTreeMap::new();
    let mut metas = BTreeMap::new();
    for (doc_id, (length, meta)) in docs.into_inner() {
        doc_stats.insert(doc_id, DocStats { doc_id, length });
        metas.insert(doc_id, meta);
    }
    let index = InvertedIndex::from_parts(postings.into_postings(), doc_stats, metas, opts.analyzer);

    skipped.extend(empty.into_inner());
    skipped.sort_by_key(|s| s.position);
    let report = BuildReport { indexed: index.total_documents as usize, skipped, workers, elapsed: start.elapsed() };
    tracing::info!(
        indexed = report.indexed,
        skipped = report.skipped.len(),
        terms = index.num_terms(),
        avg_len = index.average_document_length,
        elapsed_s = report.elapsed.as_secs_f64(),
        "index built"
    );
    Ok((index, report))
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(n: usize) -> Vec<Document> {
        (0..n).map(|i| Document::new(format!("https://wiki.test/{i}"), format!("Page {i}"), "gamma radiation", vec![], 0)).collect()
    }

    #[test]
    fn worker_panic_discards_the_build() {
        let docs = corpus(40);
        let opts = BuildOptions::new(4);
        let analyzer = opts.analyzer;
        let res = build_with(&docs, &opts, |doc| {
            if doc.url.ends_with("/13") { panic!("corrupt shard state"); }
            analyze_document(&analyzer, doc)
        });
        match res {
            Err(IndexError::WorkerFault(msg)) => assert!(msg.contains("corrupt shard state")),
            other => panic!("expected worker fault, got {other:?}"),
        }
    }

    #[test]
    fn single_worker_fault_still_terminates() {
        let docs = corpus(100);
        let res = build_with(&docs, &BuildOptions::new(1), |_| panic!("boom"));
        assert!(matches!(res, Err(IndexError::WorkerFault(_))));
    }

    #[test]
    fn zero_workers_means_one() {
        let (index, report) = build_index(&corpus(3), &BuildOptions::new(0)).unwrap();
        assert_eq!(report.workers, 1);
        assert_eq!(index.total_documents, 3);
    }
}

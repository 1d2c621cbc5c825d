use fandex_core::corpus::read_corpus;
use fandex_core::persist::{encode_index, load_index, IndexPaths};
use fandex_core::tokenizer::Analyzer;
use fandex_core::{search, Document};
use indexer::{analyze_document, build_and_save, build_index, BuildOptions, SkipReason};
use std::collections::BTreeSet;
use std::fs;
use tempfile::tempdir;

const VOCAB: &[&str] = &[
    "avenger", "mutant", "shield", "hydra", "asgard", "wakanda", "vibranium", "gamma", "symbiote", "infinity",
    "stone", "hammer", "shield", "web", "claw", "cosmic", "quantum", "realm", "multiverse", "variant",
    "sorcerer", "mystic", "arc", "reactor", "serum", "soldier", "spider", "widow", "hawk", "panther",
];

/// Deterministic synthetic wiki: `n` pages of varying length over a small vocabulary.
fn wiki_corpus(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| {
            let words: Vec<&str> = (0..(5 + i % 11)).map(|j| VOCAB[(i * 7 + j * 3) % VOCAB.len()]).collect();
            Document::new(format!("https://marvel.fandom.com/wiki/Page_{i}"), format!("Page {i}"), words.join(" "), vec![], (i % 3) as u32)
        })
        .collect()
}

#[test]
fn index_is_identical_for_one_and_eight_workers() {
    let corpus = wiki_corpus(100);
    let (one, _) = build_index(&corpus, &BuildOptions::new(1)).unwrap();
    let (eight, report) = build_index(&corpus, &BuildOptions::new(8)).unwrap();
    assert_eq!(report.workers, 8);
    assert_eq!(one, eight);
    assert_eq!(encode_index(&one).unwrap(), encode_index(&eight).unwrap());
    assert!(eight.check_consistency().is_ok());
}

#[test]
fn hundred_documents_with_eight_workers_cover_every_term() {
    let mut corpus = wiki_corpus(100);
    corpus[10].title.clear();
    corpus[10].text = "the and of".into();
    corpus[55].title.clear();
    corpus[55].text.clear();

    let (index, report) = build_index(&corpus, &BuildOptions::new(8)).unwrap();
    assert_eq!(index.total_documents, 98);
    let skipped: Vec<usize> = report.skipped.iter().map(|s| s.position).collect();
    assert_eq!(skipped, vec![10, 55]);
    assert!(report.skipped.iter().all(|s| s.reason == SkipReason::NoTerms));

    let analyzer = Analyzer::default();
    let mut expected_terms = BTreeSet::new();
    for (pos, doc) in corpus.iter().enumerate() {
        for (term, tf) in analyze_document(&analyzer, doc) {
            let plist = index.postings(&term).unwrap_or_else(|| panic!("missing term {term}"));
            let posting = plist.iter().find(|p| p.doc_id == pos as u32).unwrap();
            assert_eq!(posting.tf, tf);
            expected_terms.insert(term);
        }
    }
    assert_eq!(expected_terms.len(), index.num_terms());

    let total_len: u64 = index.doc_stats.values().map(|s| s.length as u64).sum();
    assert!((index.average_document_length - total_len as f64 / 98.0).abs() < 1e-9);
}

#[test]
fn duplicate_urls_are_indexed_once() {
    let mut corpus = wiki_corpus(5);
    corpus.push(corpus[2].clone());
    let (index, report) = build_index(&corpus, &BuildOptions::new(3)).unwrap();
    assert_eq!(index.total_documents, 5);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, SkipReason::DuplicateUrl);
    assert_eq!(report.skipped[0].position, 5);
}

#[test]
fn finds_natasha_romanoff_and_ignores_unknown_terms() {
    let mut corpus = wiki_corpus(30);
    corpus.push(Document::new(
        "https://marvel.fandom.com/wiki/Natasha_Romanoff_(Earth-616)",
        "Natasha Romanoff (Earth-616)",
        "Natasha Romanoff, the Black Widow, was trained in the Red Room.",
        vec![],
        1,
    ));
    let (index, _) = build_index(&corpus, &BuildOptions::new(4)).unwrap();

    let hits = search(&index, "Natasha Romanoff", 10);
    let top = hits.first().expect("at least one hit");
    assert_eq!(top.doc_id, 30);
    assert!(top.score > 0.0);
    assert_eq!(index.docs[&30].title, "Natasha Romanoff (Earth-616)");
    assert!(index.docs[&30].excerpt.starts_with("Natasha Romanoff"));

    assert!(search(&index, "zzz-nonexistent-term", 10).is_empty());
}

#[test]
fn persisted_index_answers_like_the_in_memory_one() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path().join("index"));
    let corpus = wiki_corpus(60);
    let (index, _, meta) = build_and_save(&corpus, &BuildOptions::new(6), &paths).unwrap();
    assert_eq!(meta.num_docs, 60);

    let loaded = load_index(&paths).unwrap();
    for q in ["mutant gamma", "asgard hammer hammer", "quantum realm variant", "nothing-here"] {
        assert_eq!(search(&index, q, 5), search(&loaded, q, 5), "query {q:?}");
    }
}

#[test]
fn builds_from_corpus_file_written_by_crawler_format() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("corpus.jsonl");
    let lines = [
        r#"{"id":"a","url":"https://wiki.test/a","title":"Howard the Duck","text":"Howard is a duck from Duckworld.","links":[],"depth":0,"fetched_at":null}"#,
        r#"{"url":"https://wiki.test/b","title":"Land Shark","text":"Jeffrey is a land shark.","links":["https://wiki.test/a"],"depth":1}"#,
        "not json at all",
    ];
    fs::write(&path, lines.join("\n")).unwrap();
    let load = read_corpus(&path).unwrap();
    assert_eq!(load.malformed, 1);

    let (index, _) = build_index(&load.documents, &BuildOptions::new(2)).unwrap();
    assert_eq!(index.total_documents, 2);
    let hits = search(&index, "duck", 3);
    assert_eq!(hits[0].doc_id, 0);
    assert_eq!(index.docs[&0].external_id, "a");
}

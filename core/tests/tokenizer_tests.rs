use fandex_core::tokenizer::{normalize, tokenize, Analyzer};

#[test]
fn it_normalizes_and_stems() {
    let words = normalize("Running Runners RUN! The Avengers' headquarters.");
    assert!(words.contains(&"run".to_string()));
    assert!(words.contains(&"avengers".to_string()) || words.contains(&"aveng".to_string()));
    assert!(!words.iter().any(|w| w.ends_with('.') || w.ends_with('\'')));
}

#[test]
fn it_filters_stopwords() {
    let words = normalize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert_eq!(words.len(), 5);
}

#[test]
fn it_applies_compatibility_normalization() {
    let words = Analyzer::new(false).normalize("ＴＨＯＲ Odinson");
    assert_eq!(words, vec!["thor", "odinson"]);
}

#[test]
fn index_and_query_sides_agree() {
    let analyzer = Analyzer::default();
    let page = analyzer.normalize("Natasha Romanoff's file was sealed.");
    let query = analyzer.normalize("natasha ROMANOFF");
    assert!(query.iter().all(|t| page.contains(t)));
}

#[test]
fn pure_punctuation_yields_nothing() {
    assert!(tokenize("-- ... !!! —").is_empty());
}

use lazy_static::lazy_static;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Text analysis settings shared by indexing and querying.
///
/// An index stores the `Analyzer` it was built with; the query side always
/// normalizes through that stored value so both sides produce the same terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analyzer {
    pub stemming: bool,
}

impl Default for Analyzer {
    fn default() -> Self { Self { stemming: true } }
}

impl Analyzer {
    pub fn new(stemming: bool) -> Self { Self { stemming } }

    /// Tokenize text into (term, position). Positions count whitespace-separated
    /// words of the input, including the ones dropped as stopwords.
    pub fn tokenize(&self, text: &str) -> Vec<(String, usize)> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut tokens = Vec::new();
        for (pos, word) in normalized.split_whitespace().enumerate() {
            let token = word.trim_matches(|c: char| !c.is_alphanumeric());
            if token.is_empty() || is_stopword(token) { continue; }
            let term = if self.stemming { STEMMER.stem(token).into_owned() } else { token.to_string() };
            tokens.push((term, pos));
        }
        tokens
    }

    pub fn normalize(&self, text: &str) -> Vec<String> {
        self.tokenize(text).into_iter().map(|(t, _)| t).collect()
    }
}

/// Tokenize with the default analyzer (NFKC, lowercase, boundary punctuation
/// stripped, stopwords removed, English stemming).
pub fn tokenize(text: &str) -> Vec<(String, usize)> { Analyzer::default().tokenize(text) }

pub fn normalize(text: &str) -> Vec<String> { Analyzer::default().normalize(text) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Running, runner's run!");
        assert!(t.iter().any(|(w, _)| w == "run"));
    }

    #[test]
    fn keeps_inner_punctuation() {
        let terms = Analyzer::new(false).normalize("(Spider-Man) meets O'Brien...");
        assert_eq!(terms, vec!["spider-man", "meets", "o'brien"]);
    }

    #[test]
    fn positions_skip_dropped_words() {
        let t = Analyzer::new(false).tokenize("the Black Widow -- of Russia");
        assert_eq!(t, vec![("black".to_string(), 1), ("widow".to_string(), 2), ("russia".to_string(), 5)]);
    }
}

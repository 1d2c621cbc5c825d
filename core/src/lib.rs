//! Shared pieces of the fandex pipeline: text normalization, the document and
//! index data model, corpus and index persistence, and BM25 ranking.

pub mod corpus;
pub mod error;
pub mod index;
pub mod persist;
pub mod profile;
pub mod query;
pub mod tokenizer;

pub use corpus::{Corpus, Document};
pub use error::{CorpusError, IndexError};
pub use index::{DocId, DocMeta, DocStats, InvertedIndex, Posting};
pub use profile::CharacterProfile;
pub use query::{count_matches, search, ScoredDoc};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing a corpus file.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("invalid corpus JSON in {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

/// Errors raised while building, saving or loading an index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("no index found at {0}")]
    Missing(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not an index file (bad magic bytes)")]
    BadMagic,

    #[error("unsupported index format version {found} (this build reads version {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("index file is corrupt: {0}")]
    Corrupt(String),

    #[error("index encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("index metadata error: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("refusing to replace {0}: it exists and does not look like an index directory")]
    NotIndexDir(PathBuf),

    #[error("cannot place an index at {0}: the path has no directory name (try e.g. ./index)")]
    UnnamedRoot(PathBuf),

    #[error("indexing worker failed, build discarded: {0}")]
    WorkerFault(String),
}

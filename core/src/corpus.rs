//! Corpus records and their on-disk form.
//!
//! The crawler writes JSON Lines. The reader is lenient: it also takes a JSON
//! array, a single object, the older keyed-object layout
//! (`{"<hash>": {"url": .., "content": ..}}`) or a directory of such files.
//! Entries that fail to parse are skipped and counted, never fatal.

use crate::error::CorpusError;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "content", alias = "body")]
    pub text: String,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub fetched_at: Option<String>,
}

pub type Corpus = Vec<Document>;

impl Document {
    /// Build a document whose id is derived from its (already normalized) URL.
    pub fn new(url: impl Into<String>, title: impl Into<String>, text: impl Into<String>, links: Vec<String>, depth: u32) -> Self {
        let url = url.into();
        Self { id: document_id(&url), url, title: title.into(), text: text.into(), links, depth, fetched_at: None }
    }

    /// First `max_chars` characters of the text, cut on a char boundary.
    pub fn excerpt(&self, max_chars: usize) -> String {
        self.text.chars().take(max_chars).collect()
    }
}

/// Lowercase hex SHA-1 of the normalized URL.
pub fn document_id(normalized_url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(normalized_url.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Default)]
pub struct CorpusLoad {
    pub documents: Corpus,
    /// Entries that could not be decoded and were skipped.
    pub malformed: usize,
}

/// Read a corpus file or a directory of corpus files.
pub fn read_corpus(path: &Path) -> Result<CorpusLoad, CorpusError> {
    let mut files: Vec<PathBuf> = Vec::new();
    if path.is_dir() {
        for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if path.is_file() {
        files.push(path.to_path_buf());
    } else {
        return Err(CorpusError::NotFound(path.to_path_buf()));
    }

    let mut load = CorpusLoad::default();
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("json") {
            read_json(&file, &mut load)?;
        } else {
            read_jsonl(&file, &mut load)?;
        }
    }
    for doc in load.documents.iter_mut() {
        if doc.id.is_empty() {
            doc.id = document_id(&doc.url);
        }
    }
    tracing::debug!(documents = load.documents.len(), malformed = load.malformed, path = %path.display(), "corpus loaded");
    Ok(load)
}

fn read_jsonl(file: &Path, load: &mut CorpusLoad) -> Result<(), CorpusError> {
    let f = File::open(file).map_err(|source| CorpusError::Io { path: file.to_path_buf(), source })?;
    for (line_no, line) in BufReader::new(f).lines().enumerate() {
        let line = line.map_err(|source| CorpusError::Io { path: file.to_path_buf(), source })?;
        if line.trim().is_empty() { continue; }
        match serde_json::from_str::<Document>(&line) {
            Ok(doc) => load.documents.push(doc),
            Err(e) => {
                tracing::warn!(file = %file.display(), line = line_no + 1, error = %e, "skipping malformed corpus entry");
                load.malformed += 1;
            }
        }
    }
    Ok(())
}

fn read_json(file: &Path, load: &mut CorpusLoad) -> Result<(), CorpusError> {
    let f = File::open(file).map_err(|source| CorpusError::Io { path: file.to_path_buf(), source })?;
    let json: serde_json::Value = match serde_json::from_reader(BufReader::new(f)) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(file = %file.display(), error = %e, "skipping unreadable corpus file");
            load.malformed += 1;
            return Ok(());
        }
    };
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                push_value(file, v, None, load);
            }
        }
        serde_json::Value::Object(map) if map.contains_key("url") => {
            push_value(file, serde_json::Value::Object(map), None, load);
        }
        serde_json::Value::Object(map) => {
            // keyed layout: the key is the document id
            for (key, v) in map {
                push_value(file, v, Some(key), load);
            }
        }
        _ => {
            tracing::warn!(file = %file.display(), "corpus file holds neither an array nor an object");
            load.malformed += 1;
        }
    }
    Ok(())
}

fn push_value(file: &Path, v: serde_json::Value, key: Option<String>, load: &mut CorpusLoad) {
    match serde_json::from_value::<Document>(v) {
        Ok(mut doc) => {
            if let Some(key) = key {
                if doc.id.is_empty() { doc.id = key; }
            }
            load.documents.push(doc);
        }
        Err(e) => {
            tracing::warn!(file = %file.display(), error = %e, "skipping malformed corpus entry");
            load.malformed += 1;
        }
    }
}

/// Write the corpus as JSON Lines. The file is written under a temporary name
/// and renamed into place, so readers never see a truncated corpus.
pub fn write_corpus(path: &Path, docs: &[Document]) -> Result<(), CorpusError> {
    let io_err = |source| CorpusError::Io { path: path.to_path_buf(), source };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err)?;
    }
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut out = BufWriter::new(File::create(&tmp).map_err(io_err)?);
        for doc in docs {
            serde_json::to_writer(&mut out, doc).map_err(|source| CorpusError::Json { path: path.to_path_buf(), source })?;
            out.write_all(b"\n").map_err(io_err)?;
        }
        out.flush().map_err(io_err)?;
    }
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_sha1() {
        assert_eq!(document_id("https://marvel.fandom.com/wiki/Thor"), document_id("https://marvel.fandom.com/wiki/Thor"));
        assert_eq!(document_id("").len(), 40);
        assert_ne!(document_id("a"), document_id("b"));
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let doc = Document::new("https://x.test/", "t", "héllo wörld", vec![], 0);
        assert_eq!(doc.excerpt(4), "héll");
    }
}

use crate::error::IndexError;
use crate::InvertedIndex;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

pub const MAGIC: [u8; 4] = *b"FDXI";
/// Bump whenever the payload layout or scoring inputs change.
pub const FORMAT_VERSION: u32 = 2;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub num_docs: u32,
    pub num_terms: usize,
    pub average_document_length: f64,
    pub created_at: String,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn index(&self) -> PathBuf { self.root.join("index.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }

    /// `root` with a final name component, so siblings can be placed next to
    /// it. Paths such as `.` or `idx/..` are resolved against the filesystem.
    fn named(&self) -> Result<IndexPaths, IndexError> {
        if self.root.file_name().is_some() {
            return Ok(IndexPaths::new(&self.root));
        }
        let resolved = fs::canonicalize(&self.root)?;
        if resolved.file_name().is_none() {
            return Err(IndexError::UnnamedRoot(self.root.clone()));
        }
        Ok(IndexPaths::new(resolved))
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.root.file_name().unwrap_or_default().to_os_string();
        name.push(suffix);
        self.root.with_file_name(name)
    }

    /// True if `root` is absent, empty, or holds a previous index.
    fn replaceable(&self) -> Result<bool, IndexError> {
        if !self.root.exists() { return Ok(true); }
        if !self.root.is_dir() { return Ok(false); }
        if self.index().exists() || self.meta().exists() { return Ok(true); }
        Ok(fs::read_dir(&self.root)?.next().is_none())
    }
}

/// Serialize the index with its versioned, checksummed header.
pub fn encode_index(index: &InvertedIndex) -> Result<Vec<u8>, IndexError> {
    let payload = bincode::serialize(index)?;
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.write_all(&MAGIC)?;
    buf.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    buf.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
    buf.write_u64::<LittleEndian>(payload.len() as u64)?;
    buf.extend_from_slice(&payload);
    Ok(buf)
}

pub fn decode_index(bytes: &[u8]) -> Result<InvertedIndex, IndexError> {
    if bytes.len() < MAGIC.len() || bytes[..MAGIC.len()] != MAGIC {
        return Err(IndexError::BadMagic);
    }
    if bytes.len() < HEADER_LEN {
        return Err(IndexError::Corrupt("truncated header".into()));
    }
    let mut cur = Cursor::new(&bytes[MAGIC.len()..HEADER_LEN]);
    let version = cur.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(IndexError::UnsupportedVersion { found: version, expected: FORMAT_VERSION });
    }
    let checksum = cur.read_u32::<LittleEndian>()?;
    let len = cur.read_u64::<LittleEndian>()?;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() as u64 != len {
        return Err(IndexError::Corrupt(format!("payload is {} bytes, header says {len}", payload.len())));
    }
    if crc32fast::hash(payload) != checksum {
        return Err(IndexError::Corrupt("checksum mismatch".into()));
    }
    let index: InvertedIndex = bincode::deserialize(payload)?;
    index.check_consistency().map_err(IndexError::Corrupt)?;
    Ok(index)
}

/// Persist the index. Files are written into a sibling staging directory.
/// The previous index is moved aside before the staged one is renamed into
/// place and only deleted afterwards, so `paths.root` never holds a partial
/// index and a failed swap puts the old one back.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<MetaFile, IndexError> {
    let paths = paths.named()?;
    if !paths.replaceable()? {
        return Err(IndexError::NotIndexDir(paths.root.clone()));
    }
    let staging = IndexPaths::new(paths.sibling(".staging"));
    let retired = paths.sibling(".old");
    for leftover in [&staging.root, &retired] {
        if leftover.exists() {
            fs::remove_dir_all(leftover)?;
        }
    }
    fs::create_dir_all(&staging.root)?;

    let bytes = encode_index(index)?;
    let mut f = File::create(staging.index())?;
    f.write_all(&bytes)?;
    f.sync_all()?;

    let meta = MetaFile {
        version: FORMAT_VERSION,
        num_docs: index.total_documents,
        num_terms: index.num_terms(),
        average_document_length: index.average_document_length,
        created_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
    };
    save_meta(&staging, &meta)?;

    let had_previous = paths.root.exists();
    if had_previous {
        fs::rename(&paths.root, &retired)?;
    }
    if let Err(e) = fs::rename(&staging.root, &paths.root) {
        if had_previous {
            fs::rename(&retired, &paths.root)?;
        }
        return Err(e.into());
    }
    if had_previous {
        if let Err(e) = fs::remove_dir_all(&retired) {
            tracing::warn!(path = %retired.display(), error = %e, "could not remove previous index");
        }
    }
    tracing::debug!(root = %paths.root.display(), bytes = bytes.len(), "index saved");
    Ok(meta)
}

pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex, IndexError> {
    let file = paths.index();
    if !file.is_file() {
        return Err(IndexError::Missing(paths.root.clone()));
    }
    let mut buf = Vec::new();
    File::open(file)?.read_to_end(&mut buf)?;
    decode_index(&buf)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<(), IndexError> {
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile, IndexError> {
    let file = paths.meta();
    if !file.is_file() {
        return Err(IndexError::Missing(paths.root.clone()));
    }
    let mut buf = String::new();
    File::open(file)?.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    if meta.version != FORMAT_VERSION {
        return Err(IndexError::UnsupportedVersion { found: meta.version, expected: FORMAT_VERSION });
    }
    Ok(meta)
}

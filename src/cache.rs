//! Content-hash deduplication of uploaded files.
//!
//! Entries are keyed by the SHA-256 of the file bytes, so the same transcript
//! uploaded under another name is still recognized. There is no eviction:
//! entries stay until [`FileCache::clear`].

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::IngestResult;

/// Hex-encoded SHA-256 of file content
pub fn content_hash(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    let mut hex = String::with_capacity(64);
    for b in digest {
        let _ = write!(hex, "{:02x}", b);
    }
    hex
}

/// Marker recorded once a file has been ingested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub filename: String,
    pub meeting_id: String,
    pub chunk_count: usize,
    pub recorded_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(filename: impl Into<String>, meeting_id: impl Into<String>, chunk_count: usize) -> Self {
        Self {
            filename: filename.into(),
            meeting_id: meeting_id.into(),
            chunk_count,
            recorded_at: Utc::now(),
        }
    }
}

/// Set of already-processed content hashes, optionally persisted as JSON
#[derive(Debug, Default)]
pub struct FileCache {
    entries: HashMap<String, CacheEntry>,
    /// Upload order of filenames, for listing
    filenames: Vec<String>,
    path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    entries: HashMap<String, CacheEntry>,
    filenames: Vec<String>,
}

impl FileCache {
    /// In-memory cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache backed by a JSON file; existing contents are loaded
    pub fn open(path: &Path) -> IngestResult<Self> {
        let mut cache = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let stored: CacheFile = serde_json::from_str(&content)?;
            cache.entries = stored.entries;
            cache.filenames = stored.filenames;
            debug!("Loaded {} cache entries from {:?}", cache.entries.len(), path);
        }
        Ok(cache)
    }

    /// Whether this content has already been processed
    pub fn check(&self, hash: &str) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn get(&self, hash: &str) -> Option<&CacheEntry> {
        self.entries.get(hash)
    }

    /// Mark content as processed; an existing entry is left untouched
    pub fn record(&mut self, hash: impl Into<String>, entry: CacheEntry) -> IngestResult<()> {
        let hash = hash.into();
        if self.entries.contains_key(&hash) {
            return Ok(());
        }
        if !self.filenames.contains(&entry.filename) {
            self.filenames.push(entry.filename.clone());
        }
        self.entries.insert(hash, entry);
        self.persist()
    }

    /// Drop every entry
    pub fn clear(&mut self) -> IngestResult<()> {
        self.entries.clear();
        self.filenames.clear();
        self.persist()
    }

    /// Names of uploaded files, in upload order
    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) -> IngestResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stored = CacheFile {
            entries: self.entries.clone(),
            filenames: self.filenames.clone(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }
}

//! Filesystem store: one record file per key.
//!
//! Record layout is `"<unix-secs>\n<payload>"`. Keys are escaped into file
//! names so every record stays inside the cache directory.

use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, Driver, Entry};
use crate::error::{CacheError, Result};

/// Longest escaped stem kept verbatim; longer keys are hashed.
const MAX_FILE_STEM: usize = 200;

const RECORD_EXTENSION: &str = "txt";

/// File-backed cache store.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    tmp_counter: AtomicU64,
}

impl FileStore {
    /// Opens the store, creating the cache directory when missing.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            CacheError::unavailable(
                Driver::File,
                format!("failed to create cache directory {}: {}", dir.display(), e),
            )
        })?;

        info!("File cache store using directory {}", dir.display());
        Ok(Self {
            dir,
            tmp_counter: AtomicU64::new(0),
        })
    }

    /// Directory holding the record files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record path for `key`; always a direct child of the cache directory.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", file_stem(key), RECORD_EXTENSION))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{}.{}.{}.tmp", file_stem(key), std::process::id(), n))
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::storage("failed to remove cache file", e)),
        }
    }

    /// Removes the record for `key` only while it still holds `stale`.
    ///
    /// The record is moved aside first. If the moved file differs from
    /// `stale`, a `put` landed after the read, and the file is linked back
    /// unless an even newer record already took its place.
    async fn purge(&self, key: &str, stale: &str) -> Result<()> {
        let path = self.path_for(key);
        let aside = self.temp_path_for(key);

        match fs::rename(&path, &aside).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(CacheError::storage("failed to move cache file aside", e)),
        }

        let moved = fs::read_to_string(&aside).await.ok();
        if moved.as_deref().is_some_and(|record| record != stale) {
            match fs::hard_link(&aside, &path).await {
                Ok(()) => debug!(key = %key, "kept cache file rewritten during purge"),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => {
                    let _ = fs::remove_file(&aside).await;
                    return Err(CacheError::storage("failed to restore cache file", e));
                }
            }
        }
        self.remove(&aside).await
    }
}

#[async_trait]
impl CacheStore for FileStore {
    fn driver(&self) -> Driver {
        Driver::File
    }

    async fn put(&self, key: &str, payload: String, ttl: Duration) -> Result<()> {
        let record = Entry::persisted(payload, ttl).to_record();
        let path = self.path_for(key);
        let tmp = self.temp_path_for(key);

        // Write-then-rename so readers never see a partial record
        fs::write(&tmp, record)
            .await
            .map_err(|e| CacheError::storage("failed to write cache file", e))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(CacheError::storage("failed to replace cache file", e));
        }
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        let record = match fs::read_to_string(&path).await {
            Ok(record) => record,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::storage("failed to read cache file", e)),
        };

        match Entry::from_record(&record) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.payload)),
            Some(_) => {
                debug!(key = %key, "file cache entry expired");
                self.purge(key, &record).await?;
                Ok(None)
            }
            None => {
                warn!(key = %key, path = %path.display(), "malformed cache file, removing");
                self.purge(key, &record).await?;
                Ok(None)
            }
        }
    }

    async fn forget(&self, key: &str) -> Result<()> {
        self.remove(&self.path_for(key)).await
    }
}

// == Key Sanitization ==
/// Maps a key to a file stem without path separators or dot segments.
///
/// Bytes outside `[A-Za-z0-9_-]` become `%XX`, which keeps the mapping
/// injective. Stems that would get too long are replaced by `~` plus the
/// SHA-256 of the key; `~` never survives escaping, so the two forms cannot
/// collide.
fn file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            stem.push(b as char);
        } else {
            let _ = write!(stem, "%{:02X}", b);
        }
    }

    if stem.len() > MAX_FILE_STEM {
        format!("~{:x}", Sha256::digest(key.as_bytes()))
    } else {
        stem
    }
}

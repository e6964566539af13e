use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use commons::DepgraphError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Cache;

/// On-disk representation of one cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    /// Base64-encoded blob.
    data: String,
    /// Unix timestamp (seconds) after which the entry is stale, or `None`
    /// for entries that never expire.
    expires_at: Option<i64>,
}

/// File-backed [`Cache`]: one JSON file per entry at
/// `<dir>/<first 2 hex of sha256(key)>/<remaining 62 hex>.json`.
///
/// The two-level sharding keeps any single directory from growing
/// unbounded as the package universe is crawled. Writes are best-effort:
/// a failure to create the shard directory or write the file is reported
/// to the caller but is not expected to abort a crawl (see the HTTP
/// adapter, which discards `set` errors).
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Open (without yet creating) a cache rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileCache { dir: dir.into() }
    }

    /// The default cache directory, `~/.cache/<appname>/`.
    pub fn default_dir(appname: &str) -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(appname)
    }

    fn shard_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        let (head, tail) = digest.split_at(2);
        self.dir.join(head).join(format!("{}.json", tail))
    }
}

fn now_unix() -> i64 {
    Utc::now().timestamp()
}

impl Cache for FileCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DepgraphError> {
        let path = self.shard_path(key);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DepgraphError::Other(e.into())),
        };

        let entry: Entry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(_) => {
                // Corrupt entry: treat as a miss and clean it up.
                let _ = std::fs::remove_file(&path);
                return Ok(None);
            }
        };

        if let Some(expires_at) = entry.expires_at {
            if now_unix() > expires_at {
                let _ = std::fs::remove_file(&path);
                return Ok(None);
            }
        }

        match BASE64.decode(entry.data.as_bytes()) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(_) => {
                let _ = std::fs::remove_file(&path);
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), DepgraphError> {
        let path = self.shard_path(key);
        let parent = path.parent().expect("shard path always has a parent");
        ensure_dir(parent)?;

        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(now_unix() + ttl.as_secs() as i64)
        };
        let entry = Entry {
            data: BASE64.encode(bytes),
            expires_at,
        };
        let encoded =
            serde_json::to_vec(&entry).map_err(|e| DepgraphError::Other(e.into()))?;

        // Write to a sibling temp file then rename, so concurrent readers
        // never observe a partially written entry; "last writer wins" is
        // all the atomicity the contract requires.
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &encoded).map_err(|e| DepgraphError::Other(e.into()))?;
        std::fs::rename(&tmp_path, &path).map_err(|e| DepgraphError::Other(e.into()))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), DepgraphError> {
        let path = self.shard_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DepgraphError::Other(e.into())),
        }
    }

    fn close(&self) -> Result<(), DepgraphError> {
        Ok(())
    }
}

fn ensure_dir(dir: &Path) -> Result<(), DepgraphError> {
    std::fs::create_dir_all(dir).map_err(|e| DepgraphError::Other(e.into()))
}

//! FileEntry - A single file seen by one scan

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One file as observed by a local or remote scan.
///
/// Rebuilt on every run and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    /// Forward-slash path relative to the sync root
    pub path: String,

    /// Last modification time in milliseconds since the Unix epoch (0 = unknown)
    pub mtime_ms: i64,

    /// File size in bytes (local scans only, 0 for remote entries)
    pub size: u64,

    /// Hex content hash (local scans only)
    pub hash: Option<String>,

    /// Remote identity tag (remote scans only)
    pub etag: Option<String>,
}

impl FileEntry {
    /// Entry produced by the local scanner
    pub fn local(path: impl Into<String>, mtime_ms: i64, size: u64, hash: String) -> Self {
        Self {
            path: path.into(),
            mtime_ms,
            size,
            hash: Some(hash),
            etag: None,
        }
    }

    /// Entry produced by the remote scanner
    pub fn remote(path: impl Into<String>, mtime_ms: Option<i64>, etag: Option<String>) -> Self {
        Self {
            path: path.into(),
            mtime_ms: mtime_ms.unwrap_or(0),
            size: 0,
            hash: None,
            etag,
        }
    }

    /// Hash, or the empty string when none was computed
    pub fn hash_str(&self) -> &str {
        self.hash.as_deref().unwrap_or("")
    }

    /// Modification time when known
    pub fn known_mtime(&self) -> Option<i64> {
        (self.mtime_ms != 0).then_some(self.mtime_ms)
    }
}

/// Convert a `SystemTime` into epoch milliseconds (pre-epoch clamps to 0).
pub fn to_epoch_ms(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    to_epoch_ms(SystemTime::now())
}

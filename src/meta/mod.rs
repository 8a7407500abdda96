//! Durable cross-run sync state
//!
//! `SyncMetadata` is the last known reconciled state of every synced path.
//! It lives in private application storage (see [`store::MetadataStore`]),
//! while the coarse [`hint::LocalStructureHint`] lives inside the library.

pub mod hint;
pub mod store;

pub use hint::LocalStructureHint;
pub use store::{LoadOutcome, MetadataStore};

use crate::types::{DirRecord, FileEntry, FileTree, RemoteTree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last reconciled state of one path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileRecord {
    pub hash: String,
    pub mtime: i64,
    pub size: u64,
    pub sync_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_mtime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_etag: Option<String>,
}

impl FileRecord {
    /// Record for a path that was just reconciled from a local scan entry.
    pub fn from_entry(entry: &FileEntry, sync_time: i64) -> Self {
        Self {
            hash: entry.hash_str().to_string(),
            mtime: entry.mtime_ms,
            size: entry.size,
            sync_time,
            remote_mtime: None,
            remote_etag: None,
        }
    }

    pub fn with_remote(mut self, mtime: Option<i64>, etag: Option<String>) -> Self {
        self.remote_mtime = mtime.filter(|m| *m != 0);
        self.remote_etag = etag.filter(|e| !e.is_empty());
        self
    }
}

/// Persisted sync metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncMetadata {
    pub files: BTreeMap<String, FileRecord>,
    pub last_sync_time: i64,
    pub dirs: BTreeMap<String, DirRecord>,
}

impl SyncMetadata {
    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// Stored hash for `path`, empty when unknown
    pub fn hash_of(&self, path: &str) -> &str {
        self.files.get(path).map(|r| r.hash.as_str()).unwrap_or("")
    }

    /// Drop records for paths that exist on neither side.
    ///
    /// Paths under a folder that could not be listed are kept, since their
    /// remote state is unknown. Returns the number of records removed.
    pub fn prune_vanished(&mut self, local: &FileTree, remote: &RemoteTree) -> usize {
        let before = self.files.len();
        self.files.retain(|path, _| {
            local.contains(path) || remote.contains(path) || remote.is_under_failed_dir(path)
        });
        before - self.files.len()
    }

    /// Take the folder validators from a fresh listing.
    ///
    /// A complete listing replaces the stored set so deleted folders drop
    /// out. After a partial listing the old entries are kept.
    pub fn merge_dirs(&mut self, remote: &RemoteTree) {
        if remote.failed_dirs.is_empty() {
            self.dirs = remote.dirs.clone();
        } else {
            self.dirs.extend(remote.dirs.clone());
        }
    }

    /// Backfill fields older files wrote differently.
    ///
    /// Zero timestamps and empty tags mean "absent".
    pub(crate) fn normalize(&mut self) {
        for record in self.files.values_mut() {
            if record.remote_mtime == Some(0) {
                record.remote_mtime = None;
            }
            if record.remote_etag.as_deref() == Some("") {
                record.remote_etag = None;
            }
        }
        for dir in self.dirs.values_mut() {
            if dir.mtime == Some(0) {
                dir.mtime = None;
            }
            if dir.etag.as_deref() == Some("") {
                dir.etag = None;
            }
        }
    }
}

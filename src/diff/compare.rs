//! Change detection against the last reconciled state

use crate::meta::FileRecord;
use crate::types::FileEntry;

/// Remote mtimes closer than this are considered equal
pub const MTIME_TOLERANCE_MS: i64 = 1000;

/// Verdict on whether the remote copy changed since the last sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteChange {
    /// Identity tag or mtime matches the record
    Unchanged,
    /// Identity tag differs from the recorded one
    EtagDiff,
    /// Only the modification time moved (not authoritative on its own)
    MtimeDiff,
    /// Path was never synced; assume unchanged
    NoRecord,
    /// Record predates remote attributes; assume unchanged
    NoRemoteMeta,
}

impl RemoteChange {
    pub fn is_changed(&self) -> bool {
        matches!(self, RemoteChange::EtagDiff | RemoteChange::MtimeDiff)
    }
}

/// Compare a remote entry with the recorded remote attributes
///
/// The identity tag wins when both sides have one. Otherwise the mtime is
/// compared with a one second tolerance. Without either, the remote copy is
/// assumed unchanged.
pub fn remote_change(remote: &FileEntry, record: Option<&FileRecord>) -> RemoteChange {
    let Some(record) = record else {
        return RemoteChange::NoRecord;
    };

    match (&record.remote_etag, &remote.etag) {
        (Some(known), Some(current)) if !known.is_empty() && !current.is_empty() => {
            return if known == current {
                RemoteChange::Unchanged
            } else {
                RemoteChange::EtagDiff
            };
        }
        _ => {}
    }

    match (record.remote_mtime, remote.known_mtime()) {
        (Some(known), Some(current)) if known != 0 => {
            if (known - current).abs() > MTIME_TOLERANCE_MS {
                RemoteChange::MtimeDiff
            } else {
                RemoteChange::Unchanged
            }
        }
        _ => RemoteChange::NoRemoteMeta,
    }
}

/// Whether the local content differs from the last reconciled content
///
/// A path without a record compares against the empty hash, so it always
/// counts as changed.
pub fn local_changed(local: &FileEntry, record: Option<&FileRecord>) -> bool {
    let known = record.map(|r| r.hash.as_str()).unwrap_or("");
    local.hash_str() != known
}

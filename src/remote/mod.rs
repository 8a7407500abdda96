//! Remote store access
//!
//! [`RemoteStore`] is the seam between the sync engine and the WebDAV
//! server. [`webdav::WebDavClient`] talks HTTP, [`memory::MemoryStore`] keeps
//! everything in memory for tests.

pub mod memory;
pub mod propfind;
pub mod scan;
pub mod webdav;

pub use memory::MemoryStore;
pub use scan::{scan_remote, MAX_CONCURRENT_LISTINGS};
pub use webdav::WebDavClient;

use crate::types::SyncError;
use async_trait::async_trait;
use tracing::debug;

/// PROPFIND depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    One,
    Infinity,
}

impl Depth {
    pub fn header_value(&self) -> &'static str {
        match self {
            Depth::One => "1",
            Depth::Infinity => "infinity",
        }
    }
}

/// One member of a listed collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavEntry {
    /// Forward-slash path relative to the listed collection
    pub path: String,
    pub is_dir: bool,
    pub mtime_ms: Option<i64>,
    pub etag: Option<String>,
}

/// Operations the engine needs from the remote side.
///
/// All paths are absolute remote paths (`/notes/dir/a.md`) below the
/// server base URL.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List a collection, excluding the collection itself
    async fn list(&self, path: &str, depth: Depth) -> Result<Vec<DavEntry>, SyncError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, SyncError>;

    /// Upload, returning the new identity tag when the server reports one
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<Option<String>, SyncError>;

    async fn delete(&self, path: &str) -> Result<(), SyncError>;

    async fn move_to(&self, from: &str, to: &str, overwrite: bool) -> Result<(), SyncError>;

    async fn mkcol(&self, path: &str) -> Result<(), SyncError>;

    /// Create every collection along `path`, one segment at a time.
    ///
    /// "Already exists" and other failures are ignored: a missing parent
    /// surfaces later as a failed transfer.
    async fn ensure_dir(&self, path: &str) {
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            match self.mkcol(&current).await {
                Ok(()) => debug!(path = %current, "created remote collection"),
                Err(e) if e.status() == Some(405) => {}
                Err(e) => debug!(path = %current, error = %e, "mkcol failed"),
            }
        }
    }
}

/// Strip weak markers and surrounding quotes from an ETag value
pub fn normalize_etag(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("W/").unwrap_or(trimmed);
    let trimmed = trimmed.trim_matches(|c| c == '"' || c == '\'');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_etag() {
        assert_eq!(normalize_etag("\"abc\"").as_deref(), Some("abc"));
        assert_eq!(normalize_etag("W/\"abc\"").as_deref(), Some("abc"));
        assert_eq!(normalize_etag(" plain ").as_deref(), Some("plain"));
        assert_eq!(normalize_etag("\"\""), None);
    }

    #[tokio::test]
    async fn test_ensure_dir_is_idempotent() {
        let store = MemoryStore::new();
        store.ensure_dir("/notes/a/b").await;
        store.ensure_dir("/notes/a/b").await;

        assert!(store.has_dir("/notes"));
        assert!(store.has_dir("/notes/a/b"));
    }
}

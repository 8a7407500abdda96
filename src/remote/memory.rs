//! In-memory remote store
//!
//! Behaves like a small WebDAV server: missing parents answer 409, existing
//! collections answer 405 to MKCOL, unknown paths answer 404. Knobs allow
//! tests to reject deep listings, fail chosen collections and slow down
//! calls.

use super::{DavEntry, Depth, RemoteStore};
use crate::types::{now_ms, SyncError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
struct StoredFile {
    data: Vec<u8>,
    mtime_ms: i64,
    etag: String,
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, StoredFile>,
    dirs: BTreeSet<String>,
    next_etag: u64,
}

impl State {
    fn issue_etag(&mut self) -> String {
        self.next_etag += 1;
        format!("v{}", self.next_etag)
    }

    fn dir_exists(&self, path: &str) -> bool {
        path.is_empty() || self.dirs.contains(path)
    }
}

/// In-memory [`RemoteStore`]
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    deep_listing: bool,
    failing_dirs: Mutex<HashSet<String>>,
    list_delay: Duration,
    transfer_delay: Duration,
    in_flight_lists: AtomicUsize,
    max_in_flight_lists: AtomicUsize,
    list_calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            deep_listing: true,
            failing_dirs: Mutex::new(HashSet::new()),
            list_delay: Duration::ZERO,
            transfer_delay: Duration::ZERO,
            in_flight_lists: AtomicUsize::new(0),
            max_in_flight_lists: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Reject `Depth: infinity` with 403, like many shared hosts do
    pub fn without_deep_listing(mut self) -> Self {
        self.deep_listing = false;
        self
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    /// Delay applied to every GET and PUT
    pub fn with_transfer_delay(mut self, delay: Duration) -> Self {
        self.transfer_delay = delay;
        self
    }

    /// Make listings of `path` fail with 500
    pub fn fail_listing(&self, path: &str) {
        if let Ok(mut failing) = self.failing_dirs.lock() {
            failing.insert(normalize(path));
        }
    }

    /// Seed a file, creating its parent collections
    pub fn insert_file(&self, path: &str, data: impl Into<Vec<u8>>, mtime_ms: i64) {
        let path = normalize(path);
        let mut state = self.lock();
        let mut parent = parent_of(&path);
        while !parent.is_empty() {
            state.dirs.insert(parent.to_string());
            parent = parent_of(parent);
        }
        let etag = state.issue_etag();
        state.files.insert(
            path,
            StoredFile {
                data: data.into(),
                mtime_ms,
                etag,
            },
        );
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(&normalize(path)).map(|f| f.data.clone())
    }

    pub fn etag_of(&self, path: &str) -> Option<String> {
        self.lock().files.get(&normalize(path)).map(|f| f.etag.clone())
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.lock().dir_exists(&normalize(path))
    }

    /// All file paths currently stored
    pub fn file_paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    /// Highest number of listings that ran at the same time
    pub fn max_concurrent_lists(&self) -> usize {
        self.max_in_flight_lists.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panicking test thread must not hide the store from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_failing(&self, path: &str) -> bool {
        self.failing_dirs
            .lock()
            .map(|failing| failing.contains(path))
            .unwrap_or(false)
    }

    fn list_now(&self, path: &str, depth: Depth) -> Result<Vec<DavEntry>, SyncError> {
        if depth == Depth::Infinity && !self.deep_listing {
            return Err(http(403, path));
        }
        if self.is_failing(path) {
            return Err(http(500, path));
        }

        let state = self.lock();
        if !state.dir_exists(path) {
            return Err(http(404, path));
        }

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        let relative = |full: &str| -> Option<String> {
            let rel = full.strip_prefix(prefix.as_str())?;
            match depth {
                Depth::One if rel.contains('/') => None,
                _ => Some(rel.to_string()),
            }
        };

        let mut entries = Vec::new();
        for dir in &state.dirs {
            if let Some(rel) = relative(dir) {
                entries.push(DavEntry {
                    path: rel,
                    is_dir: true,
                    mtime_ms: None,
                    etag: None,
                });
            }
        }
        for (file_path, file) in &state.files {
            if let Some(rel) = relative(file_path) {
                entries.push(DavEntry {
                    path: rel,
                    is_dir: false,
                    mtime_ms: Some(file.mtime_ms),
                    etag: Some(file.etag.clone()),
                });
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list(&self, path: &str, depth: Depth) -> Result<Vec<DavEntry>, SyncError> {
        let path = normalize(path);
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight_lists.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight_lists.fetch_max(now, Ordering::SeqCst);

        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        let result = self.list_now(&path, depth);

        self.in_flight_lists.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, SyncError> {
        if !self.transfer_delay.is_zero() {
            tokio::time::sleep(self.transfer_delay).await;
        }
        let path = normalize(path);
        self.lock()
            .files
            .get(&path)
            .map(|f| f.data.clone())
            .ok_or_else(|| http(404, &path))
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<Option<String>, SyncError> {
        if !self.transfer_delay.is_zero() {
            tokio::time::sleep(self.transfer_delay).await;
        }
        let path = normalize(path);
        let mut state = self.lock();
        if !state.dir_exists(parent_of(&path)) {
            return Err(http(409, &path));
        }
        let etag = state.issue_etag();
        state.files.insert(
            path,
            StoredFile {
                data,
                mtime_ms: now_ms(),
                etag: etag.clone(),
            },
        );
        Ok(Some(etag))
    }

    async fn delete(&self, path: &str) -> Result<(), SyncError> {
        let path = normalize(path);
        let mut state = self.lock();
        if state.files.remove(&path).is_some() {
            return Ok(());
        }
        if !state.dirs.remove(&path) {
            return Err(http(404, &path));
        }
        let prefix = format!("{path}/");
        state.files.retain(|k, _| !k.starts_with(&prefix));
        state.dirs.retain(|k| !k.starts_with(&prefix));
        Ok(())
    }

    async fn move_to(&self, from: &str, to: &str, overwrite: bool) -> Result<(), SyncError> {
        let (from, to) = (normalize(from), normalize(to));
        let mut state = self.lock();
        if !state.files.contains_key(&from) {
            return Err(http(404, &from));
        }
        if state.files.contains_key(&to) && !overwrite {
            return Err(http(412, &to));
        }
        if !state.dir_exists(parent_of(&to)) {
            return Err(http(409, &to));
        }
        if let Some(file) = state.files.remove(&from) {
            state.files.insert(to, file);
        }
        Ok(())
    }

    async fn mkcol(&self, path: &str) -> Result<(), SyncError> {
        let path = normalize(path);
        let mut state = self.lock();
        if state.dir_exists(&path) || state.files.contains_key(&path) {
            return Err(http(405, &path));
        }
        if !state.dir_exists(parent_of(&path)) {
            return Err(http(409, &path));
        }
        state.dirs.insert(path);
        Ok(())
    }
}

/// Canonical key: no leading or trailing slash, root is ""
fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(p, _)| p).unwrap_or("")
}

fn http(status: u16, path: &str) -> SyncError {
    SyncError::Http {
        status,
        url: format!("memory:///{path}"),
    }
}

//! FileTree - Scan results for one side of the sync

use super::FileEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Files found by one scan, keyed by relative path
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileTree {
    /// Map: relative_path → FileEntry (sorted for deterministic planning)
    pub entries: BTreeMap<String, FileEntry>,

    /// Aggregate statistics
    pub total_size: u64,
    pub total_files: usize,
    pub total_dirs: usize,

    /// Files whose bytes were read to compute a fresh hash
    pub hashed_files: usize,

    /// Scan metadata
    pub scan_duration: Duration,
    pub root_path: PathBuf,
}

impl FileTree {
    /// Create a new empty FileTree
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            ..Default::default()
        }
    }

    /// Insert a file entry into the tree
    ///
    /// Updates aggregate statistics (total_size, total_files).
    /// If the path already exists, the old entry is replaced and statistics are adjusted.
    pub fn insert(&mut self, entry: FileEntry) {
        if let Some(old_entry) = self.entries.get(&entry.path) {
            self.total_size = self.total_size.saturating_sub(old_entry.size);
            self.total_files = self.total_files.saturating_sub(1);
        }

        self.total_size += entry.size;
        self.total_files += 1;
        self.entries.insert(entry.path.clone(), entry);
    }

    /// Get a file entry by path
    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.entries.get(path)
    }

    /// Check if a path exists in the tree
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Return the number of file entries in the tree
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterator over all entries in path order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileEntry)> {
        self.entries.iter()
    }

    /// Iterator over just the paths
    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Set the scan duration after scanning completes
    pub fn set_scan_duration(&mut self, duration: Duration) {
        self.scan_duration = duration;
    }

    /// Increment the directory counter
    pub fn increment_dirs(&mut self) {
        self.total_dirs += 1;
    }
}

/// Directory attributes reported by the remote server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// How the remote tree was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingStrategy {
    /// One `Depth: infinity` PROPFIND
    #[default]
    Deep,
    /// `Depth: 1` PROPFIND per collection
    Recursive,
}

/// Remote scan result: files plus collection attributes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteTree {
    pub files: FileTree,

    /// Relative collection path → attributes
    pub dirs: BTreeMap<String, DirRecord>,

    /// Collections whose listing failed and were treated as empty
    pub failed_dirs: Vec<String>,

    pub strategy: ListingStrategy,
}

impl RemoteTree {
    pub fn new(strategy: ListingStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    /// Whether `path` sits below a collection that could not be listed.
    ///
    /// Absence from the tree says nothing about such paths.
    pub fn is_under_failed_dir(&self, path: &str) -> bool {
        self.failed_dirs.iter().any(|dir| {
            dir.is_empty() || (path.starts_with(dir.as_str()) && path[dir.len()..].starts_with('/'))
        })
    }
}

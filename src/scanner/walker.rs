//! Local library walker

use crate::hash::{compute_hash, is_reusable};
use crate::meta::SyncMetadata;
use crate::types::{path, to_epoch_ms, FileEntry, FileTree, SyncError};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

/// Callback for reporting scan progress
///
/// Arguments:
/// - `files_scanned`: Total number of files scanned so far
/// - `bytes_scanned`: Total bytes scanned so far
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Progress is reported once per this many files
pub const PROGRESS_INTERVAL: u64 = 10;

/// Scan the library and build a FileTree of supported files
///
/// Hidden files and directories are skipped, as is anything whose extension is
/// not in [`path::SUPPORTED_EXTENSIONS`]. A file whose size matches the
/// previous record keeps the recorded hash without being read again.
///
/// # Errors
/// * The root itself is missing or not a directory
/// * Unreadable entries are logged and skipped, never fatal
pub fn scan_local(
    root_path: &Path,
    previous: &SyncMetadata,
    on_progress: Option<&ProgressCallback>,
) -> Result<FileTree, SyncError> {
    let start_time = Instant::now();

    if !root_path.is_dir() {
        return Err(SyncError::Config(format!(
            "Library root is not a directory: {}",
            root_path.display()
        )));
    }

    let mut tree = FileTree::new(root_path.to_path_buf());
    let mut scanned_count: u64 = 0;
    let mut scanned_bytes: u64 = 0;

    let walker = ignore::WalkBuilder::new(root_path)
        .standard_filters(false)
        .hidden(true)
        .follow_links(false)
        .build();

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "error during library traversal, continuing");
                continue;
            }
        };

        if entry.depth() == 0 {
            continue;
        }
        let Some(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            tree.increment_dirs();
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let Some(rel) = path::relative_to(root_path, entry.path()) else {
            warn!(path = %entry.path().display(), "skipping entry with non UTF-8 or unexpected path");
            continue;
        };
        if !path::is_supported(&rel) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %rel, error = %e, "failed to read metadata, skipping");
                continue;
            }
        };
        let size = metadata.len();
        let mtime_ms = match metadata.modified() {
            Ok(t) => to_epoch_ms(t),
            Err(e) => {
                warn!(path = %rel, error = %e, "failed to read modification time, skipping");
                continue;
            }
        };

        let hash = match previous.get(&rel) {
            Some(record) if is_reusable(&record.hash, record.size, size) => record.hash.clone(),
            _ => match compute_hash(entry.path()) {
                Ok(hash) => {
                    tree.hashed_files += 1;
                    hash
                }
                Err(e) => {
                    warn!(path = %rel, error = %e, "failed to hash file, skipping");
                    continue;
                }
            },
        };

        tree.insert(FileEntry::local(rel, mtime_ms, size, hash));

        scanned_count += 1;
        scanned_bytes += size;
        if scanned_count % PROGRESS_INTERVAL == 0 {
            if let Some(callback) = on_progress {
                callback(scanned_count, scanned_bytes);
            }
        }
    }

    tree.set_scan_duration(start_time.elapsed());
    debug!(
        files = tree.total_files,
        dirs = tree.total_dirs,
        hashed = tree.hashed_files,
        "local scan finished"
    );

    Ok(tree)
}

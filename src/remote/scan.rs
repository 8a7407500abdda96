//! Remote tree scanning
//!
//! One `Depth: infinity` listing is tried first. Servers that refuse it are
//! walked collection by collection with at most
//! [`MAX_CONCURRENT_LISTINGS`] listings in flight.

use super::{DavEntry, Depth, RemoteStore};
use crate::types::{path, DirRecord, FileEntry, ListingStrategy, RemoteTree, SyncError};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Upper bound on concurrent `Depth: 1` listings during the fallback walk
pub const MAX_CONCURRENT_LISTINGS: usize = 3;

/// Build the remote tree below `remote_root`.
///
/// # Errors
/// Only a failure to list the root collection itself is fatal. A failed
/// subdirectory is logged, treated as empty and recorded in
/// [`RemoteTree::failed_dirs`].
pub async fn scan_remote(
    store: Arc<dyn RemoteStore>,
    remote_root: &str,
) -> Result<RemoteTree, SyncError> {
    let start_time = Instant::now();

    let mut tree = match store.list(remote_root, Depth::Infinity).await {
        Ok(entries) => {
            let mut tree = RemoteTree::new(ListingStrategy::Deep);
            for entry in entries {
                record_entry(&mut tree, entry);
            }
            tree
        }
        Err(e) => {
            info!(error = %e, "deep listing unavailable, falling back to recursive scan");
            scan_recursive(store, remote_root).await?
        }
    };

    tree.files.set_scan_duration(start_time.elapsed());
    debug!(
        files = tree.files.len(),
        dirs = tree.dirs.len(),
        failed = tree.failed_dirs.len(),
        strategy = ?tree.strategy,
        "remote scan finished"
    );
    Ok(tree)
}

/// Add one listed entry (path already relative to the root) to the tree.
///
/// Returns true for a collection that should be descended into.
fn record_entry(tree: &mut RemoteTree, entry: DavEntry) -> bool {
    if path::has_hidden_segment(&entry.path) {
        return false;
    }
    if entry.is_dir {
        tree.files.increment_dirs();
        tree.dirs.insert(
            entry.path,
            DirRecord {
                mtime: entry.mtime_ms,
                etag: entry.etag,
            },
        );
        return true;
    }
    if path::is_supported(&entry.path) {
        tree.files
            .insert(FileEntry::remote(entry.path, entry.mtime_ms, entry.etag));
    }
    false
}

type ListingResult = (String, Result<Vec<DavEntry>, SyncError>);

async fn scan_recursive(
    store: Arc<dyn RemoteStore>,
    remote_root: &str,
) -> Result<RemoteTree, SyncError> {
    let mut tree = RemoteTree::new(ListingStrategy::Recursive);
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_LISTINGS));
    let mut join_set: JoinSet<ListingResult> = JoinSet::new();

    spawn_listing(&mut join_set, &store, &semaphore, remote_root, String::new());

    while let Some(joined) = join_set.join_next().await {
        let (rel_dir, result) =
            joined.map_err(|e| SyncError::Transport(format!("listing task failed: {e}")))?;

        let entries = match result {
            Ok(entries) => entries,
            Err(e) if rel_dir.is_empty() => return Err(e),
            Err(e) => {
                warn!(dir = %rel_dir, error = %e, "listing failed, treating collection as empty");
                tree.failed_dirs.push(rel_dir);
                continue;
            }
        };

        // Collections are always re-descended, even when their recorded
        // attributes are unchanged.
        for mut entry in entries {
            entry.path = path::join(&rel_dir, &entry.path);
            let child = entry.path.clone();
            if record_entry(&mut tree, entry) {
                spawn_listing(&mut join_set, &store, &semaphore, remote_root, child);
            }
        }
    }

    tree.failed_dirs.sort();
    Ok(tree)
}

fn spawn_listing(
    join_set: &mut JoinSet<ListingResult>,
    store: &Arc<dyn RemoteStore>,
    semaphore: &Arc<Semaphore>,
    remote_root: &str,
    rel_dir: String,
) {
    let store = Arc::clone(store);
    let semaphore = Arc::clone(semaphore);
    let remote = path::remote_path(remote_root, &rel_dir);

    join_set.spawn(async move {
        let result = async {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| SyncError::Transport(e.to_string()))?;
            store.list(&remote, Depth::One).await
        }
        .await;
        (rel_dir, result)
    });
}

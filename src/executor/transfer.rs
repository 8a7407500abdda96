//! Per-action transfers between the library and the remote store

use super::{ActionEffect, ActionOutcome, ExecutionContext, MetaChange};
use crate::hash::{compute_hash, hash_bytes};
use crate::meta::FileRecord;
use crate::types::{now_ms, path, to_epoch_ms, FileEntry, SyncError};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Write `data` to `dest` atomically using the write-then-rename strategy
///
/// 1. Write to a sibling `<name>.part` file
/// 2. Flush and sync to disk
/// 3. Stamp the modification time when one is given
/// 4. Rename over the destination
///
/// The `.part` suffix is not a supported extension, so an interrupted write
/// is never picked up by a scan.
///
/// # Example
/// ```no_run
/// use notesync::executor::write_file_atomic;
/// use std::path::Path;
///
/// let bytes = write_file_atomic(Path::new("library/note.md"), b"# Note", None)?;
/// # Ok::<(), notesync::types::SyncError>(())
/// ```
pub fn write_file_atomic(dest: &Path, data: &[u8], mtime_ms: Option<i64>) -> Result<u64, SyncError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let part_path = part_path_for(dest);
    let mut part_file = File::create(&part_path)?;
    if let Err(e) = part_file.write_all(data).and_then(|_| part_file.sync_all()) {
        drop(part_file);
        let _ = fs::remove_file(&part_path);
        return Err(e.into());
    }

    // Drop the file handle before rename (required on Windows)
    drop(part_file);

    if let Some(mtime) = mtime_ms.filter(|m| *m > 0) {
        let stamp = filetime::FileTime::from_unix_time(mtime.div_euclid(1000), (mtime.rem_euclid(1000) * 1_000_000) as u32);
        filetime::set_file_mtime(&part_path, stamp)?;
    }

    fs::rename(&part_path, dest)?;
    Ok(data.len() as u64)
}

fn part_path_for(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Modification time and size of a local file
fn stat_local(file: &Path) -> Result<(i64, u64), SyncError> {
    let metadata = fs::metadata(file)?;
    Ok((to_epoch_ms(metadata.modified()?), metadata.len()))
}

async fn blocking<T, F>(f: F) -> Result<T, SyncError>
where
    F: FnOnce() -> Result<T, SyncError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SyncError::Io(std::io::Error::other(e)))?
}

/// Record for content that now matches on both sides
fn reconciled(rel: &str, hash: String, mtime: i64, size: u64) -> FileRecord {
    FileRecord::from_entry(&FileEntry::local(rel, mtime, size, hash), now_ms())
}

async fn ensure_remote_parent(ctx: &ExecutionContext, rel: &str) {
    if let Some(parent) = path::parent(rel) {
        if !ctx.remote.dirs.contains_key(parent) {
            ctx.store
                .ensure_dir(&path::remote_path(&ctx.remote_root, parent))
                .await;
        }
    }
}

/// Send the local file and record what was sent
pub(crate) async fn upload(ctx: &ExecutionContext, rel: &str) -> Result<ActionOutcome, SyncError> {
    let local_file = path::local_path(&ctx.library_root, rel);
    let data = tokio::fs::read(&local_file).await?;
    let hash = hash_bytes(&data);
    let bytes = data.len() as u64;

    ensure_remote_parent(ctx, rel).await;
    let remote = path::remote_path(&ctx.remote_root, rel);
    let etag = ctx.store.put(&remote, data).await?;

    let (mtime, size) = stat_local(&local_file)?;
    info!(path = %rel, bytes, "uploaded");

    Ok(ActionOutcome {
        effect: ActionEffect::Uploaded,
        change: MetaChange::Set {
            path: rel.to_string(),
            record: reconciled(rel, hash, mtime, size).with_remote(Some(mtime), etag),
        },
        bytes,
    })
}

/// Fetch the remote file into the library and record it
pub(crate) async fn download(ctx: &ExecutionContext, rel: &str) -> Result<ActionOutcome, SyncError> {
    let remote = path::remote_path(&ctx.remote_root, rel);
    let data = ctx.store.get(&remote).await?;
    let hash = hash_bytes(&data);

    let remote_entry = ctx.remote.get(rel);
    let remote_mtime = remote_entry.and_then(|e| e.known_mtime());
    let remote_etag = remote_entry.and_then(|e| e.etag.clone());

    let local_file = path::local_path(&ctx.library_root, rel);
    let target = local_file.clone();
    let bytes = blocking(move || write_file_atomic(&target, &data, remote_mtime)).await?;

    let (mtime, size) = stat_local(&local_file)?;
    info!(path = %rel, bytes, "downloaded");

    Ok(ActionOutcome {
        effect: ActionEffect::Downloaded,
        change: MetaChange::Set {
            path: rel.to_string(),
            record: reconciled(rel, hash, mtime, size).with_remote(remote_mtime, remote_etag),
        },
        bytes,
    })
}

/// Rename on the server and carry the record over to the new path
pub(crate) async fn move_remote(
    ctx: &ExecutionContext,
    from: &str,
    to: &str,
) -> Result<ActionOutcome, SyncError> {
    ensure_remote_parent(ctx, to).await;
    ctx.store
        .move_to(
            &path::remote_path(&ctx.remote_root, from),
            &path::remote_path(&ctx.remote_root, to),
            true,
        )
        .await?;
    info!(from = %from, to = %to, "moved remote file");

    let local_entry = ctx.local.get(to);
    let hash = local_entry
        .map(|e| e.hash_str().to_string())
        .unwrap_or_else(|| ctx.previous.hash_of(from).to_string());
    let (mtime, size) = match stat_local(&path::local_path(&ctx.library_root, to)) {
        Ok(stat) => stat,
        Err(e) => {
            debug!(path = %to, error = %e, "stat after move failed, using scan values");
            local_entry.map(|e| (e.mtime_ms, e.size)).unwrap_or((0, 0))
        }
    };
    let remote_mtime = ctx
        .remote
        .get(from)
        .and_then(|e| e.known_mtime())
        .or_else(|| local_entry.map(|e| e.mtime_ms));

    Ok(ActionOutcome {
        effect: ActionEffect::Moved,
        change: MetaChange::Move {
            from: from.to_string(),
            to: to.to_string(),
            record: reconciled(to, hash, mtime, size).with_remote(remote_mtime, None),
        },
        bytes: 0,
    })
}

/// Delete the remote copy; a copy that is already gone counts as deleted
pub(crate) async fn delete_remote(ctx: &ExecutionContext, rel: &str) -> Result<ActionOutcome, SyncError> {
    match ctx
        .store
        .delete(&path::remote_path(&ctx.remote_root, rel))
        .await
    {
        Ok(()) => info!(path = %rel, "deleted remote file"),
        Err(e) if e.status() == Some(404) => debug!(path = %rel, "remote file already gone"),
        Err(e) => return Err(e),
    }
    Ok(ActionOutcome {
        effect: ActionEffect::DeletedRemote,
        change: MetaChange::Remove {
            path: rel.to_string(),
        },
        bytes: 0,
    })
}

/// Delete the local copy, but only if its content still matches the record
///
/// # Errors
/// [`SyncError::UnsafeDelete`] when the content changed since the last sync.
pub(crate) async fn delete_local_verified(
    ctx: &ExecutionContext,
    rel: &str,
) -> Result<ActionOutcome, SyncError> {
    let local_file = path::local_path(&ctx.library_root, rel);
    let known_hash = ctx.previous.hash_of(rel).to_string();
    let rel_owned = rel.to_string();

    let deleted = blocking(move || match compute_hash(&local_file) {
        Ok(current) if !known_hash.is_empty() && current == known_hash => {
            fs::remove_file(&local_file)?;
            Ok(true)
        }
        Ok(_) => Err(SyncError::UnsafeDelete { path: rel_owned }),
        Err(SyncError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    })
    .await?;

    if deleted {
        info!(path = %rel, "deleted local file");
    } else {
        debug!(path = %rel, "local file already gone");
    }

    Ok(ActionOutcome {
        effect: ActionEffect::DeletedLocal,
        change: MetaChange::Remove {
            path: rel.to_string(),
        },
        bytes: 0,
    })
}

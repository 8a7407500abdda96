//! SyncAction plan generation

use crate::config::SyncConfig;
use crate::diff::{local_changed, remote_change, DiffPlan, RemoteChange};
use crate::meta::SyncMetadata;
use crate::types::{
    ActionReason, FileTree, LocalDeleteStrategy, RemoteTree, SyncAction,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Generate a sync plan from the local tree, the remote tree and the last
/// reconciled state.
///
/// Renames are detected first: a local-only path whose hash equals the
/// recorded hash of a remote-only path becomes one `move-remote`, and both
/// paths are left out of the per-path pass. Every other path of
/// local ∪ remote ∪ recorded is then classified in sorted order.
///
/// # Example
/// ```
/// use notesync::config::SyncConfig;
/// use notesync::diff::generate_sync_plan;
/// use notesync::meta::SyncMetadata;
/// use notesync::types::{FileEntry, FileTree, RemoteTree, SyncAction};
/// use std::path::PathBuf;
///
/// let mut local = FileTree::new(PathBuf::from("library"));
/// local.insert(FileEntry::local("note.md", 1_000, 4, "h".to_string()));
///
/// let plan = generate_sync_plan(
///     &local,
///     &RemoteTree::default(),
///     &SyncMetadata::default(),
///     &SyncConfig::default(),
/// );
/// assert!(matches!(&plan.actions[0], SyncAction::Upload { path, .. } if path == "note.md"));
/// ```
pub fn generate_sync_plan(
    local: &FileTree,
    remote: &RemoteTree,
    previous: &SyncMetadata,
    config: &SyncConfig,
) -> DiffPlan {
    let mut plan = DiffPlan::new();

    let renames = detect_renames(local, remote, previous);
    let mut renamed: BTreeSet<&str> = BTreeSet::new();
    for (&new_path, &old_path) in &renames {
        debug!(from = %old_path, to = %new_path, "rename detected");
        renamed.insert(new_path);
        renamed.insert(old_path);
        plan.add_action(SyncAction::MoveRemote {
            from: old_path.to_string(),
            to: new_path.to_string(),
        });
    }

    let all_paths: BTreeSet<&str> = local
        .paths()
        .chain(remote.files.paths())
        .chain(previous.files.keys())
        .map(String::as_str)
        .collect();

    for path in all_paths {
        if renamed.contains(path) {
            continue;
        }
        let record = previous.get(path);

        match (local.get(path), remote.get(path)) {
            (Some(local_entry), None) => {
                let Some(record) = record else {
                    plan.stats.upload_bytes += local_entry.size;
                    plan.add_action(SyncAction::Upload {
                        path: path.to_string(),
                        reason: ActionReason::LocalNew,
                    });
                    continue;
                };

                if remote.is_under_failed_dir(path) {
                    warn!(path = %path, "remote listing incomplete, not inferring remote deletion");
                    continue;
                }

                match config.local_delete_strategy {
                    LocalDeleteStrategy::Keep => {
                        debug!(path = %path, "missing remotely, keeping local copy");
                    }
                    LocalDeleteStrategy::Ask => {
                        plan.add_action(SyncAction::RemoteDeletedAsk {
                            path: path.to_string(),
                        });
                    }
                    LocalDeleteStrategy::Auto => {
                        if local_entry.hash_str() == record.hash {
                            plan.add_action(SyncAction::DeleteLocal {
                                path: path.to_string(),
                            });
                        } else {
                            warn!(path = %path, "missing remotely but modified locally, keeping local copy");
                        }
                    }
                }
            }
            (None, Some(_)) => {
                if record.is_some() {
                    plan.add_action(SyncAction::LocalDeleted {
                        path: path.to_string(),
                    });
                } else {
                    plan.add_action(SyncAction::Download {
                        path: path.to_string(),
                        reason: ActionReason::RemoteNew,
                    });
                }
            }
            (Some(local_entry), Some(remote_entry)) => {
                let local_dirty = local_changed(local_entry, record);
                let remote_state = remote_change(remote_entry, record);

                if !local_dirty && !remote_state.is_changed() {
                    plan.stats.unchanged_count += 1;
                    continue;
                }
                if !local_dirty && remote_state == RemoteChange::MtimeDiff {
                    debug!(path = %path, "remote mtime moved but content unchanged locally, skipping");
                    plan.stats.unchanged_count += 1;
                    continue;
                }

                debug!(
                    path = %path,
                    local_changed = local_dirty,
                    remote = ?remote_state,
                    "path changed"
                );

                if local_dirty && remote_state.is_changed() {
                    plan.add_action(SyncAction::Conflict {
                        path: path.to_string(),
                        reason: ActionReason::BothModified,
                    });
                } else if local_dirty {
                    plan.stats.upload_bytes += local_entry.size;
                    plan.add_action(SyncAction::Upload {
                        path: path.to_string(),
                        reason: ActionReason::LocalModified,
                    });
                } else {
                    plan.add_action(SyncAction::Download {
                        path: path.to_string(),
                        reason: ActionReason::RemoteModified,
                    });
                }
            }
            // Known on neither side any more: nothing to transfer, the record
            // is dropped by SyncMetadata::prune_vanished
            (None, None) => {}
        }
    }

    plan
}

/// Pairs of (new local path, old remote path), matched in sorted order
fn detect_renames<'a>(
    local: &'a FileTree,
    remote: &'a RemoteTree,
    previous: &'a SyncMetadata,
) -> BTreeMap<&'a str, &'a str> {
    let local_only: Vec<&str> = local
        .paths()
        .filter(|p| !remote.contains(p))
        .map(String::as_str)
        .collect();
    let mut remote_only: BTreeSet<&str> = remote
        .files
        .paths()
        .filter(|p| !local.contains(p))
        .map(String::as_str)
        .collect();

    let mut pairs = BTreeMap::new();
    for new_path in local_only {
        let Some(hash) = local.get(new_path).map(|e| e.hash_str()).filter(|h| !h.is_empty())
        else {
            continue;
        };
        let matched = remote_only
            .iter()
            .copied()
            .find(|old_path| previous.hash_of(old_path) == hash);
        if let Some(old_path) = matched {
            remote_only.remove(old_path);
            pairs.insert(new_path, old_path);
        }
    }
    pairs
}

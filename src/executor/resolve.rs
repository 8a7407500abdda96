//! Decisions that may need the user: conflicts and deletions

use crate::types::{ConflictStrategy, FileEntry};
use async_trait::async_trait;

/// A question the executor can put to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmRequest {
    /// Both sides changed. Yes keeps the local copy, no keeps the remote one.
    Conflict { path: String },
    /// Deleted locally. Yes deletes the remote copy, no restores it locally.
    DeleteRemote { path: String },
    /// Deleted remotely. Yes deletes the local copy, no keeps it.
    DeleteLocal { path: String },
}

impl ConfirmRequest {
    pub fn path(&self) -> &str {
        match self {
            ConfirmRequest::Conflict { path }
            | ConfirmRequest::DeleteRemote { path }
            | ConfirmRequest::DeleteLocal { path } => path,
        }
    }

    /// Human-readable prompt
    pub fn prompt(&self) -> String {
        match self {
            ConfirmRequest::Conflict { path } => format!(
                "Conflict: {path} changed locally and remotely. Keep the local version?"
            ),
            ConfirmRequest::DeleteRemote { path } => format!(
                "{path} was deleted locally since the last sync. Delete the remote copy too?"
            ),
            ConfirmRequest::DeleteLocal { path } => format!(
                "{path} no longer exists on the server. Delete the local copy too?"
            ),
        }
    }
}

/// Answers confirmation requests on behalf of the user.
///
/// `None` means no answer is available; callers then take the
/// non-destructive outcome.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, request: &ConfirmRequest) -> Option<bool>;
}

/// Never answers
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConfirmer;

#[async_trait]
impl Confirmer for NoConfirmer {
    async fn confirm(&self, _request: &ConfirmRequest) -> Option<bool> {
        None
    }
}

/// Which copy survives a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

/// Pick the surviving side without asking anyone.
///
/// Returns `None` for [`ConflictStrategy::Ask`].
pub fn auto_resolve(
    strategy: ConflictStrategy,
    local: Option<&FileEntry>,
    remote: Option<&FileEntry>,
) -> Option<Side> {
    match strategy {
        ConflictStrategy::Ask => None,
        ConflictStrategy::LastWins => Some(Side::Remote),
        ConflictStrategy::Newest => {
            let local_mtime = local.map(|e| e.mtime_ms).unwrap_or(0);
            let remote_mtime = remote.map(|e| e.mtime_ms).unwrap_or(0);
            // Ties go to the remote copy
            if local_mtime > remote_mtime {
                Some(Side::Local)
            } else {
                Some(Side::Remote)
            }
        }
    }
}

/// Settle a conflict, asking the confirmer when the strategy says so.
///
/// An unanswered question keeps the remote copy.
pub async fn resolve_conflict(
    strategy: ConflictStrategy,
    confirmer: &dyn Confirmer,
    path: &str,
    local: Option<&FileEntry>,
    remote: Option<&FileEntry>,
) -> Side {
    if let Some(side) = auto_resolve(strategy, local, remote) {
        return side;
    }
    let request = ConfirmRequest::Conflict {
        path: path.to_string(),
    };
    match confirmer.confirm(&request).await {
        Some(true) => Side::Local,
        _ => Side::Remote,
    }
}

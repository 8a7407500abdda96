//! SyncAction - Actions determined by the diff engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the planner emitted an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionReason {
    LocalNew,
    LocalModified,
    RemoteNew,
    RemoteModified,
    BothModified,
    Renamed,
    RemoteDeleted,
    LocalDeleted,
}

impl ActionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionReason::LocalNew => "local-new",
            ActionReason::LocalModified => "local-modified",
            ActionReason::RemoteNew => "remote-new",
            ActionReason::RemoteModified => "remote-modified",
            ActionReason::BothModified => "both-modified",
            ActionReason::Renamed => "renamed",
            ActionReason::RemoteDeleted => "remote-deleted",
            ActionReason::LocalDeleted => "local-deleted",
        }
    }
}

impl fmt::Display for ActionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sync action determined by diff engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Send the local file to the remote store
    Upload { path: String, reason: ActionReason },

    /// Fetch the remote file into the library
    Download { path: String, reason: ActionReason },

    /// Remove the remote file (never planned, only honoured defensively)
    Delete { path: String, reason: ActionReason },

    /// Both sides changed since the last sync
    Conflict { path: String, reason: ActionReason },

    /// Rename on the remote side, `from` is the old path
    MoveRemote { from: String, to: String },

    /// Known file vanished locally but still exists remotely
    LocalDeleted { path: String },

    /// Known file vanished remotely, local copy is unchanged
    DeleteLocal { path: String },

    /// Known file vanished remotely, user decides
    RemoteDeletedAsk { path: String },
}

impl SyncAction {
    /// Path the action applies to (destination for moves)
    pub fn path(&self) -> &str {
        match self {
            SyncAction::Upload { path, .. }
            | SyncAction::Download { path, .. }
            | SyncAction::Delete { path, .. }
            | SyncAction::Conflict { path, .. }
            | SyncAction::LocalDeleted { path }
            | SyncAction::DeleteLocal { path }
            | SyncAction::RemoteDeletedAsk { path } => path,
            SyncAction::MoveRemote { to, .. } => to,
        }
    }

    /// Short kebab-case name used in logs and plan listings
    pub fn action_name(&self) -> &'static str {
        match self {
            SyncAction::Upload { .. } => "upload",
            SyncAction::Download { .. } => "download",
            SyncAction::Delete { .. } => "delete",
            SyncAction::Conflict { .. } => "conflict",
            SyncAction::MoveRemote { .. } => "move-remote",
            SyncAction::LocalDeleted { .. } => "local-deleted",
            SyncAction::DeleteLocal { .. } => "delete-local",
            SyncAction::RemoteDeletedAsk { .. } => "remote-deleted-ask",
        }
    }

    pub fn reason(&self) -> ActionReason {
        match self {
            SyncAction::Upload { reason, .. }
            | SyncAction::Download { reason, .. }
            | SyncAction::Delete { reason, .. }
            | SyncAction::Conflict { reason, .. } => *reason,
            SyncAction::MoveRemote { .. } => ActionReason::Renamed,
            SyncAction::LocalDeleted { .. } => ActionReason::LocalDeleted,
            SyncAction::DeleteLocal { .. } | SyncAction::RemoteDeletedAsk { .. } => {
                ActionReason::RemoteDeleted
            }
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::MoveRemote { from, to } => write!(f, "move-remote {} -> {}", from, to),
            other => write!(f, "{} {} ({})", other.action_name(), other.path(), other.reason()),
        }
    }
}

/// How a both-sides-changed conflict is settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// Ask the user every time
    Ask,
    /// Newer modification time wins
    #[default]
    Newest,
    /// Always keep the remote copy
    LastWins,
}

/// What to do with a local file whose remote copy disappeared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocalDeleteStrategy {
    Ask,
    /// Delete locally when the local copy is unchanged since the last sync
    #[default]
    Auto,
    Keep,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_path_and_name() {
        let upload = SyncAction::Upload {
            path: "a.md".to_string(),
            reason: ActionReason::LocalNew,
        };
        assert_eq!(upload.path(), "a.md");
        assert_eq!(upload.action_name(), "upload");
        assert_eq!(upload.reason(), ActionReason::LocalNew);

        let mv = SyncAction::MoveRemote {
            from: "old.md".to_string(),
            to: "new.md".to_string(),
        };
        assert_eq!(mv.path(), "new.md");
        assert_eq!(mv.reason(), ActionReason::Renamed);
        assert_eq!(mv.to_string(), "move-remote old.md -> new.md");
    }

    #[test]
    fn test_display_includes_reason() {
        let action = SyncAction::Conflict {
            path: "doc.md".to_string(),
            reason: ActionReason::BothModified,
        };
        assert_eq!(action.to_string(), "conflict doc.md (both-modified)");
    }

    #[test]
    fn test_strategies_deserialize_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            conflict: ConflictStrategy,
            delete: LocalDeleteStrategy,
        }

        let parsed: Wrapper =
            serde_json::from_str(r#"{"conflict":"last-wins","delete":"keep"}"#).expect("parse");
        assert_eq!(parsed.conflict, ConflictStrategy::LastWins);
        assert_eq!(parsed.delete, LocalDeleteStrategy::Keep);
        assert_eq!(ConflictStrategy::default(), ConflictStrategy::Newest);
        assert_eq!(LocalDeleteStrategy::default(), LocalDeleteStrategy::Auto);
    }
}

//! Diff plan container and statistics

use crate::types::SyncAction;

/// Diff plan containing actions and statistics
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiffPlan {
    /// Ordered sync actions: remote moves first, then per-path actions by path
    pub actions: Vec<SyncAction>,

    /// Aggregate statistics about the plan
    pub stats: PlanStats,
}

impl DiffPlan {
    /// Create a new empty diff plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action to the plan and update statistics
    pub fn add_action(&mut self, action: SyncAction) {
        match &action {
            SyncAction::Upload { .. } => self.stats.upload_count += 1,
            SyncAction::Download { .. } => self.stats.download_count += 1,
            SyncAction::MoveRemote { .. } => self.stats.move_count += 1,
            SyncAction::Conflict { .. } => self.stats.conflict_count += 1,
            SyncAction::Delete { .. }
            | SyncAction::LocalDeleted { .. }
            | SyncAction::DeleteLocal { .. }
            | SyncAction::RemoteDeletedAsk { .. } => self.stats.delete_count += 1,
        }

        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Paths touched by the plan (destination paths for moves)
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|a| a.path())
    }
}

/// Statistics about a diff plan
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlanStats {
    pub upload_count: usize,
    pub download_count: usize,
    pub move_count: usize,
    pub conflict_count: usize,

    /// Every deletion-related action, confirmed or not
    pub delete_count: usize,

    /// Paths present on both sides with nothing to do
    pub unchanged_count: usize,

    /// Bytes of local files queued for upload (conflicts excluded)
    pub upload_bytes: u64,
}

impl PlanStats {
    pub fn total_actions(&self) -> usize {
        self.upload_count
            + self.download_count
            + self.move_count
            + self.conflict_count
            + self.delete_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionReason;

    #[test]
    fn test_empty_plan() {
        let plan = DiffPlan::new();
        assert!(plan.is_empty());
        assert_eq!(plan.stats.total_actions(), 0);
    }

    #[test]
    fn test_add_action_updates_stats() {
        let mut plan = DiffPlan::new();
        plan.add_action(SyncAction::MoveRemote {
            from: "a.md".to_string(),
            to: "b.md".to_string(),
        });
        plan.add_action(SyncAction::Upload {
            path: "c.md".to_string(),
            reason: ActionReason::LocalNew,
        });
        plan.add_action(SyncAction::LocalDeleted {
            path: "d.md".to_string(),
        });
        plan.add_action(SyncAction::DeleteLocal {
            path: "e.md".to_string(),
        });

        assert_eq!(plan.len(), 4);
        assert_eq!(plan.stats.move_count, 1);
        assert_eq!(plan.stats.upload_count, 1);
        assert_eq!(plan.stats.delete_count, 2);
        assert_eq!(plan.stats.total_actions(), 4);
        assert_eq!(plan.paths().collect::<Vec<_>>(), vec!["b.md", "c.md", "d.md", "e.md"]);
    }
}

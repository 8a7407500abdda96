//! Run triggers, results and the events hosts subscribe to

use crate::config::TriggerArg;
use crate::executor::ExecutionStats;
use std::fmt;

/// What started a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// User request; always scans both sides
    Manual,
    /// App start; may be short-circuited
    Startup,
    /// App close; shorter deadline, may be short-circuited
    Shutdown,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::Manual => "manual",
            SyncTrigger::Startup => "startup",
            SyncTrigger::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TriggerArg> for SyncTrigger {
    fn from(arg: TriggerArg) -> Self {
        match arg {
            TriggerArg::Manual => SyncTrigger::Manual,
            TriggerArg::Startup => SyncTrigger::Startup,
            TriggerArg::Shutdown => SyncTrigger::Shutdown,
        }
    }
}

/// Why a run did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRunning,
    Disabled,
    NoLibrary,
    /// Library structure matches the hint and the last sync is recent
    HintUnchanged,
    /// Local scan found no change and the last sync is recent
    NoLocalChanges,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::AlreadyRunning => "a sync is already running",
            SkipReason::Disabled => "sync is disabled",
            SkipReason::NoLibrary => "no library root configured",
            SkipReason::HintUnchanged => "library unchanged since the last sync",
            SkipReason::NoLocalChanges => "no local changes and synced recently",
        };
        f.write_str(text)
    }
}

/// Outcome of one `sync_now` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: usize,
    pub downloaded: usize,
    pub moved: usize,
    /// Local and remote deletions together
    pub deleted: usize,
    pub conflicts: usize,
    pub failed: usize,
    /// Actions in the plan
    pub total: usize,
    pub skipped: Option<SkipReason>,
    pub timed_out: bool,
}

impl SyncReport {
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Default::default()
        }
    }

    pub fn from_stats(stats: &ExecutionStats) -> Self {
        Self {
            uploaded: stats.uploaded,
            downloaded: stats.downloaded,
            moved: stats.moved,
            deleted: stats.deleted_local + stats.deleted_remote,
            conflicts: stats.conflicts,
            failed: stats.failed,
            total: stats.total,
            skipped: None,
            timed_out: stats.timed_out,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    /// `up=1 down=0 moves=0 del=0 conflicts=0 total=1`
    pub fn summary_line(&self) -> String {
        format!(
            "up={} down={} moves={} del={} conflicts={} total={}",
            self.uploaded, self.downloaded, self.moved, self.deleted, self.conflicts, self.total
        )
    }
}

/// Stage of a running sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    ScanningLocal,
    ScanningRemote,
    Comparing,
    Executing,
}

/// Broadcast to subscribers while a run progresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Started {
        trigger: SyncTrigger,
    },
    Phase(SyncPhase),
    /// Local scan progress: files seen, bytes seen
    ScanProgress {
        files: u64,
        bytes: u64,
    },
    Planned {
        actions: usize,
    },
    /// One action finished; `done` counts finished actions so far
    ActionFinished {
        done: usize,
        total: usize,
        action: &'static str,
        path: String,
        error: Option<String>,
    },
    Skipped {
        trigger: SyncTrigger,
        reason: SkipReason,
    },
    Completed(SyncReport),
    Failed {
        trigger: SyncTrigger,
        message: String,
    },
}

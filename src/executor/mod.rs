//! Executor module for sync plans
//!
//! Actions run in batches of [`BATCH_SIZE`] on a [`JoinSet`]. Each action
//! returns the metadata change for its own path, and the changes are applied
//! once the batch has joined, so no two tasks ever write the same record.

mod resolve;
mod transfer;

pub use resolve::{auto_resolve, resolve_conflict, ConfirmRequest, Confirmer, NoConfirmer, Side};
pub use transfer::write_file_atomic;

use crate::config::SyncConfig;
use crate::diff::DiffPlan;
use crate::meta::{FileRecord, SyncMetadata};
use crate::remote::RemoteStore;
use crate::types::{FileTree, RemoteTree, SyncAction, SyncError};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Number of actions launched together
pub const BATCH_SIZE: usize = 5;

/// Everything an action needs, shared by the tasks of a run
pub struct ExecutionContext {
    pub store: Arc<dyn RemoteStore>,
    pub library_root: PathBuf,
    pub remote_root: String,
    pub config: SyncConfig,
    pub confirmer: Arc<dyn Confirmer>,
    /// Scan results the plan was computed from
    pub local: FileTree,
    pub remote: RemoteTree,
    /// Metadata as loaded at run start
    pub previous: SyncMetadata,
}

/// Execution progress statistics for a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Number of actions in the input plan.
    pub total: usize,
    /// Actions started before the deadline.
    pub launched: usize,
    pub completed: usize,
    pub failed: usize,
    pub uploaded: usize,
    pub downloaded: usize,
    pub moved: usize,
    pub deleted_remote: usize,
    pub deleted_local: usize,
    /// Conflicts settled, whichever side won
    pub conflicts: usize,
    /// Files left in place after a declined or unavailable confirmation
    pub kept: usize,
    /// Actions ignored on purpose
    pub skipped: usize,
    pub timed_out: bool,
    /// Bytes transferred in either direction.
    pub bytes: u64,
}

impl ExecutionStats {
    /// Actions left for the next run
    pub fn remaining(&self) -> usize {
        self.total - self.launched
    }
}

/// Events emitted while executing a plan.
#[derive(Debug)]
pub enum ExecutionEvent {
    /// Action execution started.
    ActionStart {
        index: usize,
        total: usize,
        action: &'static str,
        path: String,
    },
    /// Action execution succeeded.
    ActionSuccess {
        index: usize,
        total: usize,
        action: &'static str,
        path: String,
        bytes: u64,
    },
    /// Action execution failed but executor continued.
    ActionError {
        index: usize,
        total: usize,
        action: &'static str,
        path: String,
        error: SyncError,
    },
    /// Deadline passed; `remaining` actions were not launched.
    DeadlineReached { remaining: usize },
    /// Plan execution completed (with or without errors).
    Complete { stats: ExecutionStats },
}

/// Optional callback used to receive execution events.
pub type ExecutionCallback = dyn Fn(&ExecutionEvent) + Send + Sync;

/// Result of executing a plan
#[derive(Debug, Default)]
pub struct ExecutionOutcome {
    pub stats: ExecutionStats,
    /// Failed actions by path, in completion order
    pub errors: Vec<(String, SyncError)>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// One-line summary of the failures, if any
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let preview = self
            .errors
            .iter()
            .take(3)
            .map(|(path, err)| format!("{}: {}", path, err))
            .collect::<Vec<_>>()
            .join("; ");

        let mut summary = format!(
            "Sync completed with {} error(s). Example failures: {}",
            self.errors.len(),
            preview
        );
        let persistent = self.persistent_failures();
        if persistent > 0 {
            summary.push_str(&format!(" ({} will not clear on retry)", persistent));
        }
        Some(summary)
    }

    /// Failures a later run cannot fix without user action
    pub fn persistent_failures(&self) -> usize {
        self.errors
            .iter()
            .filter(|(_, err)| !err.is_recoverable())
            .count()
    }
}

/// What an action did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActionEffect {
    Uploaded,
    Downloaded,
    Moved,
    DeletedRemote,
    DeletedLocal,
    Kept,
    Skipped,
}

/// Metadata delta produced by one action
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MetaChange {
    Set {
        path: String,
        record: FileRecord,
    },
    Remove {
        path: String,
    },
    Move {
        from: String,
        to: String,
        record: FileRecord,
    },
    Keep,
}

impl MetaChange {
    fn apply(self, meta: &mut SyncMetadata) {
        match self {
            MetaChange::Set { path, record } => {
                meta.files.insert(path, record);
            }
            MetaChange::Remove { path } => {
                meta.files.remove(&path);
            }
            MetaChange::Move { from, to, record } => {
                meta.files.remove(&from);
                meta.files.insert(to, record);
            }
            MetaChange::Keep => {}
        }
    }
}

#[derive(Debug)]
pub(crate) struct ActionOutcome {
    pub effect: ActionEffect,
    pub change: MetaChange,
    pub bytes: u64,
}

impl ActionOutcome {
    fn unchanged(effect: ActionEffect) -> Self {
        Self {
            effect,
            change: MetaChange::Keep,
            bytes: 0,
        }
    }
}

/// Execute a sync plan
///
/// Actions are launched in batches, checking `deadline` before each launch.
/// Once the deadline has passed no new action starts; in-flight actions run
/// to completion and their results are kept. A failed action is logged,
/// reported through `on_event` and left out of `meta`, so the next run
/// retries it.
///
/// `meta` starts as the metadata loaded at run start and receives each
/// successful action's change.
pub async fn execute_plan(
    plan: &DiffPlan,
    ctx: Arc<ExecutionContext>,
    meta: &mut SyncMetadata,
    deadline: Instant,
    on_event: Option<&ExecutionCallback>,
) -> ExecutionOutcome {
    let total = plan.actions.len();
    let mut outcome = ExecutionOutcome {
        stats: ExecutionStats {
            total,
            ..Default::default()
        },
        errors: Vec::new(),
    };

    let mut next = 0;
    while next < total {
        let batch_end = (next + BATCH_SIZE).min(total);
        let mut batch = JoinSet::new();
        let mut deadline_hit = false;

        while next < batch_end {
            if Instant::now() >= deadline {
                deadline_hit = true;
                break;
            }

            let index = next + 1;
            let action = plan.actions[next].clone();
            next += 1;

            emit_event(
                on_event,
                ExecutionEvent::ActionStart {
                    index,
                    total,
                    action: action.action_name(),
                    path: action.path().to_string(),
                },
            );
            outcome.stats.launched += 1;

            let ctx = Arc::clone(&ctx);
            batch.spawn(async move {
                let result = execute_action(&ctx, &action).await;
                (index, action, result)
            });
        }

        while let Some(joined) = batch.join_next().await {
            let (index, action, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!(error = %e, "action task failed to complete");
                    outcome.stats.failed += 1;
                    outcome
                        .errors
                        .push(("<task>".to_string(), SyncError::Transport(e.to_string())));
                    continue;
                }
            };

            match result {
                Ok(done) => {
                    record_success(&mut outcome.stats, &action, &done);
                    info!(action = action.action_name(), path = %action.path(), effect = ?done.effect, "action done");
                    emit_event(
                        on_event,
                        ExecutionEvent::ActionSuccess {
                            index,
                            total,
                            action: action.action_name(),
                            path: action.path().to_string(),
                            bytes: done.bytes,
                        },
                    );
                    done.change.apply(meta);
                }
                Err(err) => {
                    outcome.stats.failed += 1;
                    if err.is_recoverable() {
                        warn!(action = action.action_name(), path = %action.path(), error = %err, "action failed, retrying next run");
                    } else {
                        error!(action = action.action_name(), path = %action.path(), error = %err, "action failed");
                    }
                    emit_event(
                        on_event,
                        ExecutionEvent::ActionError {
                            index,
                            total,
                            action: action.action_name(),
                            path: action.path().to_string(),
                            error: err.clone_for_event(),
                        },
                    );
                    outcome.errors.push((action.path().to_string(), err));
                }
            }
        }

        if deadline_hit {
            let remaining = total - next;
            outcome.stats.timed_out = true;
            warn!(remaining, "deadline reached, leaving remaining actions for the next run");
            emit_event(on_event, ExecutionEvent::DeadlineReached { remaining });
            break;
        }
    }

    emit_event(
        on_event,
        ExecutionEvent::Complete {
            stats: outcome.stats.clone(),
        },
    );

    outcome
}

fn record_success(stats: &mut ExecutionStats, action: &SyncAction, done: &ActionOutcome) {
    stats.completed += 1;
    stats.bytes += done.bytes;
    if matches!(action, SyncAction::Conflict { .. }) {
        stats.conflicts += 1;
    }
    match done.effect {
        ActionEffect::Uploaded => stats.uploaded += 1,
        ActionEffect::Downloaded => stats.downloaded += 1,
        ActionEffect::Moved => stats.moved += 1,
        ActionEffect::DeletedRemote => stats.deleted_remote += 1,
        ActionEffect::DeletedLocal => stats.deleted_local += 1,
        ActionEffect::Kept => stats.kept += 1,
        ActionEffect::Skipped => stats.skipped += 1,
    }
}

async fn execute_action(
    ctx: &ExecutionContext,
    action: &SyncAction,
) -> Result<ActionOutcome, SyncError> {
    match action {
        SyncAction::Upload { path, .. } => transfer::upload(ctx, path).await,
        SyncAction::Download { path, .. } => transfer::download(ctx, path).await,
        SyncAction::MoveRemote { from, to } => transfer::move_remote(ctx, from, to).await,
        SyncAction::Conflict { path, .. } => {
            let side = resolve_conflict(
                ctx.config.conflict_strategy,
                ctx.confirmer.as_ref(),
                path,
                ctx.local.get(path),
                ctx.remote.get(path),
            )
            .await;
            info!(path = %path, kept = ?side, "conflict resolved");
            match side {
                Side::Local => transfer::upload(ctx, path).await,
                Side::Remote => transfer::download(ctx, path).await,
            }
        }
        SyncAction::LocalDeleted { path } => {
            let delete_remote = !ctx.config.confirm_delete_remote
                || ctx
                    .confirmer
                    .confirm(&ConfirmRequest::DeleteRemote { path: path.clone() })
                    .await
                    == Some(true);
            if delete_remote {
                transfer::delete_remote(ctx, path).await
            } else {
                info!(path = %path, "remote deletion not confirmed, restoring local copy");
                transfer::download(ctx, path).await
            }
        }
        SyncAction::DeleteLocal { path } => transfer::delete_local_verified(ctx, path).await,
        SyncAction::RemoteDeletedAsk { path } => {
            let confirmed = ctx
                .confirmer
                .confirm(&ConfirmRequest::DeleteLocal { path: path.clone() })
                .await
                == Some(true);
            if confirmed {
                transfer::delete_local_verified(ctx, path).await
            } else {
                info!(path = %path, "local deletion not confirmed, keeping file");
                Ok(ActionOutcome::unchanged(ActionEffect::Kept))
            }
        }
        SyncAction::Delete { path, reason } => {
            warn!(path = %path, reason = %reason, "unexpected remote delete action, skipping");
            Ok(ActionOutcome::unchanged(ActionEffect::Skipped))
        }
    }
}

fn emit_event(on_event: Option<&ExecutionCallback>, event: ExecutionEvent) {
    if let Some(callback) = on_event {
        callback(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::generate_sync_plan;
    use crate::meta::FileRecord;
    use crate::remote::{scan_remote, MemoryStore};
    use crate::scanner::scan_local;
    use crate::types::{ActionReason, ConflictStrategy, LocalDeleteStrategy};
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    const ROOT: &str = "/notes";

    struct Answer(Option<bool>);

    #[async_trait]
    impl Confirmer for Answer {
        async fn confirm(&self, _request: &ConfirmRequest) -> Option<bool> {
            self.0
        }
    }

    async fn context_for(
        library: &Path,
        store: &Arc<MemoryStore>,
        previous: SyncMetadata,
        config: SyncConfig,
        confirmer: Arc<dyn Confirmer>,
    ) -> Arc<ExecutionContext> {
        let store: Arc<dyn RemoteStore> = store.clone();
        store.ensure_dir(ROOT).await;
        let local = scan_local(library, &previous, None).expect("scan local");
        let remote = scan_remote(Arc::clone(&store), ROOT)
            .await
            .expect("scan remote");
        Arc::new(ExecutionContext {
            store,
            library_root: library.to_path_buf(),
            remote_root: ROOT.to_string(),
            config,
            confirmer,
            local,
            remote,
            previous,
        })
    }

    async fn run(ctx: &Arc<ExecutionContext>, meta: &mut SyncMetadata) -> ExecutionOutcome {
        let plan = generate_sync_plan(&ctx.local, &ctx.remote, &ctx.previous, &ctx.config);
        execute_plan(
            &plan,
            Arc::clone(ctx),
            meta,
            Instant::now() + Duration::from_secs(30),
            None,
        )
        .await
    }

    fn record_for(library: &Path, rel: &str) -> FileRecord {
        let data = fs::read(library.join(rel)).expect("read");
        FileRecord {
            hash: crate::hash::hash_bytes(&data),
            size: data.len() as u64,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upload_and_download() {
        let library = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(library.path().join("sub")).expect("mkdir");
        fs::write(library.path().join("sub/note.md"), "local note").expect("write");

        let store = Arc::new(MemoryStore::new());
        store.insert_file("/notes/shared.md", "from server", 1_600_000_000_000);

        let previous = SyncMetadata::default();
        let ctx = context_for(
            library.path(),
            &store,
            previous.clone(),
            SyncConfig::default(),
            Arc::new(NoConfirmer),
        )
        .await;
        let mut meta = previous;
        let outcome = run(&ctx, &mut meta).await;

        assert!(outcome.is_success(), "{:?}", outcome.error_summary());
        assert_eq!(outcome.stats.uploaded, 1);
        assert_eq!(outcome.stats.downloaded, 1);
        assert_eq!(
            store.file("/notes/sub/note.md").as_deref(),
            Some(&b"local note"[..])
        );
        assert_eq!(
            fs::read_to_string(library.path().join("shared.md")).expect("read"),
            "from server"
        );

        let uploaded = meta.get("sub/note.md").expect("upload record");
        assert_eq!(uploaded.hash, crate::hash::hash_bytes(b"local note"));
        assert_eq!(uploaded.remote_etag, store.etag_of("/notes/sub/note.md"));

        let downloaded = meta.get("shared.md").expect("download record");
        assert_eq!(downloaded.remote_mtime, Some(1_600_000_000_000));
        assert_eq!(downloaded.mtime, 1_600_000_000_000);
    }

    #[tokio::test]
    async fn test_local_deleted_without_confirmation_deletes_remote() {
        let library = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(MemoryStore::new());
        store.insert_file("/notes/gone.md", "bye", 1_000);

        let mut previous = SyncMetadata::default();
        previous.files.insert(
            "gone.md".to_string(),
            FileRecord {
                hash: crate::hash::hash_bytes(b"bye"),
                ..Default::default()
            },
        );
        let config = SyncConfig {
            confirm_delete_remote: false,
            ..Default::default()
        };

        let ctx = context_for(library.path(), &store, previous.clone(), config, Arc::new(NoConfirmer)).await;
        let mut meta = previous;
        let outcome = run(&ctx, &mut meta).await;

        assert_eq!(outcome.stats.deleted_remote, 1);
        assert!(store.file("/notes/gone.md").is_none());
        assert!(meta.get("gone.md").is_none());
    }

    #[tokio::test]
    async fn test_local_deleted_unconfirmed_restores() {
        let library = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(MemoryStore::new());
        store.insert_file("/notes/gone.md", "bye", 1_000);

        let mut previous = SyncMetadata::default();
        previous.files.insert(
            "gone.md".to_string(),
            FileRecord {
                hash: crate::hash::hash_bytes(b"bye"),
                ..Default::default()
            },
        );

        let ctx = context_for(
            library.path(),
            &store,
            previous.clone(),
            SyncConfig::default(),
            Arc::new(NoConfirmer),
        )
        .await;
        let mut meta = previous;
        let outcome = run(&ctx, &mut meta).await;

        assert_eq!(outcome.stats.downloaded, 1);
        assert!(store.file("/notes/gone.md").is_some());
        assert!(library.path().join("gone.md").exists());
    }

    #[tokio::test]
    async fn test_delete_local_refuses_modified_content() {
        let library = TempDir::new().expect("Failed to create temp dir");
        fs::write(library.path().join("doc.md"), "synced").expect("write");
        let store = Arc::new(MemoryStore::new());
        store.ensure_dir(ROOT).await;

        let mut previous = SyncMetadata::default();
        previous
            .files
            .insert("doc.md".to_string(), record_for(library.path(), "doc.md"));

        let ctx = context_for(
            library.path(),
            &store,
            previous.clone(),
            SyncConfig::default(),
            Arc::new(NoConfirmer),
        )
        .await;

        // Edited between planning and execution
        fs::write(library.path().join("doc.md"), "edited after the scan").expect("write");

        let mut plan = DiffPlan::new();
        plan.add_action(SyncAction::DeleteLocal {
            path: "doc.md".to_string(),
        });
        let mut meta = previous;
        let outcome = execute_plan(
            &plan,
            Arc::clone(&ctx),
            &mut meta,
            Instant::now() + Duration::from_secs(30),
            None,
        )
        .await;

        assert_eq!(outcome.stats.failed, 1);
        assert!(matches!(outcome.errors[0].1, SyncError::UnsafeDelete { .. }));
        assert!(library.path().join("doc.md").exists());
        assert!(meta.get("doc.md").is_some());
    }

    #[tokio::test]
    async fn test_remote_deleted_ask() {
        let library = TempDir::new().expect("Failed to create temp dir");
        fs::write(library.path().join("a.md"), "a").expect("write");
        fs::write(library.path().join("b.md"), "b").expect("write");
        let store = Arc::new(MemoryStore::new());

        let mut previous = SyncMetadata::default();
        for rel in ["a.md", "b.md"] {
            previous
                .files
                .insert(rel.to_string(), record_for(library.path(), rel));
        }
        let config = SyncConfig {
            local_delete_strategy: LocalDeleteStrategy::Ask,
            ..Default::default()
        };

        let declined = context_for(
            library.path(),
            &store,
            previous.clone(),
            config.clone(),
            Arc::new(Answer(Some(false))),
        )
        .await;
        let mut meta = previous.clone();
        let outcome = run(&declined, &mut meta).await;
        assert_eq!(outcome.stats.kept, 2);
        assert!(library.path().join("a.md").exists());
        assert!(meta.get("a.md").is_some());

        let accepted = context_for(
            library.path(),
            &store,
            previous.clone(),
            config,
            Arc::new(Answer(Some(true))),
        )
        .await;
        let mut meta = previous;
        let outcome = run(&accepted, &mut meta).await;
        assert_eq!(outcome.stats.deleted_local, 2);
        assert!(!library.path().join("a.md").exists());
        assert!(meta.files.is_empty());
    }

    #[tokio::test]
    async fn test_conflict_last_wins_downloads() {
        let library = TempDir::new().expect("Failed to create temp dir");
        fs::write(library.path().join("doc.md"), "local edit").expect("write");
        let store = Arc::new(MemoryStore::new());
        store.insert_file("/notes/doc.md", "remote edit", 5_000);

        let mut previous = SyncMetadata::default();
        previous.files.insert(
            "doc.md".to_string(),
            FileRecord {
                hash: crate::hash::hash_bytes(b"base"),
                remote_etag: Some("stale".to_string()),
                ..Default::default()
            },
        );
        let config = SyncConfig {
            conflict_strategy: ConflictStrategy::LastWins,
            ..Default::default()
        };

        let ctx = context_for(library.path(), &store, previous.clone(), config, Arc::new(NoConfirmer)).await;
        let mut meta = previous;
        let outcome = run(&ctx, &mut meta).await;

        assert_eq!(outcome.stats.conflicts, 1);
        assert_eq!(outcome.stats.downloaded, 1);
        assert_eq!(
            fs::read_to_string(library.path().join("doc.md")).expect("read"),
            "remote edit"
        );
    }

    #[tokio::test]
    async fn test_delete_action_is_skipped() {
        let library = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(MemoryStore::new());
        store.insert_file("/notes/keep.md", "x", 1_000);

        let ctx = context_for(
            library.path(),
            &store,
            SyncMetadata::default(),
            SyncConfig::default(),
            Arc::new(NoConfirmer),
        )
        .await;

        let mut plan = DiffPlan::new();
        plan.add_action(SyncAction::Delete {
            path: "keep.md".to_string(),
            reason: ActionReason::LocalDeleted,
        });
        let mut meta = SyncMetadata::default();
        let outcome = execute_plan(
            &plan,
            ctx,
            &mut meta,
            Instant::now() + Duration::from_secs(30),
            None,
        )
        .await;

        assert_eq!(outcome.stats.skipped, 1);
        assert!(store.file("/notes/keep.md").is_some());
    }

    #[tokio::test]
    async fn test_failed_action_is_not_recorded() {
        let library = TempDir::new().expect("Failed to create temp dir");
        fs::write(library.path().join("good.md"), "good").expect("write");
        let store = Arc::new(MemoryStore::new());

        let ctx = context_for(
            library.path(),
            &store,
            SyncMetadata::default(),
            SyncConfig::default(),
            Arc::new(NoConfirmer),
        )
        .await;

        let mut plan = DiffPlan::new();
        plan.add_action(SyncAction::Download {
            path: "missing.md".to_string(),
            reason: ActionReason::RemoteNew,
        });
        plan.add_action(SyncAction::Upload {
            path: "good.md".to_string(),
            reason: ActionReason::LocalNew,
        });
        let mut meta = SyncMetadata::default();
        let outcome = execute_plan(
            &plan,
            ctx,
            &mut meta,
            Instant::now() + Duration::from_secs(30),
            None,
        )
        .await;

        assert_eq!(outcome.stats.failed, 1);
        assert_eq!(outcome.stats.completed, 1);
        assert!(meta.get("missing.md").is_none());
        assert!(meta.get("good.md").is_some());
        let summary = outcome.error_summary().expect("summary");
        assert!(summary.contains("missing.md"));
    }

    #[test]
    fn test_error_summary_counts_persistent_failures() {
        let outcome = ExecutionOutcome {
            stats: ExecutionStats::default(),
            errors: vec![
                ("a.md".to_string(), SyncError::Transport("reset".to_string())),
                ("b.md".to_string(), SyncError::Metadata("read-only".to_string())),
            ],
        };

        assert_eq!(outcome.persistent_failures(), 1);
        let summary = outcome.error_summary().expect("summary");
        assert!(summary.contains("2 error(s)"));
        assert!(summary.contains("1 will not clear on retry"));
    }

    #[tokio::test]
    async fn test_deadline_stops_launching() {
        let library = TempDir::new().expect("Failed to create temp dir");
        for i in 0..12 {
            fs::write(library.path().join(format!("n{i:02}.md")), format!("note {i}")).expect("write");
        }
        let store = Arc::new(MemoryStore::new().with_transfer_delay(Duration::from_millis(200)));

        let ctx = context_for(
            library.path(),
            &store,
            SyncMetadata::default(),
            SyncConfig::default(),
            Arc::new(NoConfirmer),
        )
        .await;
        let plan = generate_sync_plan(&ctx.local, &ctx.remote, &ctx.previous, &ctx.config);
        assert_eq!(plan.len(), 12);

        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let events_ref = Arc::clone(&events);
        let callback = move |event: &ExecutionEvent| {
            if let ExecutionEvent::DeadlineReached { remaining } = event {
                events_ref
                    .lock()
                    .expect("lock events")
                    .push(format!("deadline {remaining}"));
            }
        };

        // Room for the first batch only
        let mut meta = SyncMetadata::default();
        let outcome = execute_plan(
            &plan,
            Arc::clone(&ctx),
            &mut meta,
            Instant::now() + Duration::from_millis(100),
            Some(&callback),
        )
        .await;

        assert!(outcome.stats.timed_out);
        assert_eq!(outcome.stats.launched, BATCH_SIZE);
        assert_eq!(outcome.stats.uploaded, BATCH_SIZE);
        assert_eq!(meta.files.len(), BATCH_SIZE);
        assert_eq!(store.file_paths().len(), BATCH_SIZE);
        assert_eq!(
            events.lock().expect("lock events").clone(),
            vec![format!("deadline {}", 12 - BATCH_SIZE)]
        );
    }

    #[tokio::test]
    async fn test_execute_plan_emits_events() {
        let library = TempDir::new().expect("Failed to create temp dir");
        fs::write(library.path().join("new.md"), "new").expect("write");
        let store = Arc::new(MemoryStore::new());

        let ctx = context_for(
            library.path(),
            &store,
            SyncMetadata::default(),
            SyncConfig::default(),
            Arc::new(NoConfirmer),
        )
        .await;
        let plan = generate_sync_plan(&ctx.local, &ctx.remote, &ctx.previous, &ctx.config);

        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let events_ref = Arc::clone(&events);
        let callback = move |event: &ExecutionEvent| {
            let label = match event {
                ExecutionEvent::ActionStart { .. } => "start",
                ExecutionEvent::ActionSuccess { .. } => "success",
                ExecutionEvent::ActionError { .. } => "error",
                ExecutionEvent::DeadlineReached { .. } => "deadline",
                ExecutionEvent::Complete { .. } => "complete",
            };
            events_ref
                .lock()
                .expect("lock events")
                .push(label.to_string());
        };

        let mut meta = SyncMetadata::default();
        let outcome = execute_plan(
            &plan,
            ctx,
            &mut meta,
            Instant::now() + Duration::from_secs(30),
            Some(&callback),
        )
        .await;
        assert_eq!(outcome.stats.failed, 0);

        let snapshot = events.lock().expect("lock events snapshot").clone();
        assert_eq!(snapshot, vec!["start", "success", "complete"]);
    }
}

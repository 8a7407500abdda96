//! Sync orchestration
//!
//! [`SyncEngine`] owns one run at a time: scan the library, scan the remote
//! tree, plan, execute under a deadline and persist what succeeded. Hosts
//! drive it through [`SyncEngine::sync_now`] and the hooks in [`hooks`], and
//! follow progress through [`SyncEngine::subscribe`].

mod events;
mod gate;
pub mod hooks;

pub use events::{SkipReason, SyncEvent, SyncPhase, SyncReport, SyncTrigger};
pub use gate::{RunGate, RunGuard, RunState};
pub use hooks::{CloseDecision, HostWindow, STARTUP_DELAY};

use crate::config::SyncConfig;
use crate::diff::{generate_sync_plan, DiffPlan};
use crate::executor::{
    execute_plan, Confirmer, ExecutionContext, ExecutionEvent, NoConfirmer,
};
use crate::meta::{hint, LoadOutcome, MetadataStore, SyncMetadata};
use crate::remote::{scan_remote, RemoteStore, WebDavClient};
use crate::scanner::{scan_local, ProgressCallback};
use crate::types::{now_ms, FileTree, RemoteTree, SyncError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Buffered events per subscriber before the oldest are dropped
const EVENT_CAPACITY: usize = 256;

/// Plan computed without executing it
#[derive(Debug, Clone)]
pub struct SyncPreview {
    pub plan: DiffPlan,
    pub local_files: usize,
    pub remote_files: usize,
    /// Remote collections that could not be listed
    pub failed_dirs: Vec<String>,
}

/// Drives sync runs against one library and one remote store
pub struct SyncEngine {
    config: SyncConfig,
    store: Arc<dyn RemoteStore>,
    metadata: MetadataStore,
    confirmer: Arc<dyn Confirmer>,
    gate: RunGate,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    pub fn new(config: SyncConfig, store: Arc<dyn RemoteStore>, metadata: MetadataStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            store,
            metadata,
            confirmer: Arc::new(NoConfirmer),
            gate: RunGate::new(),
            events,
        }
    }

    /// Engine talking WebDAV to the configured server, with metadata in the
    /// configured data directory
    pub fn from_config(config: SyncConfig) -> Result<Self, SyncError> {
        let client = WebDavClient::new(
            &config.base_url,
            &config.username,
            &config.password,
            config.timeout(),
        )?;
        let metadata = MetadataStore::in_dir(&config.resolved_data_dir());
        Ok(Self::new(config, Arc::new(client), metadata))
    }

    /// Answer conflict and deletion questions through `confirmer`
    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn metadata_store(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn is_running(&self) -> bool {
        self.gate.state() == RunState::Running
    }

    /// Receive events of every later run
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Run one sync.
    ///
    /// Skips (already running, disabled, nothing changed) come back as a
    /// report with [`SyncReport::skipped`] set. Per-file failures are counted
    /// in the report. Only failures that stop the whole run, such as an
    /// unreadable library or remote root, are returned as errors.
    pub async fn sync_now(&self, trigger: SyncTrigger) -> Result<SyncReport, SyncError> {
        let Some(_guard) = self.gate.try_start() else {
            info!(trigger = %trigger, "sync already in progress, skipping request");
            return Ok(self.skip(trigger, SkipReason::AlreadyRunning));
        };

        info!(trigger = %trigger, "sync started");
        self.emit(SyncEvent::Started { trigger });

        let result = self.run(trigger).await;
        match &result {
            Ok(report) if report.is_skipped() => {}
            Ok(report) => self.emit(SyncEvent::Completed(report.clone())),
            Err(e) => {
                error!(trigger = %trigger, error = %e, "sync failed");
                self.emit(SyncEvent::Failed {
                    trigger,
                    message: e.to_string(),
                });
            }
        }
        info!(trigger = %trigger, "sync finished");
        result
    }

    fn skip(&self, trigger: SyncTrigger, reason: SkipReason) -> SyncReport {
        info!(trigger = %trigger, reason = %reason, "sync skipped");
        self.emit(SyncEvent::Skipped { trigger, reason });
        SyncReport::skipped(reason)
    }

    async fn run(&self, trigger: SyncTrigger) -> Result<SyncReport, SyncError> {
        if !self.config.enabled {
            return Ok(self.skip(trigger, SkipReason::Disabled));
        }
        let Some(library_root) = self.config.library_root.clone() else {
            return Ok(self.skip(trigger, SkipReason::NoLibrary));
        };
        let remote_root = self.config.root_path.clone();
        info!(library = %library_root.display(), remote_root = %remote_root, "preparing sync");

        self.store.ensure_dir(&remote_root).await;
        let previous = self.load_metadata();

        let smart_skip = trigger != SyncTrigger::Manual && self.config.skip_remote_scan_minutes > 0;
        let since_last_sync = now_ms() - previous.last_sync_time;
        let recently_synced =
            smart_skip && since_last_sync < self.config.skip_window().as_millis() as i64;

        if recently_synced && hint_unchanged(&library_root).await {
            return Ok(self.skip(trigger, SkipReason::HintUnchanged));
        }

        self.emit(SyncEvent::Phase(SyncPhase::ScanningLocal));
        let local = self.scan_library(&library_root, &previous).await?;
        let local_changes = has_local_changes(&local, &previous);

        if recently_synced && !local_changes && !local.is_empty() {
            info!(seconds_since_last_sync = since_last_sync / 1000, "no local changes and synced recently");
            return Ok(self.skip(trigger, SkipReason::NoLocalChanges));
        }

        self.emit(SyncEvent::Phase(SyncPhase::ScanningRemote));
        info!(local_changes, "scanning remote files");
        let remote = scan_remote(Arc::clone(&self.store), &remote_root).await?;

        self.emit(SyncEvent::Phase(SyncPhase::Comparing));
        let plan = generate_sync_plan(&local, &remote, &previous, &self.config);
        info!(actions = plan.len(), "plan ready");
        self.emit(SyncEvent::Planned {
            actions: plan.len(),
        });

        let budget = match trigger {
            SyncTrigger::Shutdown => self.config.shutdown_timeout(),
            _ => self.config.timeout(),
        };
        let deadline = Instant::now() + budget;

        let mut meta = previous.clone();
        meta.last_sync_time = now_ms();
        meta.merge_dirs(&remote);
        let pruned = meta.prune_vanished(&local, &remote);
        if pruned > 0 {
            debug!(pruned, "dropped records for paths gone on both sides");
        }

        let ctx = Arc::new(ExecutionContext {
            store: Arc::clone(&self.store),
            library_root: library_root.clone(),
            remote_root,
            config: self.config.clone(),
            confirmer: Arc::clone(&self.confirmer),
            local,
            remote,
            previous,
        });

        self.emit(SyncEvent::Phase(SyncPhase::Executing));
        let finished = AtomicUsize::new(0);
        let events = self.events.clone();
        let forward = move |event: &ExecutionEvent| {
            let (total, action, path, error) = match event {
                ExecutionEvent::ActionSuccess {
                    total, action, path, ..
                } => (*total, *action, path.clone(), None),
                ExecutionEvent::ActionError {
                    total,
                    action,
                    path,
                    error,
                    ..
                } => (*total, *action, path.clone(), Some(error.to_string())),
                _ => return,
            };
            let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
            let _ = events.send(SyncEvent::ActionFinished {
                done,
                total,
                action,
                path,
                error,
            });
        };
        let outcome = execute_plan(&plan, ctx, &mut meta, deadline, Some(&forward)).await;

        info!(files = meta.files.len(), "saving sync metadata");
        self.metadata.save(&meta)?;
        refresh_hint(&library_root).await;

        let report = SyncReport::from_stats(&outcome.stats);
        if let Some(summary) = outcome.error_summary() {
            warn!("{}", summary);
        }
        if report.timed_out {
            warn!(remaining = outcome.stats.remaining(), "sync stopped at the deadline");
        }
        info!(summary = %report.summary_line(), failed = report.failed, "sync done");
        Ok(report)
    }

    /// Compute the plan a sync would execute, changing nothing
    pub async fn preview(&self) -> Result<SyncPreview, SyncError> {
        let Some(library_root) = self.config.library_root.clone() else {
            return Err(SyncError::Config("No library root configured".to_string()));
        };
        let previous = self.metadata.load();
        let local = self.scan_library(&library_root, &previous).await?;
        let remote: RemoteTree = scan_remote(Arc::clone(&self.store), &self.config.root_path).await?;
        let plan = generate_sync_plan(&local, &remote, &previous, &self.config);

        Ok(SyncPreview {
            plan,
            local_files: local.len(),
            remote_files: remote.files.len(),
            failed_dirs: remote.failed_dirs.clone(),
        })
    }

    fn load_metadata(&self) -> SyncMetadata {
        let (meta, outcome) = self.metadata.load_detailed();
        match outcome {
            LoadOutcome::Corrupted { backup } => warn!(
                backup = ?backup,
                "sync metadata was corrupted, starting from empty state"
            ),
            LoadOutcome::Empty => warn!("sync metadata file was empty"),
            LoadOutcome::Loaded | LoadOutcome::Missing => {}
        }
        meta
    }

    async fn scan_library(
        &self,
        library_root: &Path,
        previous: &SyncMetadata,
    ) -> Result<FileTree, SyncError> {
        let root = library_root.to_path_buf();
        let previous = previous.clone();
        let events = self.events.clone();
        let progress: ProgressCallback = Box::new(move |files, bytes| {
            let _ = events.send(SyncEvent::ScanProgress { files, bytes });
        });

        let tree = tokio::task::spawn_blocking(move || scan_local(&root, &previous, Some(&progress)))
            .await
            .map_err(|e| SyncError::Io(std::io::Error::other(e)))??;
        info!(
            files = tree.total_files,
            hashed = tree.hashed_files,
            elapsed_ms = tree.scan_duration.as_millis() as u64,
            "local scan complete"
        );
        Ok(tree)
    }
}

/// Structure hint check before any scan.
///
/// An empty library never matches, so the remote side still gets a look.
async fn hint_unchanged(library_root: &Path) -> bool {
    let root: PathBuf = library_root.to_path_buf();
    let checked = tokio::task::spawn_blocking(move || {
        let current = hint::summarize(&root);
        if current.total_files == 0 {
            info!("library is empty, scanning remote anyway");
            return false;
        }
        hint::read_hint(&root).is_some_and(|last| last.matches(&current))
    })
    .await;

    match checked {
        Ok(unchanged) => unchanged,
        Err(e) => {
            warn!(error = %e, "structure hint check failed, continuing");
            false
        }
    }
}

async fn refresh_hint(library_root: &Path) {
    let root = library_root.to_path_buf();
    let written = tokio::task::spawn_blocking(move || {
        let current = hint::summarize(&root);
        hint::write_hint(&root, &current);
    })
    .await;
    if let Err(e) = written {
        warn!(error = %e, "failed to refresh structure hint");
    }
}

/// Any new path, changed hash, or recorded path missing locally
fn has_local_changes(local: &FileTree, previous: &SyncMetadata) -> bool {
    let changed = local
        .iter()
        .any(|(path, entry)| previous.get(path).map(|r| r.hash.as_str()) != Some(entry.hash_str()));
    changed || previous.files.keys().any(|path| !local.contains(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::FileRecord;
    use crate::remote::MemoryStore;
    use crate::types::FileEntry;
    use std::fs;
    use tempfile::TempDir;

    fn engine(library: &Path, data: &Path, store: Arc<MemoryStore>, config: SyncConfig) -> SyncEngine {
        let config = SyncConfig {
            base_url: "https://dav.example.com".to_string(),
            library_root: Some(library.to_path_buf()),
            ..config
        };
        SyncEngine::new(config, store, MetadataStore::in_dir(data))
    }

    #[test]
    fn test_has_local_changes() {
        let mut local = FileTree::new(PathBuf::from("lib"));
        local.insert(FileEntry::local("a.md", 1, 1, "h1".to_string()));

        let mut previous = SyncMetadata::default();
        assert!(has_local_changes(&local, &previous));

        previous.files.insert(
            "a.md".to_string(),
            FileRecord {
                hash: "h1".to_string(),
                ..Default::default()
            },
        );
        assert!(!has_local_changes(&local, &previous));

        previous.files.insert("b.md".to_string(), FileRecord::default());
        assert!(has_local_changes(&local, &previous));
    }

    #[tokio::test]
    async fn test_disabled_and_missing_library_skip() {
        let data = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(MemoryStore::new());

        let disabled = SyncEngine::new(
            SyncConfig {
                enabled: false,
                ..Default::default()
            },
            store.clone(),
            MetadataStore::in_dir(data.path()),
        );
        let report = disabled.sync_now(SyncTrigger::Manual).await.expect("sync");
        assert_eq!(report.skipped, Some(SkipReason::Disabled));

        let no_library = SyncEngine::new(SyncConfig::default(), store, MetadataStore::in_dir(data.path()));
        let report = no_library.sync_now(SyncTrigger::Manual).await.expect("sync");
        assert_eq!(report.skipped, Some(SkipReason::NoLibrary));
    }

    #[tokio::test]
    async fn test_run_creates_remote_root_and_saves_metadata() {
        let library = TempDir::new().expect("Failed to create temp dir");
        let data = TempDir::new().expect("Failed to create temp dir");
        fs::write(library.path().join("note.md"), "hello").expect("write");
        let store = Arc::new(MemoryStore::new());

        let engine = engine(library.path(), data.path(), store.clone(), SyncConfig::default());
        let mut events = engine.subscribe();

        let report = engine.sync_now(SyncTrigger::Manual).await.expect("sync");
        assert_eq!(report.uploaded, 1);
        assert!(store.has_dir("/notes"));
        assert!(library.path().join(hint::HINT_FILE_NAME).exists());

        let meta = engine.metadata_store().load();
        assert!(meta.last_sync_time > 0);
        assert_eq!(meta.hash_of("note.md"), crate::hash::hash_bytes(b"hello"));

        assert_eq!(
            events.recv().await.expect("event"),
            SyncEvent::Started {
                trigger: SyncTrigger::Manual
            }
        );
        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event);
        }
        assert!(matches!(last, Some(SyncEvent::Completed(r)) if r.uploaded == 1));
    }

    #[tokio::test]
    async fn test_startup_run_skips_when_hint_matches() {
        let library = TempDir::new().expect("Failed to create temp dir");
        let data = TempDir::new().expect("Failed to create temp dir");
        fs::write(library.path().join("note.md"), "hello").expect("write");
        let store = Arc::new(MemoryStore::new());
        let engine = engine(library.path(), data.path(), store.clone(), SyncConfig::default());

        engine.sync_now(SyncTrigger::Manual).await.expect("first sync");
        let listings = store.list_calls();

        let report = engine.sync_now(SyncTrigger::Startup).await.expect("second sync");
        assert_eq!(report.skipped, Some(SkipReason::HintUnchanged));
        assert_eq!(store.list_calls(), listings);

        // Manual runs never short-circuit
        let report = engine.sync_now(SyncTrigger::Manual).await.expect("manual sync");
        assert!(!report.is_skipped());
        assert_eq!(report.total, 0);
    }

    #[tokio::test]
    async fn test_no_local_changes_skips_remote_scan() {
        let library = TempDir::new().expect("Failed to create temp dir");
        let data = TempDir::new().expect("Failed to create temp dir");
        fs::write(library.path().join("note.md"), "hello").expect("write");
        let store = Arc::new(MemoryStore::new());
        let engine = engine(library.path(), data.path(), store.clone(), SyncConfig::default());

        engine.sync_now(SyncTrigger::Manual).await.expect("first sync");
        // Structure changes, content does not
        fs::create_dir(library.path().join("empty")).expect("mkdir");
        let listings = store.list_calls();

        let report = engine.sync_now(SyncTrigger::Shutdown).await.expect("second sync");
        assert_eq!(report.skipped, Some(SkipReason::NoLocalChanges));
        assert_eq!(store.list_calls(), listings);
    }

    #[tokio::test]
    async fn test_file_deleted_on_both_sides_is_forgotten() {
        let library = TempDir::new().expect("Failed to create temp dir");
        let data = TempDir::new().expect("Failed to create temp dir");
        fs::write(library.path().join("keep.md"), "keep").expect("write");
        fs::write(library.path().join("gone.md"), "gone").expect("write");
        let store = Arc::new(MemoryStore::new());
        let engine = engine(library.path(), data.path(), store.clone(), SyncConfig::default());

        engine.sync_now(SyncTrigger::Manual).await.expect("first sync");
        assert!(engine.metadata_store().load().get("gone.md").is_some());

        fs::remove_file(library.path().join("gone.md")).expect("remove");
        store.delete("/notes/gone.md").await.expect("remote delete");
        engine.sync_now(SyncTrigger::Manual).await.expect("second sync");

        let meta = engine.metadata_store().load();
        assert!(meta.get("gone.md").is_none());
        assert!(meta.get("keep.md").is_some());

        // Nothing stale left behind, so the shutdown skip still applies
        fs::create_dir(library.path().join("empty")).expect("mkdir");
        let report = engine.sync_now(SyncTrigger::Shutdown).await.expect("third sync");
        assert_eq!(report.skipped, Some(SkipReason::NoLocalChanges));
    }

    #[tokio::test]
    async fn test_zero_window_disables_smart_skip() {
        let library = TempDir::new().expect("Failed to create temp dir");
        let data = TempDir::new().expect("Failed to create temp dir");
        fs::write(library.path().join("note.md"), "hello").expect("write");
        let store = Arc::new(MemoryStore::new());
        let config = SyncConfig {
            skip_remote_scan_minutes: 0,
            ..Default::default()
        };
        let engine = engine(library.path(), data.path(), store, config);

        engine.sync_now(SyncTrigger::Manual).await.expect("first sync");
        let report = engine.sync_now(SyncTrigger::Startup).await.expect("second sync");
        assert!(!report.is_skipped());
    }

    #[tokio::test]
    async fn test_remote_root_failure_is_an_error() {
        let library = TempDir::new().expect("Failed to create temp dir");
        let data = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(MemoryStore::new().without_deep_listing());
        store.insert_file("/notes/a.md", "a", 1_000);
        store.fail_listing("/notes");

        let engine = engine(library.path(), data.path(), store, SyncConfig::default());
        let mut events = engine.subscribe();

        let result = engine.sync_now(SyncTrigger::Manual).await;
        assert!(result.is_err());
        assert!(!engine.is_running());
        assert!(!engine.metadata_store().path().exists());

        let mut failed = false;
        while let Ok(event) = events.try_recv() {
            failed |= matches!(event, SyncEvent::Failed { .. });
        }
        assert!(failed);
    }

    #[tokio::test]
    async fn test_preview_changes_nothing() {
        let library = TempDir::new().expect("Failed to create temp dir");
        let data = TempDir::new().expect("Failed to create temp dir");
        fs::write(library.path().join("note.md"), "hello").expect("write");
        let store = Arc::new(MemoryStore::new());
        store.insert_file("/notes/remote.md", "r", 1_000);

        let engine = engine(library.path(), data.path(), store.clone(), SyncConfig::default());
        let preview = engine.preview().await.expect("preview");

        assert_eq!(preview.plan.len(), 2);
        assert_eq!(preview.local_files, 1);
        assert_eq!(preview.remote_files, 1);
        assert!(store.file("/notes/note.md").is_none());
        assert!(!library.path().join("remote.md").exists());
        assert!(!engine.metadata_store().path().exists());
    }
}

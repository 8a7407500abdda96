//! Host integration: startup and window-close hooks

use super::{SyncEngine, SyncReport, SyncTrigger};
use crate::types::SyncError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Pause between app start and the startup sync
pub const STARTUP_DELAY: Duration = Duration::from_millis(600);

/// The application window, as far as the close hook needs it
#[async_trait]
pub trait HostWindow: Send + Sync {
    /// Open documents with unsaved edits
    fn has_unsaved_changes(&self) -> bool;

    async fn hide(&self) -> Result<(), SyncError>;

    /// Tear the window down and exit
    async fn destroy(&self) -> Result<(), SyncError>;

    /// Regular close, used when `destroy` fails
    async fn close(&self) -> Result<(), SyncError>;
}

/// What the close hook did with a close request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseDecision {
    /// Unsaved changes: the close is held back for the host's own prompt
    Deferred,
    /// Sync on exit is off; the host closes as usual
    Proceed,
    /// The window was hidden, synced and destroyed. `None` when the sync failed.
    SyncedAndExited(Option<SyncReport>),
}

impl SyncEngine {
    /// Schedule the startup sync after [`STARTUP_DELAY`].
    ///
    /// Returns `None` when sync or sync-on-startup is turned off.
    pub fn on_startup(self: &Arc<Self>) -> Option<JoinHandle<Result<SyncReport, SyncError>>> {
        if !(self.config().enabled && self.config().on_startup) {
            return None;
        }
        let engine = Arc::clone(self);
        Some(tokio::spawn(async move {
            tokio::time::sleep(STARTUP_DELAY).await;
            engine.sync_now(SyncTrigger::Startup).await
        }))
    }

    /// Handle a window close request.
    ///
    /// With sync on exit enabled the window is hidden, a shutdown sync runs
    /// to completion and the window is destroyed afterwards, whether the sync
    /// succeeded or not.
    pub async fn on_close_requested(&self, window: &dyn HostWindow) -> CloseDecision {
        if window.has_unsaved_changes() {
            info!("unsaved changes, leaving the close request to the host");
            return CloseDecision::Deferred;
        }
        if !(self.config().enabled && self.config().on_shutdown) {
            return CloseDecision::Proceed;
        }

        info!("sync on exit enabled, hiding window");
        if let Err(e) = window.hide().await {
            warn!(error = %e, "failed to hide window");
        }

        let report = match self.sync_now(SyncTrigger::Shutdown).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, "shutdown sync failed");
                None
            }
        };

        info!("shutdown sync finished, exiting");
        if let Err(e) = window.destroy().await {
            warn!(error = %e, "failed to destroy window, closing instead");
            if let Err(e) = window.close().await {
                warn!(error = %e, "failed to close window");
            }
        }
        CloseDecision::SyncedAndExited(report)
    }
}

//! Progress reporting

use crate::engine::{SyncEvent, SyncPhase};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter for sync runs, fed from the engine's event stream
pub struct ProgressReporter {
    scan_bar: ProgressBar,
    transfer_bar: ProgressBar,
    failed: usize,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let scan_bar = ProgressBar::new_spinner();
        scan_bar.enable_steady_tick(Duration::from_millis(120));
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            scan_bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
        }

        let transfer_bar = ProgressBar::new(0);
        if let Ok(style) =
            ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} actions | {msg}")
        {
            transfer_bar.set_style(style.progress_chars("=>-"));
        }

        Self {
            scan_bar,
            transfer_bar,
            failed: 0,
        }
    }

    /// Hidden reporter, for non-interactive output
    pub fn hidden() -> Self {
        Self {
            scan_bar: ProgressBar::hidden(),
            transfer_bar: ProgressBar::hidden(),
            failed: 0,
        }
    }

    /// Update the bars for one engine event
    pub fn handle(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::Started { trigger } => {
                self.scan_bar.set_message(format!("Starting {} sync...", trigger));
            }
            SyncEvent::Phase(phase) => self.set_phase(*phase),
            SyncEvent::ScanProgress { files, bytes } => {
                self.scan_bar.set_message(format!(
                    "Scanning library... {} files | {}",
                    files,
                    HumanBytes(*bytes)
                ));
            }
            SyncEvent::Planned { actions } => {
                self.scan_bar
                    .finish_with_message(format!("Compared: {} action(s) to run", actions));
                self.transfer_bar.set_length(*actions as u64);
                self.transfer_bar.set_position(0);
            }
            SyncEvent::ActionFinished {
                done,
                action,
                path,
                error,
                ..
            } => {
                self.transfer_bar.set_position(*done as u64);
                match error {
                    Some(message) => {
                        self.failed += 1;
                        self.transfer_bar
                            .println(format!("ERROR {} {}: {}", action, path, message));
                    }
                    None => self.transfer_bar.set_message(format!("{} {}", action, path)),
                }
            }
            SyncEvent::Skipped { reason, .. } => {
                self.scan_bar
                    .finish_with_message(format!("Skipped: {}", reason));
            }
            SyncEvent::Completed(report) => {
                self.transfer_bar.finish_with_message(format!(
                    "Done: {} | {} failed{}",
                    report.summary_line(),
                    report.failed,
                    if report.timed_out { " | stopped at deadline" } else { "" }
                ));
            }
            SyncEvent::Failed { message, .. } => {
                self.scan_bar.abandon_with_message(format!("Sync failed: {}", message));
                self.transfer_bar.abandon();
            }
        }
    }

    fn set_phase(&self, phase: SyncPhase) {
        let label = match phase {
            SyncPhase::ScanningLocal => "Scanning library...",
            SyncPhase::ScanningRemote => "Scanning remote files...",
            SyncPhase::Comparing => "Comparing...",
            SyncPhase::Executing => "Syncing...",
        };
        self.scan_bar.set_message(label.to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SkipReason, SyncReport, SyncTrigger};

    #[test]
    fn test_actions_advance_transfer_bar() {
        let mut reporter = ProgressReporter::hidden();
        reporter.handle(&SyncEvent::Planned { actions: 2 });
        reporter.handle(&SyncEvent::ActionFinished {
            done: 1,
            total: 2,
            action: "upload",
            path: "a.md".to_string(),
            error: None,
        });

        assert_eq!(reporter.transfer_bar.position(), 1);
        assert_eq!(reporter.transfer_bar.length(), Some(2));
        assert!(reporter.transfer_bar.message().contains("upload a.md"));
    }

    #[test]
    fn test_failed_actions_are_counted() {
        let mut reporter = ProgressReporter::hidden();
        reporter.handle(&SyncEvent::Planned { actions: 1 });
        reporter.handle(&SyncEvent::ActionFinished {
            done: 1,
            total: 1,
            action: "download",
            path: "b.md".to_string(),
            error: Some("HTTP 500".to_string()),
        });
        assert_eq!(reporter.failed, 1);
    }

    #[test]
    fn test_every_event_is_handled() {
        let mut reporter = ProgressReporter::hidden();
        reporter.handle(&SyncEvent::Started {
            trigger: SyncTrigger::Manual,
        });
        reporter.handle(&SyncEvent::Phase(SyncPhase::ScanningLocal));
        reporter.handle(&SyncEvent::ScanProgress {
            files: 10,
            bytes: 2048,
        });
        reporter.handle(&SyncEvent::Skipped {
            trigger: SyncTrigger::Startup,
            reason: SkipReason::HintUnchanged,
        });
        reporter.handle(&SyncEvent::Completed(SyncReport::default()));
        reporter.handle(&SyncEvent::Failed {
            trigger: SyncTrigger::Manual,
            message: "boom".to_string(),
        });
    }
}

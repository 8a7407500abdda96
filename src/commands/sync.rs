//! Main sync command

use crate::config::{SyncArgs, SyncConfig};
use crate::diff::DiffPlan;
use crate::engine::{SyncEngine, SyncEvent, SyncPreview, SyncReport, SyncTrigger};
use crate::executor::{ConfirmRequest, Confirmer};
use crate::types::{SyncAction, SyncError};
use crate::ui::ProgressReporter;
use async_trait::async_trait;
use indicatif::HumanBytes;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Asks on the terminal. Questions are serialized so concurrent actions
/// never interleave their prompts.
#[derive(Debug, Default)]
pub struct StdinConfirmer {
    prompt_lock: tokio::sync::Mutex<()>,
}

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, request: &ConfirmRequest) -> Option<bool> {
        let _turn = self.prompt_lock.lock().await;
        let prompt = request.prompt();
        tokio::task::spawn_blocking(move || {
            eprint!("{} [y/N] ", prompt);
            let _ = std::io::stderr().flush();
            let mut line = String::new();
            match std::io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => None,
                Ok(_) => Some(parse_answer(&line)),
            }
        })
        .await
        .ok()
        .flatten()
    }
}

fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Run the sync operation
pub async fn run(config: SyncConfig, args: &SyncArgs) -> Result<SyncReport, SyncError> {
    let mut engine = SyncEngine::from_config(config)?;
    if !args.non_interactive {
        engine = engine.with_confirmer(Arc::new(StdinConfirmer::default()));
    }

    if args.dry_run {
        let preview = engine.preview().await?;
        println!("{}", format_plan_preview(&preview));
        println!("{}", format_dry_run_actions(&preview.plan));
        println!("Dry-run mode: no changes were made.");
        return Ok(SyncReport::default());
    }

    let mut events = engine.subscribe();
    let progress_task = tokio::spawn(async move {
        let mut reporter = ProgressReporter::new();
        let mut failures: Vec<ErrorRecord> = Vec::new();
        loop {
            match events.recv().await {
                Ok(event) => {
                    reporter.handle(&event);
                    if let SyncEvent::ActionFinished {
                        action,
                        path,
                        error: Some(message),
                        ..
                    } = &event
                    {
                        failures.push(ErrorRecord {
                            action: *action,
                            path: path.clone(),
                            message: message.clone(),
                        });
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        failures
    });

    let trigger = SyncTrigger::from(args.trigger);
    let result = engine.sync_now(trigger).await;

    // Closing the channel ends the progress task
    drop(engine);
    let failures = progress_task.await.unwrap_or_default();

    let report = result?;
    if let Some(reason) = report.skipped {
        println!("Sync skipped: {}", reason);
    } else if report.total == 0 {
        println!("Nothing to sync.");
    }
    if !failures.is_empty() {
        println!("{}", format_error_summary(&failures));
    }
    Ok(report)
}

fn format_plan_preview(preview: &SyncPreview) -> String {
    let stats = &preview.plan.stats;
    let mut text = format!(
        "Plan ({} local, {} remote files):\n  Upload: {}  Download: {}  Move: {}  Conflict: {}  Delete: {}  Unchanged: {}\n  Total bytes to upload: {}",
        preview.local_files,
        preview.remote_files,
        stats.upload_count,
        stats.download_count,
        stats.move_count,
        stats.conflict_count,
        stats.delete_count,
        stats.unchanged_count,
        HumanBytes(stats.upload_bytes)
    );
    if !preview.failed_dirs.is_empty() {
        text.push_str(&format!(
            "\n  Unlisted remote folders (deletions there are not inferred): {}",
            preview.failed_dirs.join(", ")
        ));
    }
    text
}

fn format_dry_run_actions(plan: &DiffPlan) -> String {
    if plan.actions.is_empty() {
        return "Dry-run actions:\n  (no planned actions)".to_string();
    }

    let mut lines = Vec::with_capacity(plan.actions.len() + 1);
    lines.push("Dry-run actions:".to_string());
    for action in &plan.actions {
        let line = match action {
            SyncAction::MoveRemote { from, to } => format!("  {:<19} {} -> {}", "MOVE", from, to),
            other => format!(
                "  {:<19} {} ({})",
                other.action_name().to_ascii_uppercase(),
                other.path(),
                other.reason()
            ),
        };
        lines.push(line);
    }
    lines.join("\n")
}

#[derive(Debug)]
struct ErrorRecord {
    action: &'static str,
    path: String,
    message: String,
}

fn format_error_summary(records: &[ErrorRecord]) -> String {
    let mut groups: BTreeMap<&'static str, Vec<&ErrorRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.action).or_default().push(record);
    }

    let mut lines = Vec::new();
    lines.push("Error summary (failed actions are retried on the next sync):".to_string());
    for (action, items) in groups {
        lines.push(format!("  {} ({}):", action, items.len()));
        for record in items.iter().take(3) {
            lines.push(format!("    - {}: {}", record.path, record.message));
        }
        if items.len() > 3 {
            lines.push(format!("    - ... {} more", items.len() - 3));
        }
    }
    lines.join("\n")
}

/// Plain-English hint for a run-level failure
pub fn suggestion_for(error: &SyncError) -> Option<&'static str> {
    match error {
        SyncError::Http { status: 401, .. } | SyncError::Http { status: 403, .. } => {
            Some("Check the WebDAV username and password.")
        }
        SyncError::Http { status: 404, .. } => Some("Check the server URL and rootPath."),
        SyncError::Transport(_) => Some("Check the server URL and your network connection."),
        SyncError::Xml(_) => Some("The server does not look like a WebDAV endpoint."),
        SyncError::Config(_) => Some("Fix the configuration file or pass --library."),
        _ => None,
    }
}

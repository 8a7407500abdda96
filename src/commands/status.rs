//! `status` command: configuration summary and last sync state

use crate::config::SyncConfig;
use crate::logging::log_path;
use crate::meta::{LoadOutcome, MetadataStore, SyncMetadata};
use chrono::{Local, TimeZone};

/// Print the status report
pub fn run(config: &SyncConfig) {
    let store = MetadataStore::in_dir(&config.resolved_data_dir());
    let (meta, outcome) = store.load_detailed();
    println!("{}", format_status(config, &store, &meta, &outcome));
}

fn format_status(
    config: &SyncConfig,
    store: &MetadataStore,
    meta: &SyncMetadata,
    outcome: &LoadOutcome,
) -> String {
    let library = config
        .library_root
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string());
    let server = if config.base_url.is_empty() {
        "(not set)".to_string()
    } else {
        format!("{}{}", config.base_url.trim_end_matches('/'), config.root_path)
    };

    let mut lines = vec![
        format!("Sync:        {}", if config.enabled { "enabled" } else { "disabled" }),
        format!("Library:     {}", library),
        format!("Server:      {}", server),
        format!(
            "Strategies:  conflict={:?} local-delete={:?} confirm-remote-delete={}",
            config.conflict_strategy, config.local_delete_strategy, config.confirm_delete_remote
        ),
        format!("Last sync:   {}", format_sync_time(meta.last_sync_time)),
        format!("Tracked:     {} file(s)", meta.files.len()),
        format!("Metadata:    {}", store.path().display()),
        format!(
            "Log:         {}",
            log_path(&config.resolved_data_dir()).display()
        ),
    ];
    if let LoadOutcome::Corrupted { backup } = outcome {
        lines.push(format!(
            "Warning:     metadata unreadable{}",
            backup
                .as_ref()
                .map(|b| format!(", backed up to {}", b.display()))
                .unwrap_or_default()
        ));
    }
    lines.join("\n")
}

fn format_sync_time(millis: i64) -> String {
    if millis <= 0 {
        return "never".to_string();
    }
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "unknown".to_string(),
    }
}

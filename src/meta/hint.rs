//! Local structure hint: a cheap fingerprint of the library
//!
//! Only used to guess that nothing changed since the last run. The full
//! local scan stays authoritative.

use crate::types::{path, to_epoch_ms};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Hint file name at the library root (hidden, so never synced itself)
pub const HINT_FILE_NAME: &str = ".notesync-hint.json";

/// Max mtime drift still counted as "same"
const MTIME_TOLERANCE_MS: i64 = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStructureHint {
    pub total_dirs: usize,
    pub total_files: usize,
    pub max_mtime: i64,
}

impl LocalStructureHint {
    /// Same counts and max mtime within a second
    pub fn matches(&self, other: &LocalStructureHint) -> bool {
        self.total_dirs == other.total_dirs
            && self.total_files == other.total_files
            && (self.max_mtime - other.max_mtime).abs() <= MTIME_TOLERANCE_MS
    }
}

/// Walk `root` counting directories and supported files, skipping hidden entries.
///
/// Unreadable entries are ignored.
pub fn summarize(root: &Path) -> LocalStructureHint {
    let mut hint = LocalStructureHint::default();

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .follow_links(false)
        .build();

    for entry in walker.flatten() {
        if entry.depth() == 0 {
            continue;
        }
        let Some(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            hint.total_dirs += 1;
        } else if file_type.is_file() {
            let name = entry.file_name().to_string_lossy();
            if !path::is_supported(&name) {
                continue;
            }
            hint.total_files += 1;
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified().map_err(Into::into)) {
                hint.max_mtime = hint.max_mtime.max(to_epoch_ms(modified));
            }
        }
    }

    hint
}

/// Hint stored at the library root, `None` when missing or unreadable
pub fn read_hint(root: &Path) -> Option<LocalStructureHint> {
    let raw = fs::read_to_string(root.join(HINT_FILE_NAME)).ok()?;
    if raw.trim().is_empty() {
        return None;
    }
    serde_json::from_str(&raw).ok()
}

/// Store the hint at the library root. Failures are only logged.
pub fn write_hint(root: &Path, hint: &LocalStructureHint) {
    let result = serde_json::to_vec(hint)
        .map_err(std::io::Error::other)
        .and_then(|json| fs::write(root.join(HINT_FILE_NAME), json));
    if let Err(e) = result {
        debug!(error = %e, "failed to write structure hint");
    }
}

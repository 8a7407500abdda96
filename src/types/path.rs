//! Relative path helpers shared by the scanners, planner and executor.
//!
//! Synced paths are always forward-slash strings relative to the library root
//! (`"dir/note.md"`), independent of the host OS separator.

use std::path::{Component, Path, PathBuf};

/// File extensions that take part in synchronization (lowercase).
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "md", "markdown", "txt", "png", "jpg", "jpeg", "gif", "svg", "pdf",
];

/// Whether `path` ends in one of the supported extensions (case-insensitive).
pub fn is_supported(path: &str) -> bool {
    let name = file_name(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

/// Dot-prefixed names are hidden and never synced.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Whether any segment of a relative path is hidden.
pub fn has_hidden_segment(path: &str) -> bool {
    path.split('/').any(is_hidden_name)
}

/// Last segment of a relative path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parent of a relative path, `None` for top-level entries.
pub fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(dir, _)| dir).filter(|d| !d.is_empty())
}

/// Join a parent relative path and a child name.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Convert a path below `root` into its forward-slash relative form.
pub fn relative_to(root: &Path, full: &Path) -> Option<String> {
    let rel = full.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Local filesystem location of a relative path.
pub fn local_path(root: &Path, rel: &str) -> PathBuf {
    let mut full = root.to_path_buf();
    for segment in rel.split('/').filter(|s| !s.is_empty()) {
        full.push(segment);
    }
    full
}

/// Remote location of a relative path under the configured remote root.
pub fn remote_path(remote_root: &str, rel: &str) -> String {
    let root = remote_root.trim_end_matches('/');
    let rel = rel.trim_start_matches('/');
    if rel.is_empty() {
        root.to_string()
    } else {
        format!("{}/{}", root, rel)
    }
}

//! Metadata persistence with corruption recovery

use super::SyncMetadata;
use crate::types::{now_ms, SyncError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default metadata file name inside the data directory
pub const METADATA_FILE_NAME: &str = "notesync-sync-meta.json";

/// What `load` found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Missing,
    Empty,
    /// Content could not be parsed; the file was preserved at `backup`
    Corrupted { backup: Option<PathBuf> },
}

/// Reads and writes the metadata file
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default file name inside `data_dir`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(METADATA_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last persisted state, or empty state when nothing usable is stored
    pub fn load(&self) -> SyncMetadata {
        self.load_detailed().0
    }

    /// Like [`load`](Self::load), also reporting what was found.
    ///
    /// Never fails: unreadable or malformed content yields empty state and the
    /// bad file is copied to `<name>.corrupted.<millis>` first.
    pub fn load_detailed(&self) -> (SyncMetadata, LoadOutcome) {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return (SyncMetadata::default(), LoadOutcome::Missing);
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read sync metadata");
                let backup = self.backup_corrupted();
                return (SyncMetadata::default(), LoadOutcome::Corrupted { backup });
            }
        };

        if raw.trim().is_empty() {
            return (SyncMetadata::default(), LoadOutcome::Empty);
        }

        match serde_json::from_str::<SyncMetadata>(&raw) {
            Ok(mut meta) => {
                meta.normalize();
                debug!(files = meta.files.len(), "loaded sync metadata");
                (meta, LoadOutcome::Loaded)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "sync metadata is corrupted, starting fresh");
                let backup = self.backup_corrupted();
                (SyncMetadata::default(), LoadOutcome::Corrupted { backup })
            }
        }
    }

    /// Persist metadata atomically (temp file, fsync, rename)
    pub fn save(&self, meta: &SyncMetadata) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(meta)?;
        let tmp = self.sibling(".tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }

        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            SyncError::Metadata(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn backup_corrupted(&self) -> Option<PathBuf> {
        let backup = self.sibling(&format!(".corrupted.{}", now_ms()));
        match fs::copy(&self.path, &backup) {
            Ok(_) => {
                warn!(backup = %backup.display(), "backed up corrupted sync metadata");
                Some(backup)
            }
            Err(e) => {
                warn!(error = %e, "failed to back up corrupted sync metadata");
                None
            }
        }
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| METADATA_FILE_NAME.into());
        name.push(suffix);
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::FileRecord;
    use tempfile::TempDir;

    fn sample() -> SyncMetadata {
        let mut meta = SyncMetadata {
            last_sync_time: 42,
            ..Default::default()
        };
        meta.files.insert(
            "a.md".to_string(),
            FileRecord {
                hash: "h".to_string(),
                mtime: 1,
                size: 2,
                sync_time: 3,
                remote_mtime: Some(1),
                remote_etag: Some("e".to_string()),
            },
        );
        meta
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().expect("tempdir");
        let store = MetadataStore::in_dir(dir.path());
        let (meta, outcome) = store.load_detailed();

        assert_eq!(meta, SyncMetadata::default());
        assert_eq!(outcome, LoadOutcome::Missing);
    }

    #[test]
    fn test_empty_file_is_empty_state() {
        let dir = TempDir::new().expect("tempdir");
        let store = MetadataStore::in_dir(dir.path());
        fs::write(store.path(), "  \n").expect("write");

        assert_eq!(store.load_detailed().1, LoadOutcome::Empty);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().expect("tempdir");
        let store = MetadataStore::in_dir(&dir.path().join("nested"));
        store.save(&sample()).expect("save");

        let (meta, outcome) = store.load_detailed();
        assert_eq!(outcome, LoadOutcome::Loaded);
        assert_eq!(meta, sample());
        assert!(!dir.path().join("nested").join(format!("{METADATA_FILE_NAME}.tmp")).exists());
    }

    #[test]
    fn test_corrupted_file_is_backed_up() {
        let dir = TempDir::new().expect("tempdir");
        let store = MetadataStore::in_dir(dir.path());
        fs::write(store.path(), "{not json").expect("write");

        let (meta, outcome) = store.load_detailed();
        assert_eq!(meta, SyncMetadata::default());

        let backup = match outcome {
            LoadOutcome::Corrupted { backup: Some(b) } => b,
            other => panic!("unexpected outcome: {other:?}"),
        };
        let name = backup.file_name().and_then(|n| n.to_str()).expect("name");
        assert!(name.starts_with(&format!("{METADATA_FILE_NAME}.corrupted.")));
        assert_eq!(fs::read_to_string(&backup).expect("read"), "{not json");
    }
}

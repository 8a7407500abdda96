//! Error types for notesync

use thiserror::Error;

/// Error types for notesync operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Standard IO error (automatically converted via #[from])
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Connection-level failure talking to the remote store
    #[error("Transport error: {0}")]
    Transport(String),

    /// Multi-status body could not be parsed
    #[error("Malformed WebDAV response: {0}")]
    Xml(String),

    /// Metadata file could not be written or read
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local delete refused because the file changed since the last sync
    #[error("Refusing to delete {path}: content changed since last sync")]
    UnsafeDelete { path: String },
}

impl SyncError {
    /// Errors coming from the network or the remote server
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            SyncError::Http { .. } | SyncError::Transport(_) | SyncError::Xml(_)
        )
    }

    /// Whether retrying on the next run can reasonably succeed
    pub fn is_recoverable(&self) -> bool {
        self.is_transport_error() || matches!(self, SyncError::Io(_) | SyncError::UnsafeDelete { .. })
    }

    /// HTTP status, when the error carries one
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build an owned copy suitable for handing to event listeners.
    ///
    /// `io::Error` is not `Clone`, so it is rebuilt from its kind and message.
    pub fn clone_for_event(&self) -> SyncError {
        match self {
            SyncError::Io(e) => SyncError::Io(std::io::Error::new(e.kind(), e.to_string())),
            SyncError::Config(msg) => SyncError::Config(msg.clone()),
            SyncError::Http { status, url } => SyncError::Http {
                status: *status,
                url: url.clone(),
            },
            SyncError::Transport(msg) => SyncError::Transport(msg.clone()),
            SyncError::Xml(msg) => SyncError::Xml(msg.clone()),
            SyncError::Metadata(msg) => SyncError::Metadata(msg.clone()),
            SyncError::Json(e) => SyncError::Metadata(e.to_string()),
            SyncError::UnsafeDelete { path } => SyncError::UnsafeDelete { path: path.clone() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_io_error_automatic_conversion() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let err: SyncError = io_error.into();

        assert!(matches!(err, SyncError::Io(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_io_error_from_function() {
        fn returns_io_error() -> Result<(), SyncError> {
            let _file = std::fs::File::open("/nonexistent/path/file.md")?;
            Ok(())
        }

        let result = returns_io_error();
        assert!(matches!(result.unwrap_err(), SyncError::Io(_)));
    }

    #[test]
    fn test_http_error_display_and_status() {
        let error = SyncError::Http {
            status: 403,
            url: "https://dav.example.com/notes".to_string(),
        };
        assert!(error.to_string().contains("HTTP 403"));
        assert!(error.to_string().contains("dav.example.com"));
        assert_eq!(error.status(), Some(403));
        assert!(error.is_transport_error());
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_unsafe_delete() {
        let error = SyncError::UnsafeDelete {
            path: "notes/edited.md".to_string(),
        };
        assert!(error.to_string().contains("notes/edited.md"));
        assert!(!error.is_transport_error());
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_config_errors_are_not_recoverable() {
        assert!(!SyncError::Config("error".to_string()).is_recoverable());
        assert!(!SyncError::Metadata("disk full".to_string()).is_recoverable());
        assert!(SyncError::Transport("reset".to_string()).is_recoverable());
    }

    #[test]
    fn test_clone_for_event_preserves_variant() {
        let original = SyncError::Io(IoError::new(ErrorKind::PermissionDenied, "nope"));
        let cloned = original.clone_for_event();
        match cloned {
            SyncError::Io(e) => assert_eq!(e.kind(), ErrorKind::PermissionDenied),
            other => panic!("unexpected variant: {other:?}"),
        }

        let http = SyncError::Http {
            status: 500,
            url: "u".to_string(),
        };
        assert_eq!(http.clone_for_event().status(), Some(500));
    }

    #[test]
    fn test_result_propagation() {
        fn inner_function() -> Result<(), SyncError> {
            Err(SyncError::Config("test error".to_string()))
        }

        fn outer_function() -> Result<(), SyncError> {
            inner_function()?;
            Ok(())
        }

        assert!(matches!(outer_function().unwrap_err(), SyncError::Config(_)));
    }
}

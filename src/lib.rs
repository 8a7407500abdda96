//! # notesync - WebDAV sync for a local notes library
//!
//! Keeps a folder of Markdown notes and their attachments in step with a
//! WebDAV collection. Changes are detected by content hash against the last
//! reconciled state, renames become a single remote MOVE, and local files
//! are only deleted when their content is verified unchanged.

// Module declarations
pub mod config;
pub mod scanner;
pub mod diff;
pub mod executor;
pub mod engine;
pub mod hash;
pub mod meta;
pub mod remote;
pub mod logging;
pub mod ui;
pub mod commands;
pub mod types;

// Re-export commonly used types
pub use config::SyncConfig;
pub use engine::{SyncEngine, SyncEvent, SyncReport, SyncTrigger};
pub use types::{FileEntry, FileTree, SyncAction, SyncError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Core type definitions for notesync

mod action;
mod entry;
mod error;
pub mod path;
mod tree;

pub use action::{ActionReason, ConflictStrategy, LocalDeleteStrategy, SyncAction};
pub use entry::{now_ms, to_epoch_ms, FileEntry};
pub use error::SyncError;
pub use tree::{DirRecord, FileTree, ListingStrategy, RemoteTree};

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, SyncError>;

//! Local library scanning

mod walker;

pub use walker::{scan_local, ProgressCallback, PROGRESS_INTERVAL};

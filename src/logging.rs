//! Sync log setup
//!
//! Every run is appended to `notesync-sync.log` in the data directory, with
//! a shorter view on stderr.

use std::path::{Path, PathBuf};

use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::Layer as _;

/// Sync log file name inside the data directory
pub const LOG_FILE_NAME: &str = "notesync-sync.log";

/// Keeps the file logger alive; drop it only at exit
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Where the sync log lives for a given data directory
pub fn log_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

/// Install the file and console layers.
///
/// The file gets everything this crate logs at debug level and above unless
/// `RUST_LOG` says otherwise. The console shows info, or debug when
/// `verbose` is set.
pub fn init(log_dir: &Path, verbose: bool) -> std::io::Result<(LogGuard, PathBuf)> {
    std::fs::create_dir_all(log_dir)?;

    // Append-only, never rotated
    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let console_level = if verbose {
        tracing_subscriber::filter::LevelFilter::DEBUG
    } else {
        tracing_subscriber::filter::LevelFilter::INFO
    };
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_level);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,notesync=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(std::io::Error::other)?;

    Ok((LogGuard { _guard: guard }, log_path(log_dir)))
}

//! Configuration management

mod cli;

pub use cli::{Cli, Command, SyncArgs, TriggerArg};

use crate::types::{ConflictStrategy, LocalDeleteStrategy, SyncError};
use globset::{Glob, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Smallest accepted operation timeout
pub const MIN_TIMEOUT_MS: u64 = 1000;

/// Deadline cap for the run triggered by closing the app
pub const SHUTDOWN_TIMEOUT_CAP_MS: u64 = 60_000;

/// Configuration file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Sync settings, stored as TOML with the same keys the settings UI uses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub on_startup: bool,
    pub on_shutdown: bool,

    /// Per-run deadline for executing the plan, and per-request HTTP timeout
    pub timeout_ms: u64,

    /// Server base URL; `https://` is assumed when no scheme is given
    pub base_url: String,
    pub username: String,
    pub password: String,

    /// Remote collection mirrored by the library
    pub root_path: String,

    pub conflict_strategy: ConflictStrategy,
    pub local_delete_strategy: LocalDeleteStrategy,
    pub confirm_delete_remote: bool,

    /// Smart-skip window; 0 disables the post-scan short-circuit
    pub skip_remote_scan_minutes: u64,

    /// Declared path filters. Validated, not applied: the scanners use the
    /// fixed extension allowlist.
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,

    /// Local library root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_root: Option<PathBuf>,

    /// Where metadata and the sync log live
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            on_startup: true,
            on_shutdown: true,
            timeout_ms: 120_000,
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            root_path: default_root_path(),
            conflict_strategy: ConflictStrategy::Newest,
            local_delete_strategy: LocalDeleteStrategy::Auto,
            confirm_delete_remote: true,
            skip_remote_scan_minutes: 5,
            include_globs: vec![
                "**/*.md".to_string(),
                "**/*.{png,jpg,jpeg,gif,svg,pdf}".to_string(),
            ],
            exclude_globs: vec![
                "**/.git/**".to_string(),
                "**/.trash/**".to_string(),
                "**/.DS_Store".to_string(),
                "**/Thumbs.db".to_string(),
            ],
            library_root: None,
            data_dir: None,
        }
    }
}

fn default_root_path() -> String {
    "/notes".to_string()
}

impl SyncConfig {
    /// Parse TOML and apply the load-time fixups
    pub fn from_toml(raw: &str) -> Result<Self, SyncError> {
        let config: SyncConfig = toml::from_str(raw)
            .map_err(|e| SyncError::Config(format!("Invalid configuration: {}", e)))?;
        Ok(config.normalized())
    }

    /// Load from `path`
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load_default() -> Result<Self, SyncError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    fn normalized(mut self) -> Self {
        self.timeout_ms = self.timeout_ms.max(MIN_TIMEOUT_MS);
        if self.root_path.trim().is_empty() {
            self.root_path = default_root_path();
        }
        if !self.root_path.starts_with('/') {
            self.root_path.insert(0, '/');
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.enabled && self.base_url.trim().is_empty() {
            return Err(SyncError::Config(
                "WebDAV base URL is required when sync is enabled".to_string(),
            ));
        }

        if self.timeout_ms < MIN_TIMEOUT_MS {
            return Err(SyncError::Config(format!(
                "timeoutMs must be at least {} ms",
                MIN_TIMEOUT_MS
            )));
        }

        if self.enabled && self.library_root.is_none() {
            return Err(SyncError::Config(
                "No library root configured".to_string(),
            ));
        }

        for pattern in self.include_globs.iter().chain(&self.exclude_globs) {
            Glob::new(pattern).map_err(|e| {
                SyncError::Config(format!("Invalid glob pattern '{}': {}", pattern, e))
            })?;
        }

        Ok(())
    }

    /// Compile the declared globs (checked by `validate`, unused by the scanners)
    pub fn compiled_globs(&self) -> Result<(globset::GlobSet, globset::GlobSet), SyncError> {
        let build = |patterns: &[String]| {
            let mut builder = GlobSetBuilder::new();
            for pattern in patterns {
                builder.add(Glob::new(pattern).map_err(|e| {
                    SyncError::Config(format!("Invalid glob pattern '{}': {}", pattern, e))
                })?);
            }
            builder
                .build()
                .map_err(|e| SyncError::Config(format!("Invalid glob set: {}", e)))
        };
        Ok((
            build(self.include_globs.as_slice())?,
            build(self.exclude_globs.as_slice())?,
        ))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Deadline budget for the run at shutdown
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.min(SHUTDOWN_TIMEOUT_CAP_MS))
    }

    /// Smart-skip window
    pub fn skip_window(&self) -> Duration {
        Duration::from_secs(self.skip_remote_scan_minutes * 60)
    }

    /// Data directory, defaulting to the platform's local data dir
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

/// `<local data dir>/notesync`, or `./.notesync` when the platform has none
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("notesync"))
        .unwrap_or_else(|| PathBuf::from(".notesync"))
}

/// `<config dir>/notesync/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("notesync").join(CONFIG_FILE_NAME))
}

impl SyncConfig {
    /// Load the configuration file and apply command-line overrides without
    /// validating, for commands that only inspect local state
    pub fn resolve(cli: &Cli) -> Result<Self, SyncError> {
        let mut config = match &cli.config {
            Some(path) => SyncConfig::load(path)?,
            None => SyncConfig::load_default()?,
        };

        if let Some(library) = &cli.library {
            config.library_root = Some(library.clone());
        }
        if let Some(data_dir) = &cli.data_dir {
            config.data_dir = Some(data_dir.clone());
        }
        Ok(config)
    }
}

impl TryFrom<&Cli> for SyncConfig {
    type Error = SyncError;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        let config = SyncConfig::resolve(cli)?;
        config.validate()?;
        Ok(config)
    }
}

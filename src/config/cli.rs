//! Command-line interface

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "notesync")]
#[command(version)]
#[command(about = "Keep a local notes library in sync with a WebDAV folder")]
#[command(long_about = r#"
notesync mirrors a local notes library to a WebDAV collection.

Changes are detected by content hash, renames become a single remote MOVE,
and deletions are only applied when the content is verified unchanged.

Examples:
  notesync sync                        Sync now
  notesync sync --dry-run              Show the plan only
  notesync --library ~/Notes status    Show sync state
  notesync show-log-path               Print the sync log location
"#)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Local library root (overrides the config file)
    #[arg(long, global = true)]
    pub library: Option<PathBuf>,

    /// Directory for metadata and the sync log
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one sync
    Sync(SyncArgs),

    /// Show configuration and last sync state
    Status,

    /// Print where the sync log is written
    ShowLogPath,
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// What triggered the run (startup/shutdown runs may be skipped)
    #[arg(long, value_enum, default_value_t = TriggerArg::Manual)]
    pub trigger: TriggerArg,

    /// Compute and print the plan without executing it
    #[arg(long)]
    pub dry_run: bool,

    /// Never prompt; undecided conflicts and deletions take the safe default
    #[arg(long)]
    pub non_interactive: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerArg {
    Manual,
    Startup,
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_defaults() {
        let cli = Cli::try_parse_from(["notesync", "sync"]).expect("parse");
        match cli.command {
            Command::Sync(args) => {
                assert_eq!(args.trigger, TriggerArg::Manual);
                assert!(!args.dry_run);
                assert!(!args.non_interactive);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(!cli.verbose);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "notesync",
            "sync",
            "--trigger",
            "shutdown",
            "--library",
            "/tmp/lib",
            "-v",
        ])
        .expect("parse");

        assert!(cli.verbose);
        assert_eq!(cli.library, Some(PathBuf::from("/tmp/lib")));
        assert!(matches!(
            cli.command,
            Command::Sync(SyncArgs {
                trigger: TriggerArg::Shutdown,
                ..
            })
        ));
    }

    #[test]
    fn test_show_log_path_subcommand() {
        let cli = Cli::try_parse_from(["notesync", "show-log-path"]).expect("parse");
        assert!(matches!(cli.command, Command::ShowLogPath));
    }
}

use anyhow::Context;
use clap::Parser;
use notesync::commands;
use notesync::config::{Cli, Command, SyncConfig};
use notesync::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Command::ShowLogPath => {
            let config = SyncConfig::resolve(&cli)?;
            println!("{}", logging::log_path(&config.resolved_data_dir()).display());
        }
        Command::Status => {
            let config = SyncConfig::resolve(&cli)?;
            commands::status::run(&config);
        }
        Command::Sync(args) => {
            // Validates immediately
            let config = SyncConfig::try_from(&cli)?;
            let (_log_guard, log_file) = logging::init(&config.resolved_data_dir(), cli.verbose)
                .context("failed to open the sync log")?;

            let report = match commands::sync::run(config, args).await {
                Ok(report) => report,
                Err(e) => {
                    if let Some(hint) = commands::sync::suggestion_for(&e) {
                        eprintln!("Try: {}", hint);
                    }
                    return Err(e.into());
                }
            };

            if report.failed > 0 {
                anyhow::bail!(
                    "{} action(s) failed; details in {}",
                    report.failed,
                    log_file.display()
                );
            }
        }
    }

    Ok(())
}

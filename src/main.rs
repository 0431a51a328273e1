//! Blendyard CLI entry point.

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;

use blendyard::cli::commands::{convert, init, watch};
use blendyard::cli::{Cli, Commands};
use blendyard::config::Settings;
use blendyard::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Init writes the settings file, so it must not depend on loading one
    if let Commands::Init { force } = cli.command {
        return init::run_init(force);
    }

    let settings = load_settings(&cli)?;
    logging::init_with_config(&settings.logging, cli.verbose || settings.watchdog.verbose);
    let settings = Arc::new(settings);

    match cli.command {
        Commands::Watch {
            folder,
            destination,
        } => {
            let stats = watch::run(
                watch::WatchArgs {
                    folder,
                    destination,
                },
                settings,
            )
            .await?;
            blendyard::log_event!(
                "watcher",
                "session finished",
                "{} events, {} exports succeeded, {} failed",
                stats.events,
                stats.succeeded,
                stats.failed
            );
        }
        Commands::Convert { file, destination } => {
            let report =
                convert::run(convert::ConvertArgs { file, destination }, settings).await?;
            println!(
                "Exported {} in {:.1}s",
                report.job.dest_path.display(),
                report.elapsed.as_secs_f64()
            );
        }
        Commands::Config { json } => init::run_config(&settings, json)?,
        // Handled above
        Commands::Init { .. } => {}
    }

    Ok(())
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    match &cli.config {
        Some(path) => {
            if !path.is_file() {
                bail!("Configuration file not found: {}", path.display());
            }
            Settings::load_from(path)
                .map_err(|e| anyhow::anyhow!("{e}"))
                .with_context(|| format!("Cannot load {}", path.display()))
        }
        None => Settings::load()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("Cannot load configuration"),
    }
}

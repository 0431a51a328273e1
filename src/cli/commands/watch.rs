//! Watch command - continuous export of changed source files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use console::style;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::export::ProcessConverter;
use crate::watcher::{SessionStats, WatchSession};

/// Arguments for the watch command.
pub struct WatchArgs {
    pub folder: Option<PathBuf>,
    pub destination: Option<PathBuf>,
}

/// Run the watch command until Ctrl+C.
pub async fn run(args: WatchArgs, settings: Arc<Settings>) -> anyhow::Result<SessionStats> {
    let WatchArgs {
        folder,
        destination,
    } = args;

    let watched = folder.unwrap_or_else(|| settings.watchdog.watched_folder.clone());
    let target = destination.unwrap_or_else(|| settings.models.target_folder.clone());
    let target = std::path::absolute(&target)
        .with_context(|| format!("Invalid target folder {}", target.display()))?;

    let converter = ProcessConverter::from_settings(&settings);
    warn_if_converter_missing(&converter.command().executable);

    let session = WatchSession::start(&settings, &watched, &target, Arc::new(converter))
        .with_context(|| format!("Cannot watch {}", watched.display()))?;

    print_header(&settings, session.root(), &target);

    let shutdown = CancellationToken::new();
    spawn_interrupt_listener(shutdown.clone());

    Ok(session.run(shutdown).await)
}

/// First Ctrl+C stops watching and waits for running exports, a second one
/// exits immediately.
fn spawn_interrupt_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("[watcher] cannot listen for Ctrl+C");
            return;
        }
        eprintln!("Received shutdown signal");
        shutdown.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Exiting without waiting for running exports");
            std::process::exit(130);
        }
    });
}

fn warn_if_converter_missing(executable: &Path) {
    // Bare names are resolved through PATH by the OS at spawn time
    if executable.components().count() > 1 && !executable.exists() {
        tracing::warn!(
            "[converter] {} does not exist, every export will fail",
            executable.display()
        );
    }
}

fn print_header(settings: &Settings, source: &Path, target: &Path) {
    let wave = "      .-.     .-.     .-.     .-.     .-.     .-.     .-.     .-.     .\n\
                '`._.'   `._.'   `._.'   `._.'   `._.'   `._.'   `._.'   `._.'   `._.'";

    println!();
    println!("{wave}");
    println!();
    println!(
        "{}",
        style(format!(
            "  {} Exporter Watchdog",
            settings.models.target_extension.to_uppercase()
        ))
        .cyan()
        .bold()
    );
    println!();
    println!(
        "  Changes to .{} files will be converted into .{}",
        settings.models.source_extension, settings.models.target_extension
    );
    println!();
    println!("  {}", style("Source Folder:").bold());
    println!("  {}", source.display());
    println!();
    println!("  {}", style("Target Folder:").bold());
    println!("  {}", target.display());
    println!();
    println!("  To shutdown the watchdog press Ctrl+C");
    println!();
    println!("{wave}");
    println!();
}

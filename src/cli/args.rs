//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and Commands enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Blender to FBX export watchdog
#[derive(Parser, Debug)]
#[command(
    name = "blendyard",
    version = env!("CARGO_PKG_VERSION"),
    about = "Re-export .blend files to FBX whenever they are saved",
    long_about = "Recursively watch a folder of .blend files and convert each changed file \
                  to FBX, mirroring the folder layout under the target folder.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to a settings file (.toml, or the legacy settings.json)
    #[arg(short, long, global = true, env = "BLENDYARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Display additional information
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a folder and export changed files
    #[command(
        about = "Watch a folder recursively and export .blend files on save",
        after_help = "Examples:\n  blendyard watch\n  blendyard watch D:/MyProject/art\n  blendyard watch art --destination build/models --verbose\n\nPress Ctrl+C to stop. A second Ctrl+C exits without waiting for running exports."
    )]
    Watch {
        /// Folder to watch (defaults to watchdog.watched_folder)
        #[arg(value_name = "FOLDER")]
        folder: Option<PathBuf>,

        /// Destination root for exported files (defaults to models.target_folder)
        #[arg(short, long)]
        destination: Option<PathBuf>,
    },

    /// Convert a single file once
    #[command(
        about = "Convert one .blend file to FBX",
        after_help = "Examples:\n  blendyard convert --file art/props/barrel.blend\n  blendyard convert --file art/props/barrel.blend --destination build/models"
    )]
    Convert {
        /// Path to the .blend file to convert
        #[arg(short, long)]
        file: PathBuf,

        /// Destination root for the exported file (defaults to models.target_folder)
        #[arg(short, long)]
        destination: Option<PathBuf>,
    },

    /// Initialize project
    #[command(about = "Set up .blendyard directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display the effective settings")]
    Config {
        /// Print as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

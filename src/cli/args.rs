//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum.

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

/// Label ingestion watcher
#[derive(Parser)]
#[command(
    name = "labelwatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Watch a folder for label photos and run extraction on each",
    long_about = "Watch a drop folder for label photographs, wait for uploads to settle, \
                  run the extraction program once per label and file the result into \
                  the processed or retry folder.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log pipeline transitions (info level) unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize configuration
    #[command(about = "Set up .labelwatch directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,

    /// Watch the drop folder until interrupted
    #[command(
        about = "Watch the drop folder and process new labels",
        after_help = "Examples:\n  labelwatch watch\n  labelwatch watch --root /srv/labels -v\n  LW_RETRY__MAX_RETRIES=5 labelwatch watch"
    )]
    Watch {
        /// Folder to watch (overrides watch.root)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Skip queuing files already present at startup
        #[arg(long)]
        no_scan: bool,
    },

    /// Count labels per folder
    #[command(about = "Show pending, processed, retry and stuck labels")]
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move retry-folder labels back into the drop folder
    #[command(about = "Re-feed labels from the retry folder")]
    Requeue {
        /// Also requeue labels that exhausted their retries
        #[arg(long)]
        include_stuck: bool,

        /// Show what would move without moving anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove leftover lock markers
    #[command(about = "Sweep stale lock markers from the drop folder")]
    Unlock {
        /// Remove every marker regardless of age
        #[arg(long)]
        all: bool,
    },
}

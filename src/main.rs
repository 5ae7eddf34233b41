//! Desktop entry point for the Universal Media Downloader.

// Release builds on Windows run without a console window.
#![cfg_attr(all(target_os = "windows", not(debug_assertions)), windows_subsystem = "windows")]

use clap::Parser;
use universal_media_downloader::{config::AppConfig, gui, logging};

/// Universal audio/video downloader
#[derive(Debug, Parser)]
#[command(name = "universal-media-downloader", version, about)]
struct Args {
    #[command(flatten)]
    config: AppConfig,
}

/// Program entry point: parses options, sets up logging and launches the GUI
fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init("warn");
    tracing::info!("starting GUI");
    gui::run(args.config)
}

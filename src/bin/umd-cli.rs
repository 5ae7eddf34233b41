//! Terminal entry point for the Universal Media Downloader.

use anyhow::Context;
use clap::Parser;
use tokio::runtime::Runtime;
use universal_media_downloader::{cli, logging};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    logging::init(args.log_level());

    let rt = Runtime::new().context("failed to start the async runtime")?;
    cli::run(args, &rt)
}

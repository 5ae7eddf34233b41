//! Universal media downloader: yt-dlp driven downloads with bundled ffmpeg,
//! shared by the desktop GUI and the `umd-cli` terminal front-end.

// Bundled tools and packaging metadata
pub mod bundle;
// Interactive terminal front-end
pub mod cli;
// Folders, overrides, cache location
pub mod config;
// External downloader spawning logic (yt-dlp)
pub mod downloader;
pub mod error;
// Desktop front-end
pub mod gui;
pub mod logging;
// yt-dlp JSON model
pub mod model;
pub mod plan;
// Progress parsing utilities
pub mod progress;
pub mod sanitize;
pub mod selection;
pub mod service;
// Thumbnail fetching module
pub mod thumbnail;
pub mod units;

pub use error::{Error, Result};

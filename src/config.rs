//! Runtime configuration: tool overrides, output folders and the tool cache.

use crate::error::{Error, Result};
use clap::Args;
use std::path::{Path, PathBuf};

/// Name of the folder created on the desktop.
pub const APP_FOLDER_NAME: &str = "Universal Audio Video Downloader";

/// Options shared by the GUI and the terminal front-end.
#[derive(Debug, Clone, Default, Args)]
pub struct AppConfig {
    /// Root folder for downloads (Audio/ and Video/ are created inside)
    #[arg(long, env = "UMD_OUTPUT_DIR", global = true)]
    pub output_root: Option<PathBuf>,

    /// Use this yt-dlp binary instead of the bundled one
    #[arg(long = "yt-dlp", env = "UMD_YT_DLP", global = true)]
    pub yt_dlp: Option<PathBuf>,

    /// Use this ffmpeg binary instead of the bundled one
    #[arg(long, env = "UMD_FFMPEG", global = true)]
    pub ffmpeg: Option<PathBuf>,

    /// Use this ffprobe binary instead of the bundled one
    #[arg(long, env = "UMD_FFPROBE", global = true)]
    pub ffprobe: Option<PathBuf>,
}

/// Where finished files land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFolders {
    /// Folder shown to the user
    pub root: PathBuf,
    /// Extracted audio (MP3)
    pub audio: PathBuf,
    /// Video files
    pub video: PathBuf,
}

impl DownloadFolders {
    /// Lay out `root/Audio` and `root/Video` without touching the disk.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            audio: root.join("Audio"),
            video: root.join("Video"),
            root,
        }
    }

    /// Create the download folders.
    ///
    /// Uses `root` when given, else `<Desktop>/Universal Audio Video Downloader`.
    /// Falls back to `./Audio` and `./Video` when the preferred location is
    /// not writable.
    pub fn prepare(root: Option<&Path>) -> Result<Self> {
        let preferred = root.map(Path::to_path_buf).or_else(default_root);
        Self::prepare_in(preferred.as_deref(), &std::env::current_dir()?)
    }

    /// Create the folders under `preferred`, or under `fallback` if that fails.
    pub fn prepare_in(preferred: Option<&Path>, fallback: &Path) -> Result<Self> {
        if let Some(preferred) = preferred {
            let folders = Self::under(preferred);
            match folders.create() {
                Ok(()) => return Ok(folders),
                Err(err) => tracing::warn!(
                    root = %folders.root.display(),
                    error = %err,
                    "cannot create download folders, using current directory"
                ),
            }
        }

        let folders = Self::under(fallback);
        folders.create().map_err(|source| Error::Folders {
            root: folders.root.clone(),
            source,
        })?;
        Ok(folders)
    }

    fn create(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.audio)?;
        std::fs::create_dir_all(&self.video)
    }
}

fn default_root() -> Option<PathBuf> {
    dirs::desktop_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Desktop")))
        .map(|desktop| desktop.join(APP_FOLDER_NAME))
}

/// Directory that embedded tools are extracted into.
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("universal-media-downloader")
        .join("bin")
}

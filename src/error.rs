//! Error type shared by the library, the GUI and the terminal front-end.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between a pasted URL and a file on disk.
#[derive(Debug, Error)]
pub enum Error {
    /// A required external tool could not be found anywhere.
    #[error("{tool} was not found (checked bundled assets, the program directory and PATH)")]
    ToolMissing { tool: &'static str },

    /// An explicitly configured tool path does not exist.
    #[error("configured path for {tool} does not exist: {}", path.display())]
    ToolOverrideMissing { tool: &'static str, path: PathBuf },

    /// yt-dlp refused the URL or the site returned nothing usable.
    #[error("{0}")]
    Extraction(String),

    /// The site serves DRM protected media.
    #[error("This content is DRM protected.")]
    DrmProtected,

    /// The media has no downloadable formats.
    #[error("No downloadable formats found.")]
    NoFormats,

    /// yt-dlp exited with an error while downloading.
    #[error("{0}")]
    DownloadFailed(String),

    /// The download folders could not be created.
    #[error("could not create download folders under {}: {source}", root.display())]
    Folders {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// yt-dlp printed JSON we could not understand.
    #[error("unexpected yt-dlp output: {0}")]
    Json(#[from] serde_json::Error),

    /// Spawning or talking to a child process failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short message suitable for a status line.
    pub fn user_message(&self) -> String {
        match self {
            Error::DrmProtected => "Error: This content is DRM protected.".to_string(),
            other => format!("Error: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drm_has_dedicated_message() {
        assert_eq!(
            Error::DrmProtected.user_message(),
            "Error: This content is DRM protected."
        );
    }

    #[test]
    fn extraction_message_is_passed_through() {
        let err = Error::Extraction("Unsupported URL: https://example.com".into());
        assert_eq!(err.user_message(), "Error: Unsupported URL: https://example.com");
    }
}

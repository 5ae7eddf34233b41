//! Front-end agnostic flow: analyze a URL, then download a planned request.

use crate::config::DownloadFolders;
use crate::downloader::{DownloadReport, ProbeMode, YtDlp};
use crate::error::Result;
use crate::model::MediaInfo;
use crate::plan::{plan_download, DownloadRequest, Scope, Selection};
use crate::progress::DownloadEvent;
use crate::sanitize::sanitize_url;
use tokio::sync::mpsc::UnboundedSender;

/// What a URL turned out to be.
#[derive(Debug, Clone)]
pub enum Analysis {
    Playlist {
        /// Sanitized URL
        url: String,
        title: Option<String>,
        count: u64,
    },
    Single {
        url: String,
        info: Box<MediaInfo>,
    },
}

impl Analysis {
    pub fn url(&self) -> &str {
        match self {
            Analysis::Playlist { url, .. } | Analysis::Single { url, .. } => url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaService {
    ytdlp: YtDlp,
    folders: DownloadFolders,
}

impl MediaService {
    pub fn new(ytdlp: YtDlp, folders: DownloadFolders) -> Self {
        Self { ytdlp, folders }
    }

    pub fn folders(&self) -> &DownloadFolders {
        &self.folders
    }

    pub fn set_folders(&mut self, folders: DownloadFolders) {
        self.folders = folders;
    }

    /// Sanitize `raw_url` and find out whether it is a playlist.
    ///
    /// Single videos are probed a second time for their full format list.
    pub async fn analyze(&self, raw_url: &str) -> Result<Analysis> {
        let url = sanitize_url(raw_url);
        let flat = self.ytdlp.probe(&url, ProbeMode::Flat).await?;

        if flat.is_playlist() {
            let count = flat.playlist_count.unwrap_or(0);
            tracing::info!(%url, count, "playlist found");
            return Ok(Analysis::Playlist {
                url,
                title: flat.title,
                count,
            });
        }

        let info = self.fetch_single(&url).await?;
        Ok(Analysis::Single {
            url,
            info: Box::new(info),
        })
    }

    /// Full metadata of the single video behind `url`, ignoring any playlist.
    pub async fn fetch_single(&self, url: &str) -> Result<MediaInfo> {
        self.ytdlp.probe(url, ProbeMode::Single).await
    }

    pub fn plan(&self, url: &str, selection: &Selection, scope: Scope) -> DownloadRequest {
        plan_download(url, selection, scope, &self.folders)
    }

    pub async fn download(
        &self,
        request: &DownloadRequest,
        events: UnboundedSender<DownloadEvent>,
    ) -> Result<DownloadReport> {
        self.ytdlp.download(request, events).await
    }
}

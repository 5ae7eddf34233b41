//! Turning a menu selection into a concrete yt-dlp invocation.

use crate::config::DownloadFolders;
use crate::model::MediaKind;
use crate::selection::{Choice, PostProcess, QualityPreset, DEFAULT_MP3_KBPS};
use std::path::{Path, PathBuf};

/// Output name for single downloads.
pub const SINGLE_TEMPLATE: &str = "%(title)s - [%(id)s].%(ext)s";
/// Output name for playlist items, grouped in a folder per playlist.
pub const PLAYLIST_TEMPLATE: &str = "%(playlist)s/%(playlist_index)s - %(title)s - [%(id)s].%(ext)s";

/// Whether yt-dlp should follow the playlist in a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Single,
    Playlist,
}

/// What the user picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Preset(QualityPreset),
    Choice(Choice),
}

impl Selection {
    pub fn kind(&self) -> MediaKind {
        match self {
            Selection::Preset(preset) => preset.kind(),
            Selection::Choice(choice) => choice.kind,
        }
    }

    fn format(&self) -> String {
        match self {
            Selection::Preset(preset) => preset.format_selector(),
            Selection::Choice(choice) => choice.format_id.clone(),
        }
    }

    fn postprocess(&self) -> PostProcess {
        match self {
            Selection::Preset(preset) => preset.postprocess(),
            Selection::Choice(choice) => choice.postprocess(),
        }
    }
}

/// Everything needed to run one yt-dlp download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    /// `-f` expression
    pub format: String,
    /// Absolute `-o` template
    pub output_template: PathBuf,
    pub postprocess: PostProcess,
    pub scope: Scope,
    /// Keep going past broken playlist items
    pub ignore_errors: bool,
}

/// Build the request for `selection`, routing audio and video to their folders.
pub fn plan_download(
    url: &str,
    selection: &Selection,
    scope: Scope,
    folders: &DownloadFolders,
) -> DownloadRequest {
    let folder = match selection.kind() {
        MediaKind::Audio => &folders.audio,
        MediaKind::Video => &folders.video,
    };
    let template = match scope {
        Scope::Single => SINGLE_TEMPLATE,
        Scope::Playlist => PLAYLIST_TEMPLATE,
    };

    DownloadRequest {
        url: url.to_string(),
        format: selection.format(),
        output_template: folder.join(template),
        postprocess: selection.postprocess(),
        scope,
        ignore_errors: scope == Scope::Playlist,
    }
}

/// The plain two-option mode: best mp4 video or MP3 audio, named after the title.
pub fn quick_request(url: &str, kind: MediaKind, dir: &Path) -> DownloadRequest {
    let (format, postprocess) = match kind {
        MediaKind::Video => (
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string(),
            PostProcess::None,
        ),
        MediaKind::Audio => (
            "bestaudio/best".to_string(),
            PostProcess::ExtractAudio {
                bitrate_kbps: DEFAULT_MP3_KBPS,
            },
        ),
    };

    DownloadRequest {
        url: url.to_string(),
        format,
        output_template: dir.join("%(title)s.%(ext)s"),
        postprocess,
        scope: Scope::Single,
        ignore_errors: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folders() -> DownloadFolders {
        DownloadFolders::under("/downloads")
    }

    #[test]
    fn audio_preset_goes_to_audio_folder() {
        let request = plan_download(
            "https://example.com/v",
            &Selection::Preset(QualityPreset::StandardAudio),
            Scope::Single,
            &folders(),
        );
        assert_eq!(
            request.output_template,
            Path::new("/downloads/Audio").join(SINGLE_TEMPLATE)
        );
        assert_eq!(request.format, "bestaudio[abr<=128]");
        assert_eq!(
            request.postprocess,
            PostProcess::ExtractAudio { bitrate_kbps: 128 }
        );
        assert!(!request.ignore_errors);
    }

    #[test]
    fn playlists_get_their_own_folder_and_ignore_errors() {
        let request = plan_download(
            "https://example.com/list",
            &Selection::Preset(QualityPreset::BestVideo),
            Scope::Playlist,
            &folders(),
        );
        assert_eq!(
            request.output_template,
            Path::new("/downloads/Video").join(PLAYLIST_TEMPLATE)
        );
        assert!(request.ignore_errors);
        assert_eq!(request.postprocess, PostProcess::RemuxMp4);
    }

    #[test]
    fn merged_choice_is_remuxed() {
        let choice = Choice {
            label: "Best Quality Video (1920x1080)".into(),
            format_id: "137+140".into(),
            filesize: Some(1),
            kind: MediaKind::Video,
        };
        let request = plan_download("u", &Selection::Choice(choice), Scope::Single, &folders());
        assert_eq!(request.format, "137+140");
        assert_eq!(request.postprocess, PostProcess::RemuxMp4);
        assert!(request.output_template.starts_with("/downloads/Video"));
    }

    #[test]
    fn quick_audio_converts_to_mp3() {
        let request = quick_request("u", MediaKind::Audio, Path::new("."));
        assert_eq!(request.format, "bestaudio/best");
        assert_eq!(
            request.postprocess,
            PostProcess::ExtractAudio { bitrate_kbps: 192 }
        );
        assert_eq!(request.scope, Scope::Single);
    }
}

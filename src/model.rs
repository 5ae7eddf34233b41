//! Data model for the JSON that `yt-dlp -J` prints.
//!
//! Only the fields the downloader reads are declared; everything else is
//! ignored. Numeric fields are parsed leniently because extractors disagree
//! on whether sizes and heights are integers or floats.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Whether a download produces a video file or an MP3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Video file (mp4 where possible)
    Video,
    /// Audio extracted to MP3
    Audio,
}

/// Top level `-J` document for a single video or a playlist.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    /// Site specific identifier
    #[serde(default)]
    pub id: String,
    /// Human-readable title
    #[serde(default)]
    pub title: Option<String>,
    /// Channel or uploader name
    #[serde(default)]
    pub uploader: Option<String>,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    /// Thumbnail URL
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// All formats offered for this video
    #[serde(default)]
    pub formats: Vec<MediaFormat>,
    /// Playlist entries (flat when probed with `--flat-playlist`)
    #[serde(default)]
    pub entries: Option<Vec<Value>>,
    /// Number of playlist entries reported by the site
    #[serde(default, deserialize_with = "lenient_u64")]
    pub playlist_count: Option<u64>,
}

impl MediaInfo {
    /// Playlists have entries and a non-zero entry count.
    pub fn is_playlist(&self) -> bool {
        self.entries.is_some() && self.playlist_count.unwrap_or(0) > 0
    }

    /// Title, or a placeholder when the site did not report one.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }
}

/// One entry of the `formats` array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaFormat {
    pub format_id: String,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub height: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub width: Option<u64>,
    #[serde(default)]
    pub resolution: Option<String>,
    /// Total bitrate in kbps
    #[serde(default)]
    pub tbr: Option<f64>,
    /// Audio bitrate in kbps
    #[serde(default)]
    pub abr: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize_approx: Option<u64>,
}

impl MediaFormat {
    /// Exact size when known, otherwise the estimate. Zero counts as unknown.
    pub fn size(&self) -> Option<u64> {
        self.filesize
            .filter(|&s| s > 0)
            .or(self.filesize_approx.filter(|&s| s > 0))
    }

    fn has_video(&self) -> bool {
        self.vcodec.as_deref() != Some("none")
    }

    fn has_audio(&self) -> bool {
        self.acodec.as_deref() != Some("none")
    }

    /// Audio stream without video.
    pub fn is_audio_only(&self) -> bool {
        !self.has_video() && self.has_audio()
    }

    /// Video stream without audio.
    pub fn is_video_only(&self) -> bool {
        self.has_video() && !self.has_audio()
    }

    /// Single file carrying both audio and video.
    pub fn is_muxed(&self) -> bool {
        self.has_video() && self.has_audio()
    }

    pub fn is_mp4(&self) -> bool {
        self.ext.as_deref() == Some("mp4")
    }

    /// `resolution` as reported, or `WxH` / `Hp` built from the dimensions.
    pub fn resolution_label(&self) -> String {
        if let Some(resolution) = &self.resolution {
            return resolution.clone();
        }
        match (self.width, self.height) {
            (Some(w), Some(h)) => format!("{w}x{h}"),
            (None, Some(h)) => format!("{h}p"),
            _ => "unknown".to_string(),
        }
    }
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_video() {
        let json = r#"{
            "id": "abc",
            "title": "A video",
            "thumbnail": "https://i.ytimg.com/vi/abc/hq.jpg",
            "formats": [
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2",
                 "abr": 129.5, "filesize": 3000000},
                {"format_id": "137", "ext": "mp4", "vcodec": "avc1", "acodec": "none",
                 "height": 1080, "width": 1920, "tbr": 4400.1, "filesize_approx": 90000000.0},
                {"format_id": "18", "ext": "mp4", "vcodec": "avc1", "acodec": "mp4a",
                 "height": null, "filesize": null}
            ]
        }"#;
        let info: MediaInfo = serde_json::from_str(json).unwrap();

        assert!(!info.is_playlist());
        assert_eq!(info.display_title(), "A video");
        assert_eq!(info.formats.len(), 3);
        assert!(info.formats[0].is_audio_only());
        assert!(info.formats[1].is_video_only());
        assert_eq!(info.formats[1].size(), Some(90_000_000));
        assert_eq!(info.formats[1].resolution_label(), "1920x1080");
        assert!(info.formats[2].is_muxed());
        assert_eq!(info.formats[2].height, None);
    }

    #[test]
    fn flat_playlist_is_detected() {
        let json = r#"{"id": "PL1", "title": "Mix", "playlist_count": 2,
                       "entries": [{"id": "a"}, {"id": "b"}]}"#;
        let info: MediaInfo = serde_json::from_str(json).unwrap();
        assert!(info.is_playlist());
    }

    #[test]
    fn empty_playlist_is_not_a_playlist() {
        let json = r#"{"id": "PL1", "playlist_count": 0, "entries": []}"#;
        let info: MediaInfo = serde_json::from_str(json).unwrap();
        assert!(!info.is_playlist());
    }

    #[test]
    fn missing_codecs_count_as_present() {
        let format = MediaFormat {
            format_id: "0".into(),
            ..Default::default()
        };
        assert!(format.is_muxed());
        assert!(!format.is_audio_only());
    }

    #[test]
    fn zero_filesize_falls_back_to_estimate() {
        let format = MediaFormat {
            format_id: "1".into(),
            filesize: Some(0),
            filesize_approx: Some(42),
            ..Default::default()
        };
        assert_eq!(format.size(), Some(42));
    }
}

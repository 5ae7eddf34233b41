//! Picking what to download: the six fixed quality presets and the
//! "smart" per-video menu built from the formats a site actually offers.

use crate::error::{Error, Result};
use crate::model::{MediaFormat, MediaKind};

/// MP3 bitrate used when a menu entry does not specify one.
pub const DEFAULT_MP3_KBPS: u32 = 192;

/// Fixed quality levels offered for playlists and in the GUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityPreset {
    BestVideo,
    StandardVideo,
    LowVideo,
    BestAudio,
    StandardAudio,
    LowAudio,
}

impl QualityPreset {
    /// All presets in menu order.
    pub const ALL: [QualityPreset; 6] = [
        QualityPreset::BestVideo,
        QualityPreset::StandardVideo,
        QualityPreset::LowVideo,
        QualityPreset::BestAudio,
        QualityPreset::StandardAudio,
        QualityPreset::LowAudio,
    ];

    pub fn label(self) -> &'static str {
        match self {
            QualityPreset::BestVideo => "Best Video (1080p)",
            QualityPreset::StandardVideo => "Standard Video (720p)",
            QualityPreset::LowVideo => "Low Video (480p)",
            QualityPreset::BestAudio => "Best Audio (MP3)",
            QualityPreset::StandardAudio => "Standard Audio (MP3)",
            QualityPreset::LowAudio => "Low Audio (MP3)",
        }
    }

    /// yt-dlp `-f` expression.
    pub fn format_selector(self) -> String {
        match self {
            QualityPreset::BestVideo | QualityPreset::StandardVideo | QualityPreset::LowVideo => {
                let height = self.max_height().unwrap_or(1080);
                format!(
                    "bestvideo[height<={height}][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best"
                )
            }
            QualityPreset::BestAudio => "bestaudio/best".to_string(),
            QualityPreset::StandardAudio => "bestaudio[abr<=128]".to_string(),
            QualityPreset::LowAudio => "worstaudio/bestaudio[abr<=64]".to_string(),
        }
    }

    pub fn kind(self) -> MediaKind {
        match self {
            QualityPreset::BestVideo | QualityPreset::StandardVideo | QualityPreset::LowVideo => {
                MediaKind::Video
            }
            _ => MediaKind::Audio,
        }
    }

    pub fn max_height(self) -> Option<u64> {
        match self {
            QualityPreset::BestVideo => Some(1080),
            QualityPreset::StandardVideo => Some(720),
            QualityPreset::LowVideo => Some(480),
            _ => None,
        }
    }

    /// Target MP3 bitrate for the audio presets.
    pub fn mp3_kbps(self) -> u32 {
        match self {
            QualityPreset::StandardAudio => 128,
            QualityPreset::LowAudio => 96,
            _ => DEFAULT_MP3_KBPS,
        }
    }

    pub fn postprocess(self) -> PostProcess {
        PostProcess::for_selection(self.kind(), &self.format_selector(), self.mp3_kbps())
    }
}

/// What ffmpeg does after yt-dlp fetched the streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcess {
    None,
    /// Convert to MP3 at the given bitrate
    ExtractAudio { bitrate_kbps: u32 },
    /// Merged streams are remuxed into an mp4 container
    RemuxMp4,
}

impl PostProcess {
    pub fn for_selection(kind: MediaKind, format: &str, bitrate_kbps: u32) -> Self {
        match kind {
            MediaKind::Audio => PostProcess::ExtractAudio { bitrate_kbps },
            MediaKind::Video if format.contains('+') => PostProcess::RemuxMp4,
            MediaKind::Video => PostProcess::None,
        }
    }
}

/// One entry of the per-video menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    /// Concrete format id(s), `video+audio` for merged downloads
    pub format_id: String,
    pub filesize: Option<u64>,
    pub kind: MediaKind,
}

impl Choice {
    pub fn postprocess(&self) -> PostProcess {
        PostProcess::for_selection(self.kind, &self.format_id, DEFAULT_MP3_KBPS)
    }
}

/// Build the single-video menu from the available formats, largest first.
pub fn smart_choices(formats: &[MediaFormat]) -> Result<Vec<Choice>> {
    if formats.is_empty() {
        return Err(Error::NoFormats);
    }

    let best_audio = best_merge_audio(formats);
    let video_streams: Vec<&MediaFormat> = formats
        .iter()
        .filter(|f| f.is_video_only() && f.is_mp4() && f.tbr.is_some())
        .collect();

    let mut choices = Vec::new();
    let merged_tiers = [(1080, "Best Quality Video"), (720, "Good Quality Video")];
    for (height, name) in merged_tiers {
        if let (Some(video), Some(audio)) = (best_video_at(&video_streams, height), best_audio) {
            let size = video.size().unwrap_or(0) + audio.size().unwrap_or(0);
            choices.push(Choice {
                label: format!("{name} ({})", video.resolution_label()),
                format_id: format!("{}+{}", video.format_id, audio.format_id),
                filesize: Some(size).filter(|&s| s > 0),
                kind: MediaKind::Video,
            });
        }
    }

    let best_muxed = first_max_by(formats.iter().filter(|f| f.is_muxed()), |f| {
        f.height.unwrap_or(0) as f64
    });
    if let Some(muxed) = best_muxed {
        choices.push(Choice {
            label: format!(
                "Standard Quality Video ({}, single file)",
                muxed.resolution_label()
            ),
            format_id: muxed.format_id.clone(),
            filesize: muxed.size(),
            kind: MediaKind::Video,
        });
    }

    let audio = audio_by_bitrate(formats);
    let mut picks = Vec::new();
    if let Some(best) = audio.first() {
        picks.push(*best);
        if audio.len() > 2 {
            picks.push(audio[audio.len() / 2]);
        }
        if audio.len() > 1 {
            picks.push(audio[audio.len() - 1]);
        }
    }
    let mut seen_labels = Vec::new();
    for stream in picks {
        let kbps = stream.abr.unwrap_or(0.0).round_ties_even();
        let label = format!("Audio (~{kbps}kbps, MP3)");
        if seen_labels.contains(&label) {
            continue;
        }
        seen_labels.push(label.clone());
        choices.push(Choice {
            label,
            format_id: stream.format_id.clone(),
            filesize: stream.size(),
            kind: MediaKind::Audio,
        });
    }

    let mut unique: Vec<Choice> = Vec::with_capacity(choices.len());
    for choice in choices {
        if !unique.contains(&choice) {
            unique.push(choice);
        }
    }
    unique.sort_by(|a, b| b.filesize.unwrap_or(0).cmp(&a.filesize.unwrap_or(0)));

    if unique.is_empty() {
        return Err(Error::NoFormats);
    }
    Ok(unique)
}

/// Approximate sizes for each of [`QualityPreset::ALL`], in the same order.
pub fn estimate_preset_sizes(formats: &[MediaFormat]) -> [Option<u64>; 6] {
    let best_audio_size = best_merge_audio(formats)
        .and_then(MediaFormat::size)
        .unwrap_or(0);
    let video_streams: Vec<&MediaFormat> = formats
        .iter()
        .filter(|f| f.is_video_only() && f.is_mp4() && f.tbr.is_some())
        .collect();
    let video_size = |height| {
        best_video_at(&video_streams, height)
            .map(|v| v.size().unwrap_or(0) + best_audio_size)
            .unwrap_or(0)
    };

    let audio = audio_by_bitrate(formats);
    let standard_audio = if audio.len() > 2 {
        audio[audio.len() / 2].size().unwrap_or(0)
    } else {
        best_audio_size
    };
    let low_audio = if audio.len() > 1 {
        audio[audio.len() - 1].size().unwrap_or(0)
    } else {
        best_audio_size
    };

    [
        video_size(1080),
        video_size(720),
        video_size(480),
        best_audio_size,
        standard_audio,
        low_audio,
    ]
    .map(|size| Some(size).filter(|&s| s > 0))
}

/// Audio-only stream with the highest bitrate, used for video merges.
fn best_merge_audio(formats: &[MediaFormat]) -> Option<&MediaFormat> {
    first_max_by(
        formats.iter().filter(|f| f.is_audio_only() && f.abr.is_some()),
        |f| f.abr.unwrap_or(0.0),
    )
}

/// Audio-only streams with a known bitrate, highest first.
fn audio_by_bitrate(formats: &[MediaFormat]) -> Vec<&MediaFormat> {
    let mut audio: Vec<&MediaFormat> = formats
        .iter()
        .filter(|f| f.is_audio_only() && f.abr.is_some())
        .collect();
    audio.sort_by(|a, b| b.abr.unwrap_or(0.0).total_cmp(&a.abr.unwrap_or(0.0)));
    audio
}

/// Highest-bitrate stream at exactly `height`, preferring streams with a size.
fn best_video_at<'a>(streams: &[&'a MediaFormat], height: u64) -> Option<&'a MediaFormat> {
    let at_height: Vec<&MediaFormat> = streams
        .iter()
        .copied()
        .filter(|s| s.height == Some(height))
        .collect();
    let sized: Vec<&MediaFormat> = at_height
        .iter()
        .copied()
        .filter(|s| s.size().is_some())
        .collect();
    let pool = if sized.is_empty() { at_height } else { sized };
    first_max_by(pool.into_iter(), |f| f.tbr.unwrap_or(0.0))
}

/// Like `Iterator::max_by_key` but the first of equal maxima wins.
fn first_max_by<'a, I, F>(items: I, key: F) -> Option<&'a MediaFormat>
where
    I: Iterator<Item = &'a MediaFormat>,
    F: Fn(&MediaFormat) -> f64,
{
    items.fold(None, |best: Option<&MediaFormat>, item| match best {
        Some(current) if key(item) <= key(current) => Some(current),
        _ => Some(item),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(id: &str, abr: f64, size: Option<u64>) -> MediaFormat {
        MediaFormat {
            format_id: id.into(),
            ext: Some("m4a".into()),
            vcodec: Some("none".into()),
            acodec: Some("mp4a".into()),
            abr: Some(abr),
            filesize: size,
            ..Default::default()
        }
    }

    fn video(id: &str, height: u64, tbr: f64, size: Option<u64>) -> MediaFormat {
        MediaFormat {
            format_id: id.into(),
            ext: Some("mp4".into()),
            vcodec: Some("avc1".into()),
            acodec: Some("none".into()),
            height: Some(height),
            width: Some(height * 16 / 9),
            tbr: Some(tbr),
            filesize: size,
            ..Default::default()
        }
    }

    fn muxed(id: &str, height: u64, size: Option<u64>) -> MediaFormat {
        MediaFormat {
            format_id: id.into(),
            ext: Some("mp4".into()),
            vcodec: Some("avc1".into()),
            acodec: Some("mp4a".into()),
            height: Some(height),
            resolution: Some(format!("{}x{height}", height * 16 / 9)),
            filesize: size,
            ..Default::default()
        }
    }

    fn sample() -> Vec<MediaFormat> {
        vec![
            audio("139", 48.0, Some(1_000)),
            audio("140", 129.0, Some(3_000)),
            audio("251", 160.0, Some(4_000)),
            video("137", 1080, 4000.0, Some(100_000)),
            video("399", 1080, 4500.0, None),
            video("136", 720, 2000.0, Some(50_000)),
            video("135", 480, 1000.0, Some(20_000)),
            muxed("18", 360, Some(10_000)),
        ]
    }

    #[test]
    fn smart_menu_is_sorted_by_size() {
        let choices = smart_choices(&sample()).unwrap();
        let ids: Vec<&str> = choices.iter().map(|c| c.format_id.as_str()).collect();
        assert_eq!(ids, vec!["137+251", "136+251", "18", "251", "140", "139"]);
        assert_eq!(choices[0].filesize, Some(104_000));
        assert_eq!(choices[0].label, "Best Quality Video (1920x1080)");
        assert_eq!(choices[1].label, "Good Quality Video (1280x720)");
        assert_eq!(choices[2].label, "Standard Quality Video (640x360, single file)");
        assert_eq!(choices[3].label, "Audio (~160kbps, MP3)");
        assert_eq!(choices[3].kind, MediaKind::Audio);
    }

    #[test]
    fn sized_streams_win_over_faster_unsized_ones() {
        let choices = smart_choices(&sample()).unwrap();
        assert!(choices.iter().all(|c| !c.format_id.starts_with("399")));
    }

    #[test]
    fn unsized_streams_are_used_when_nothing_else_exists() {
        let formats = vec![video("399", 1080, 4500.0, None), audio("140", 129.0, None)];
        let choices = smart_choices(&formats).unwrap();
        assert_eq!(choices[0].format_id, "399+140");
        assert_eq!(choices[0].filesize, None);
    }

    #[test]
    fn duplicate_audio_labels_are_skipped() {
        let formats = vec![audio("a", 128.0, Some(10)), audio("b", 128.2, Some(20))];
        let choices = smart_choices(&formats).unwrap();
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].format_id, "b");
    }

    #[test]
    fn empty_formats_are_an_error() {
        assert!(matches!(smart_choices(&[]), Err(Error::NoFormats)));
    }

    #[test]
    fn equal_heights_keep_first_muxed_stream() {
        let formats = vec![muxed("first", 360, Some(5)), muxed("second", 360, Some(9))];
        let choices = smart_choices(&formats).unwrap();
        assert_eq!(choices[0].format_id, "first");
    }

    #[test]
    fn preset_sizes_follow_menu_order() {
        let sizes = estimate_preset_sizes(&sample());
        assert_eq!(
            sizes,
            [
                Some(104_000),
                Some(54_000),
                Some(24_000),
                Some(4_000),
                Some(3_000),
                Some(1_000),
            ]
        );
    }

    #[test]
    fn preset_sizes_without_streams_are_unknown() {
        assert_eq!(estimate_preset_sizes(&[]), [None; 6]);

        let only_one_audio = vec![audio("140", 129.0, Some(3_000))];
        let sizes = estimate_preset_sizes(&only_one_audio);
        assert_eq!(sizes[0], None);
        assert_eq!(sizes[3..], [Some(3_000); 3]);
    }

    #[test]
    fn presets_map_to_selectors_and_postprocessing() {
        assert_eq!(
            QualityPreset::StandardVideo.format_selector(),
            "bestvideo[height<=720][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best"
        );
        assert_eq!(QualityPreset::StandardVideo.postprocess(), PostProcess::RemuxMp4);
        assert_eq!(
            QualityPreset::LowAudio.postprocess(),
            PostProcess::ExtractAudio { bitrate_kbps: 96 }
        );
        assert_eq!(QualityPreset::BestAudio.mp3_kbps(), 192);
    }

    #[test]
    fn single_file_choice_needs_no_remux() {
        let choice = Choice {
            label: "x".into(),
            format_id: "18".into(),
            filesize: None,
            kind: MediaKind::Video,
        };
        assert_eq!(choice.postprocess(), PostProcess::None);
    }
}

//! Parsing of yt-dlp's line oriented output into [`DownloadEvent`]s.

use once_cell::sync::Lazy;
use regex::Regex;

/// Marker that starts every progress line we ask yt-dlp to print.
pub const PROGRESS_MARKER: &str = "umd-progress";

/// Value for `--progress-template`; fields are `|` separated, `NA` when unknown.
pub const PROGRESS_TEMPLATE: &str = "download:umd-progress|%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress._percent_str)s|%(progress._total_bytes_str)s|%(progress._speed_str)s|%(progress._eta_str)s|%(info.playlist_index)s|%(info.n_entries)s";

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid ANSI pattern"));

/// Download state reported by yt-dlp's progress hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressStatus {
    Downloading,
    Finished,
    Error,
    Other(String),
}

/// One parsed progress line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub status: ProgressStatus,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<f64>,
    pub percent: String,
    pub total: String,
    pub speed: String,
    pub eta: String,
    /// 1-based position inside a playlist
    pub playlist_index: Option<u64>,
    pub playlist_count: Option<u64>,
}

impl ProgressUpdate {
    /// Completed share in `0.0..=1.0`, if a total is known.
    pub fn fraction(&self) -> Option<f32> {
        let total = self
            .total_bytes
            .map(|t| t as f64)
            .or(self.total_bytes_estimate)
            .filter(|t| *t > 0.0)?;
        let done = self.downloaded_bytes? as f64;
        Some((done / total).clamp(0.0, 1.0) as f32)
    }

    /// `Status: Downloading (File 2/9) | 42.0% of 10.00MiB at 1.00MiB/s (ETA: 00:06)`
    pub fn status_line(&self) -> String {
        let mut line = String::from("Status: Downloading");
        if let (Some(index), Some(count)) = (self.playlist_index, self.playlist_count) {
            line.push_str(&format!(" (File {index}/{count})"));
        }
        line.push_str(&format!(" | {} of {}", self.percent, self.total));
        if !self.speed.is_empty() {
            line.push_str(&format!(" at {}", self.speed));
        }
        if !self.eta.is_empty() {
            line.push_str(&format!(" (ETA: {})", self.eta));
        }
        line
    }
}

/// Post-processing steps worth telling the user about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Merging,
    ConvertingAudio,
    Remuxing,
}

/// Everything the front-ends react to while a download runs.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    Progress(ProgressUpdate),
    Stage(Stage),
    Warning(String),
    Error(String),
}

impl DownloadEvent {
    /// Text for the status line.
    pub fn status_text(&self) -> String {
        match self {
            DownloadEvent::Progress(update) => match update.status {
                ProgressStatus::Finished => "Status: Download complete. Processing...".to_string(),
                ProgressStatus::Error => "Status: Error during download.".to_string(),
                _ => update.status_line(),
            },
            DownloadEvent::Stage(Stage::Merging) => "Status: Merging video and audio...".to_string(),
            DownloadEvent::Stage(Stage::ConvertingAudio) => "Status: Converting to MP3...".to_string(),
            DownloadEvent::Stage(Stage::Remuxing) => "Status: Finalizing video file...".to_string(),
            DownloadEvent::Warning(msg) => format!("Status: Warning - {msg}"),
            DownloadEvent::Error(msg) => format!("Status: Error - {msg}"),
        }
    }
}

/// Turn one line of yt-dlp output into an event, if it carries one.
pub fn classify_line(line: &str) -> Option<DownloadEvent> {
    let clean = strip_ansi(line);
    let line = clean.trim();

    if let Some(update) = parse_progress_line(line) {
        return Some(DownloadEvent::Progress(update));
    }
    if line.starts_with("[Merger]") {
        return Some(DownloadEvent::Stage(Stage::Merging));
    }
    if line.starts_with("[ExtractAudio]") {
        return Some(DownloadEvent::Stage(Stage::ConvertingAudio));
    }
    if line.starts_with("[VideoRemuxer]") {
        return Some(DownloadEvent::Stage(Stage::Remuxing));
    }
    if let Some(msg) = line.strip_prefix("WARNING:") {
        return Some(DownloadEvent::Warning(msg.trim().to_string()));
    }
    if let Some(msg) = line.strip_prefix("ERROR:") {
        return Some(DownloadEvent::Error(msg.trim().to_string()));
    }
    None
}

/// Parse a line produced by [`PROGRESS_TEMPLATE`].
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let clean = strip_ansi(line);
    let rest = clean.trim().strip_prefix(PROGRESS_MARKER)?.strip_prefix('|')?;
    let fields: Vec<&str> = rest.split('|').map(str::trim).collect();
    if fields.len() != 10 {
        return None;
    }

    let text = |s: &str| if s == "NA" { String::new() } else { s.to_string() };
    let status = match fields[0] {
        "downloading" => ProgressStatus::Downloading,
        "finished" => ProgressStatus::Finished,
        "error" => ProgressStatus::Error,
        other => ProgressStatus::Other(other.to_string()),
    };

    Some(ProgressUpdate {
        status,
        downloaded_bytes: parse_count(fields[1]),
        total_bytes: parse_count(fields[2]),
        total_bytes_estimate: fields[3].parse::<f64>().ok().filter(|v| v.is_finite()),
        percent: text(fields[4]),
        total: text(fields[5]),
        speed: text(fields[6]),
        eta: text(fields[7]),
        playlist_index: parse_count(fields[8]),
        playlist_count: parse_count(fields[9]),
    })
}

fn parse_count(field: &str) -> Option<u64> {
    field
        .parse::<u64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
}

fn strip_ansi(line: &str) -> std::borrow::Cow<'_, str> {
    ANSI_ESCAPE.replace_all(line, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_downloading_line() {
        let line = "umd-progress|downloading|1048576|4194304|NA| 25.0%|   4.00MiB|1.00MiB/s|00:03|NA|NA";
        let update = parse_progress_line(line).unwrap();
        assert_eq!(update.status, ProgressStatus::Downloading);
        assert_eq!(update.fraction(), Some(0.25));
        assert_eq!(update.percent, "25.0%");
        assert_eq!(
            update.status_line(),
            "Status: Downloading | 25.0% of 4.00MiB at 1.00MiB/s (ETA: 00:03)"
        );
    }

    #[test]
    fn estimate_is_used_without_total() {
        let line = "umd-progress|downloading|500|NA|1000.0|50.0%|~1000B|NA|NA|2|7";
        let update = parse_progress_line(line).unwrap();
        assert_eq!(update.fraction(), Some(0.5));
        assert_eq!(
            update.status_line(),
            "Status: Downloading (File 2/7) | 50.0% of ~1000B"
        );
    }

    #[test]
    fn no_total_means_no_fraction() {
        let line = "umd-progress|downloading|500|NA|NA|NA|NA|NA|NA|NA|NA";
        assert_eq!(parse_progress_line(line).unwrap().fraction(), None);
    }

    #[test]
    fn strips_terminal_colors() {
        let line = "umd-progress|downloading|1|2|NA|\x1b[0;94m 50.0%\x1b[0m|2B|NA|NA|NA|NA";
        assert_eq!(parse_progress_line(line).unwrap().percent, "50.0%");
    }

    #[test]
    fn rejects_foreign_lines() {
        assert!(parse_progress_line("[download]  42.0% of 10.00MiB").is_none());
        assert!(parse_progress_line("umd-progress|downloading|1").is_none());
    }

    #[test]
    fn classifies_postprocessor_lines() {
        assert_eq!(
            classify_line("[Merger] Merging formats into \"a.mp4\""),
            Some(DownloadEvent::Stage(Stage::Merging))
        );
        assert_eq!(
            classify_line("[ExtractAudio] Destination: a.mp3"),
            Some(DownloadEvent::Stage(Stage::ConvertingAudio))
        );
        assert_eq!(
            classify_line("[VideoRemuxer] Not remuxing media file"),
            Some(DownloadEvent::Stage(Stage::Remuxing))
        );
        assert_eq!(classify_line("[youtube] abc: Downloading webpage"), None);
    }

    #[test]
    fn classifies_warnings_and_errors() {
        let warning = classify_line("WARNING: [youtube] falling back").unwrap();
        assert_eq!(warning.status_text(), "Status: Warning - [youtube] falling back");

        let error = classify_line("ERROR: Video unavailable").unwrap();
        assert_eq!(error, DownloadEvent::Error("Video unavailable".into()));
    }

    #[test]
    fn finished_progress_reads_as_processing() {
        let line = "umd-progress|finished|10|10|NA|100%|10B|NA|NA|NA|NA";
        let event = classify_line(line).unwrap();
        assert_eq!(event.status_text(), "Status: Download complete. Processing...");
    }
}

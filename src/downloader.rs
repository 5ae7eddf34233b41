use crate::bundle::Toolchain;
use crate::error::{Error, Result};
use crate::model::MediaInfo;
use crate::plan::{DownloadRequest, Scope};
use crate::progress::{classify_line, DownloadEvent, PROGRESS_TEMPLATE};
use crate::selection::PostProcess;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    sync::mpsc::UnboundedSender,
};

/// How much `probe` asks yt-dlp to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    /// Playlist entries are listed without resolving each video
    Flat,
    /// Only the video itself, with its full format list
    Single,
}

/// Outcome of a download that yt-dlp did not abort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// `ERROR:` lines printed for skipped playlist items
    pub errors: Vec<String>,
}

/// Thin async driver around the yt-dlp executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    ffmpeg: Option<PathBuf>,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>, ffmpeg: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ffmpeg,
        }
    }

    pub fn from_toolchain(tools: &Toolchain) -> Self {
        Self::new(
            tools.yt_dlp.path.clone(),
            tools.ffmpeg.as_ref().map(|t| t.path.clone()),
        )
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        #[cfg(target_os = "windows")]
        {
            // CREATE_NO_WINDOW
            cmd.creation_flags(0x0800_0000);
        }
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    /// Fetch metadata for `url` without downloading anything.
    pub async fn probe(&self, url: &str, mode: ProbeMode) -> Result<MediaInfo> {
        let scope_flag = match mode {
            ProbeMode::Flat => "--flat-playlist",
            ProbeMode::Single => "--no-playlist",
        };
        tracing::debug!(url, ?mode, "probing");

        let output = self
            .command()
            .args(["-J", "--no-warnings", scope_flag, "--", url])
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(status = %output.status, %stderr, "probe failed");
            return Err(classify_failure(&stderr));
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    /// Command line for `request`.
    pub fn build_args(&self, request: &DownloadRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--encoding".into(),
            "utf-8".into(),
            "--newline".into(),
            "--progress-template".into(),
            PROGRESS_TEMPLATE.into(),
            "-f".into(),
            request.format.clone().into(),
            "-o".into(),
            request.output_template.clone().into(),
        ];

        args.push(
            match request.scope {
                Scope::Single => "--no-playlist",
                Scope::Playlist => "--yes-playlist",
            }
            .into(),
        );
        if request.ignore_errors {
            args.push("--ignore-errors".into());
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.clone().into());
        }

        match request.postprocess {
            PostProcess::None => {}
            PostProcess::ExtractAudio { bitrate_kbps } => {
                args.extend(["-x", "--audio-format", "mp3", "--audio-quality"].map(OsString::from));
                args.push(format!("{bitrate_kbps}K").into());
            }
            PostProcess::RemuxMp4 => {
                args.extend(["--remux-video", "mp4"].map(OsString::from));
            }
        }

        args.push("--".into());
        args.push(request.url.clone().into());
        args
    }

    /// Run the download, forwarding progress and stage changes to `events`.
    pub async fn download(
        &self,
        request: &DownloadRequest,
        events: UnboundedSender<DownloadEvent>,
    ) -> Result<DownloadReport> {
        let args = self.build_args(request);
        tracing::info!(url = %request.url, format = %request.format, "starting download");
        tracing::debug!(program = %self.program.display(), ?args, "spawning yt-dlp");

        let mut child = self
            .command()
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("yt-dlp stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("yt-dlp stderr was not captured"))?;

        let (out_errors, err_errors) = tokio::join!(
            forward_lines(stdout, events.clone()),
            forward_lines(stderr, events)
        );
        let status = child.wait().await?;

        let mut errors = out_errors?;
        errors.extend(err_errors?);

        if status.success() {
            tracing::info!(url = %request.url, "download finished");
            return Ok(DownloadReport { errors });
        }
        if request.ignore_errors {
            tracing::warn!(%status, skipped = errors.len(), "download finished with errors");
            return Ok(DownloadReport { errors });
        }
        if errors.iter().any(|e| e.contains("DRM")) {
            return Err(Error::DrmProtected);
        }
        Err(Error::DownloadFailed(
            errors
                .pop()
                .unwrap_or_else(|| format!("yt-dlp exited with {status}")),
        ))
    }
}

/// Forward classified lines to `tx`, returning the `ERROR:` messages seen.
///
/// Reads until EOF so the child never blocks on a full pipe. Lines that are
/// not valid UTF-8 (console code pages on Windows) are decoded lossily.
async fn forward_lines<R>(reader: R, tx: UnboundedSender<DownloadEvent>) -> Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    let mut errors = Vec::new();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        tracing::trace!("yt-dlp> {line}");
        if let Some(event) = classify_line(line) {
            if let DownloadEvent::Error(msg) = &event {
                errors.push(msg.clone());
            }
            // Receiver gone means nobody is watching; keep draining.
            let _ = tx.send(event);
        }
    }
    Ok(errors)
}

/// Map a failed probe's stderr to an error.
pub fn classify_failure(stderr: &str) -> Error {
    if stderr.contains("DRM") {
        return Error::DrmProtected;
    }
    let last = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .next_back()
        .map(|l| l.strip_prefix("ERROR:").unwrap_or(l).trim().to_string());
    Error::Extraction(last.unwrap_or_else(|| "yt-dlp failed without an error message".to_string()))
}

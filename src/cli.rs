//! Terminal front-end: argument parsing and the interactive menu loop.

use crate::bundle::{Toolchain, MANIFEST};
use crate::config::{self, AppConfig, DownloadFolders};
use crate::downloader::{DownloadReport, YtDlp};
use crate::error::{Error, Result};
use crate::model::{MediaInfo, MediaKind};
use crate::plan::{quick_request, DownloadRequest, Scope, Selection};
use crate::progress::{DownloadEvent, ProgressStatus};
use crate::sanitize::sanitize_url;
use crate::selection::{smart_choices, QualityPreset};
use crate::service::{Analysis, MediaService};
use crate::units::format_size;
use clap::{ArgAction, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::unbounded_channel;

const BAR_SCALE: u64 = 1000;

/// Universal audio/video downloader (yt-dlp + ffmpeg)
#[derive(Debug, Parser)]
#[command(name = "umd-cli", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub config: AppConfig,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// URL to process first when no subcommand is given
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Prompt for URLs in a loop (default)
    Interactive {
        /// Process this URL before prompting
        url: Option<String>,
    },
    /// Download the best video, or MP3 audio, without any menus
    Quick {
        url: String,
        /// Extract audio as MP3 instead of downloading video
        #[arg(long)]
        audio: bool,
        /// Target directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Show where yt-dlp, ffmpeg and ffprobe are found
    Tools,
}

impl Cli {
    /// Default log level for `-v` flags.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Execute the parsed command.
pub fn run(cli: Cli, rt: &Runtime) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Command::Interactive { url: cli.url }) {
        Command::Tools => print_tools(&cli.config),
        Command::Quick { url, audio, dir } => {
            let service = build_service(&cli.config, DownloadFolders::under(&dir))?;
            let kind = if audio { MediaKind::Audio } else { MediaKind::Video };
            let request = quick_request(&url, kind, &dir);
            println!("Starting download... please wait.");
            let report = drive_download(rt, &service, &request)?;
            println!("Download finished successfully!");
            if !report.errors.is_empty() {
                println!("{} item(s) were skipped.", report.errors.len());
            }
            Ok(())
        }
        Command::Interactive { url } => {
            let folders = DownloadFolders::prepare(cli.config.output_root.as_deref())?;
            println!("Downloads will be saved to: {}", folders.root.display());
            let service = build_service(&cli.config, folders)?;
            let stdin = io::stdin();
            let mut session = Session::new(rt, service, stdin.lock(), io::stdout());
            session.run(url)?;
            Ok(())
        }
    }
}

fn build_service(config: &AppConfig, folders: DownloadFolders) -> Result<MediaService> {
    let tools = Toolchain::resolve(config)?;
    Ok(MediaService::new(YtDlp::from_toolchain(&tools), folders))
}

fn print_tools(config: &AppConfig) -> anyhow::Result<()> {
    println!("{}", style(MANIFEST.window_title).bold());
    let reports = MANIFEST.check(config, &config::cache_dir());
    for report in &reports {
        println!("  {report}");
    }
    if reports.iter().all(|r| r.is_satisfied()) {
        Ok(())
    } else {
        anyhow::bail!("required tools are missing")
    }
}

/// Parse a 1-based menu answer.
pub fn parse_menu_choice(input: &str, max: usize) -> std::result::Result<usize, &'static str> {
    match input.trim().parse::<usize>() {
        Ok(n) if (1..=max).contains(&n) => Ok(n),
        Ok(_) => Err("Invalid choice."),
        Err(_) => Err("Please enter a number."),
    }
}

/// Run `request` with an indicatif progress bar on stderr.
pub fn drive_download(
    rt: &Runtime,
    service: &MediaService,
    request: &DownloadRequest,
) -> Result<DownloadReport> {
    let bar = ProgressBar::new(BAR_SCALE);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let (tx, mut rx) = unbounded_channel();
    let result = rt.block_on(async {
        let download = service.download(request, tx);
        tokio::pin!(download);
        loop {
            tokio::select! {
                result = &mut download => break result,
                Some(event) = rx.recv() => render_event(&bar, event),
            }
        }
    });
    while let Ok(event) = rx.try_recv() {
        render_event(&bar, event);
    }
    bar.finish_and_clear();
    result
}

fn render_event(bar: &ProgressBar, event: DownloadEvent) {
    match &event {
        DownloadEvent::Progress(update) => {
            if update.status == ProgressStatus::Finished {
                bar.set_position(BAR_SCALE);
                return;
            }
            if let Some(fraction) = update.fraction() {
                bar.set_position((f64::from(fraction) * BAR_SCALE as f64) as u64);
            }
            let mut msg = update.total.clone();
            if let (Some(index), Some(count)) = (update.playlist_index, update.playlist_count) {
                msg = format!("file {index}/{count} {msg}");
            }
            if !update.speed.is_empty() {
                msg.push_str(&format!(" at {}", update.speed));
            }
            if !update.eta.is_empty() {
                msg.push_str(&format!(" ETA {}", update.eta));
            }
            bar.set_message(msg);
        }
        DownloadEvent::Stage(_) => bar.println(event.status_text()),
        DownloadEvent::Warning(_) => bar.println(style(event.status_text()).yellow().to_string()),
        DownloadEvent::Error(_) => bar.println(style(event.status_text()).red().to_string()),
    }
}

/// Interactive prompt loop over any line source.
pub struct Session<'a, R, W> {
    rt: &'a Runtime,
    service: MediaService,
    input: R,
    out: W,
}

impl<'a, R: BufRead, W: Write> Session<'a, R, W> {
    pub fn new(rt: &'a Runtime, service: MediaService, input: R, out: W) -> Self {
        Self {
            rt,
            service,
            input,
            out,
        }
    }

    /// Prompt for URLs until `exit`, `quit` or end of input.
    pub fn run(&mut self, first_url: Option<String>) -> io::Result<()> {
        let mut pending = first_url;
        loop {
            let url = match pending.take() {
                Some(url) => url,
                None => {
                    writeln!(self.out, "\n{}", style("--- Universal Audio/Video Downloader ---").bold())?;
                    writeln!(
                        self.out,
                        "Supports YouTube, Vimeo, SoundCloud, etc. Does NOT support DRM sites like Spotify."
                    )?;
                    match self.prompt("Please enter the URL (or type 'exit' to quit): ")? {
                        Some(url) => url,
                        None => break,
                    }
                }
            };

            if url.eq_ignore_ascii_case("exit") || url.eq_ignore_ascii_case("quit") {
                break;
            }
            if url.is_empty() {
                writeln!(self.out, "No URL provided.")?;
                continue;
            }

            self.process_url(&url)?;
            writeln!(self.out, "\n{}\n", "=".repeat(50))?;
        }
        writeln!(self.out, "Exiting. Goodbye!")?;
        Ok(())
    }

    fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.out, "{text}")?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Ask until a valid 1-based answer arrives; `None` on end of input.
    fn pick(&mut self, max: usize) -> io::Result<Option<usize>> {
        loop {
            let Some(answer) = self.prompt(&format!("Enter your choice (1-{max}): "))? else {
                return Ok(None);
            };
            match parse_menu_choice(&answer, max) {
                Ok(n) => return Ok(Some(n)),
                Err(msg) => writeln!(self.out, "{msg}")?,
            }
        }
    }

    fn process_url(&mut self, raw_url: &str) -> io::Result<()> {
        let clean = sanitize_url(raw_url);
        if clean != raw_url {
            writeln!(self.out, "Sanitizing URL to: {clean}")?;
        }
        let analysis = self.rt.block_on(self.service.analyze(raw_url));
        match analysis {
            Ok(Analysis::Playlist { url, count, .. }) => {
                writeln!(self.out, "\nThis URL contains a playlist with {count} videos.")?;
                writeln!(self.out, "1: Download the entire playlist")?;
                writeln!(self.out, "2: Download only the single video from the URL")?;
                writeln!(self.out, "3: Go back")?;
                match self.pick(3)? {
                    Some(1) => self.playlist_menu(&url),
                    Some(2) => {
                        writeln!(self.out, "Fetching available formats, please wait...")?;
                        match self.rt.block_on(self.service.fetch_single(&url)) {
                            Ok(info) => self.single_menu(&url, &info),
                            Err(err) => self.report_fetch_error(&err),
                        }
                    }
                    _ => Ok(()),
                }
            }
            Ok(Analysis::Single { url, info }) => self.single_menu(&url, &info),
            Err(err) => self.report_fetch_error(&err),
        }
    }

    fn report_fetch_error(&mut self, err: &Error) -> io::Result<()> {
        let msg = match err {
            Error::DrmProtected => "Error: This content is protected by DRM.".to_string(),
            other => format!("An error occurred while checking the URL: {other}"),
        };
        writeln!(self.out, "\n{}", style(msg).red())
    }

    fn single_menu(&mut self, url: &str, info: &MediaInfo) -> io::Result<()> {
        let choices = match smart_choices(&info.formats) {
            Ok(choices) => choices,
            Err(err) => return writeln!(self.out, "{err}"),
        };

        writeln!(self.out, "\n--- Please Select a Download Option ---")?;
        for (i, choice) in choices.iter().enumerate() {
            writeln!(
                self.out,
                "{}: {} (~{})",
                i + 1,
                choice.label,
                format_size(choice.filesize)
            )?;
        }
        let back = choices.len() + 1;
        writeln!(self.out, "{back}: Go back (Choose another URL)")?;
        writeln!(self.out, "{}", "-".repeat(40))?;

        let picked = match self.pick(back)? {
            Some(n) if n < back => n,
            _ => {
                writeln!(self.out, "\nReturning to URL selection...")?;
                return Ok(());
            }
        };
        let selection = Selection::Choice(choices[picked - 1].clone());
        let request = self.service.plan(url, &selection, Scope::Single);
        self.download(&request, "Download finished successfully!")
    }

    fn playlist_menu(&mut self, url: &str) -> io::Result<()> {
        writeln!(self.out, "\n--- Choose a Quality for the ENTIRE Playlist ---")?;
        for (i, preset) in QualityPreset::ALL.iter().enumerate() {
            writeln!(self.out, "{}: {}", i + 1, preset.label())?;
        }
        let back = QualityPreset::ALL.len() + 1;
        writeln!(self.out, "{back}: Go back")?;

        let preset = match self.pick(back)? {
            Some(n) if n < back => QualityPreset::ALL[n - 1],
            _ => {
                writeln!(self.out, "\nReturning to URL selection...")?;
                return Ok(());
            }
        };
        let request = self
            .service
            .plan(url, &Selection::Preset(preset), Scope::Playlist);
        writeln!(self.out, "\nStarting playlist download... this may take a while.")?;
        self.download(&request, "Playlist download finished!")
    }

    fn download(&mut self, request: &DownloadRequest, done: &str) -> io::Result<()> {
        writeln!(self.out, "\nStarting download... please wait.")?;
        match drive_download(self.rt, &self.service, request) {
            Ok(report) => {
                writeln!(self.out, "\n{done}")?;
                if !report.errors.is_empty() {
                    writeln!(self.out, "{} item(s) could not be downloaded.", report.errors.len())?;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "download failed");
                writeln!(
                    self.out,
                    "\n{}",
                    style(format!("An unexpected error occurred during download: {err}")).red()
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_choice_bounds() {
        assert_eq!(parse_menu_choice("1", 3), Ok(1));
        assert_eq!(parse_menu_choice(" 3 \n", 3), Ok(3));
        assert_eq!(parse_menu_choice("0", 3), Err("Invalid choice."));
        assert_eq!(parse_menu_choice("4", 3), Err("Invalid choice."));
        assert_eq!(parse_menu_choice("two", 3), Err("Please enter a number."));
        assert_eq!(parse_menu_choice("", 3), Err("Please enter a number."));
    }

    #[test]
    fn default_command_is_interactive() {
        let cli = Cli::try_parse_from(["umd-cli"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn bare_url_starts_interactive_session() {
        let cli = Cli::try_parse_from(["umd-cli", "https://example.com/v"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.url.as_deref(), Some("https://example.com/v"));
    }

    #[test]
    fn quick_flags_parse() {
        let cli = Cli::try_parse_from([
            "umd-cli",
            "-vv",
            "quick",
            "https://example.com/v",
            "--audio",
            "--yt-dlp",
            "/opt/yt-dlp",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), "debug");
        assert_eq!(cli.config.yt_dlp, Some(PathBuf::from("/opt/yt-dlp")));
        match cli.command {
            Some(Command::Quick { url, audio, dir }) => {
                assert_eq!(url, "https://example.com/v");
                assert!(audio);
                assert_eq!(dir, PathBuf::from("."));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    fn session_with_input(input: &str) -> (Runtime, String) {
        let rt = Runtime::new().unwrap();
        let service = MediaService::new(
            YtDlp::new("/nonexistent/yt-dlp", None),
            DownloadFolders::under("/downloads"),
        );
        let mut out = Vec::new();
        Session::new(&rt, service, input.as_bytes(), &mut out)
            .run(None)
            .unwrap();
        (rt, String::from_utf8(out).unwrap())
    }

    #[test]
    fn exit_leaves_the_loop() {
        let (_rt, out) = session_with_input("EXIT\n");
        assert!(out.contains("Please enter the URL"));
        assert!(out.ends_with("Exiting. Goodbye!\n"));
    }

    #[test]
    fn cleaned_url_is_announced() {
        let (_rt, out) = session_with_input("https://youtu.be/abc?si=track\nquit\n");
        assert!(out.contains("Sanitizing URL to: https://youtu.be/abc\n"));
    }

    #[test]
    fn clean_url_is_not_announced() {
        let (_rt, out) = session_with_input("https://example.com/v\nquit\n");
        assert!(!out.contains("Sanitizing URL"));
    }

    #[test]
    fn empty_url_reprompts_until_eof() {
        let (_rt, out) = session_with_input("\n");
        assert!(out.contains("No URL provided."));
        assert!(out.contains("Exiting. Goodbye!"));
    }

    #[test]
    fn missing_tool_is_reported_and_loop_continues() {
        let (_rt, out) = session_with_input("https://example.com/v\nquit\n");
        assert!(out.contains("An error occurred while checking the URL"));
        assert!(out.contains(&"=".repeat(50)));
        assert!(out.ends_with("Exiting. Goodbye!\n"));
    }
}

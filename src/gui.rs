//! Desktop front-end built on eframe/egui.
//!
//! The UI thread never waits on yt-dlp: fetches, thumbnails and downloads run
//! on a global Tokio runtime and report back over channels that `update`
//! drains every frame.

use crate::bundle::{window_icon, Toolchain, MANIFEST};
use crate::config::{AppConfig, DownloadFolders};
use crate::downloader::{DownloadReport, YtDlp};
use crate::error::Result;
use crate::model::{MediaInfo, MediaKind};
use crate::plan::{Scope, Selection};
use crate::progress::{DownloadEvent, ProgressStatus};
use crate::selection::{estimate_preset_sizes, QualityPreset};
use crate::service::{Analysis, MediaService};
use crate::thumbnail;
use crate::units::format_size;
use eframe::{egui, App, Frame};
use egui::{ColorImage, TextureOptions, Visuals};
use once_cell::sync::OnceCell;
use rfd::FileDialog;
use std::path::PathBuf;
use std::time::Duration;
use tokio::{
    runtime::Runtime,
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};

const ATTRIBUTION: &str = "Made by Askari (github.com/Askari64)";
const ATTRIBUTION_URL: &str = "https://github.com/Askari64";

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Create the runtime, resolve tools and open the window.
pub fn run(config: AppConfig) -> anyhow::Result<()> {
    let rt = RUNTIME.get_or_try_init(Runtime::new)?;

    let folders = DownloadFolders::prepare(config.output_root.as_deref())?;
    let service = match Toolchain::resolve(&config) {
        Ok(tools) => Ok(MediaService::new(YtDlp::from_toolchain(&tools), folders.clone())),
        Err(err) => {
            tracing::error!(error = %err, "cannot start downloads");
            Err(err.user_message())
        }
    };

    let mut viewport = egui::ViewportBuilder::default()
        .with_title(MANIFEST.window_title)
        .with_inner_size([700.0, 550.0])
        .with_min_inner_size([650.0, 450.0]);
    if let Some(icon) = window_icon() {
        viewport = viewport.with_icon(icon);
    }
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        MANIFEST.window_title,
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(DownloaderApp::new(rt, service, folders))
        }),
    )
    .map_err(|err| anyhow::anyhow!("GUI failed: {err}"))
}

/// Where the user is in the fetch → choose → download flow.
#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    Fetching,
    /// Playlist detected; whole list or just the linked video?
    PlaylistChoice { url: String, count: u64 },
    /// Pick one of the quality presets
    Quality {
        url: String,
        scope: Scope,
        sizes: [Option<u64>; 6],
    },
    Downloading { scope: Scope },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaylistPick {
    Whole,
    SingleVideo,
}

/// Results delivered from background tasks.
enum Message {
    Analyzed(Result<Analysis>),
    SingleFetched { url: String, result: Result<MediaInfo> },
    Thumbnail { url: String, image: ColorImage },
    Finished { scope: Scope, result: Result<DownloadReport> },
}

/// Application state for the GUI
pub struct DownloaderApp {
    rt: &'static Runtime,
    /// `Err` holds the reason downloads are unavailable (e.g. yt-dlp missing)
    service: std::result::Result<MediaService, String>,
    folders: DownloadFolders,
    /// Input field for the media URL
    url_input: String,
    phase: Phase,
    playlist_pick: PlaylistPick,
    selected_preset: QualityPreset,
    status: String,
    progress: f32,
    /// Title of the fetched single video
    media_title: Option<String>,
    /// URL whose thumbnail is currently wanted
    thumbnail_for: Option<String>,
    pending_thumbnail: Option<ColorImage>,
    thumbnail: Option<egui::TextureHandle>,
    /// Folder to offer in "Open Folder" after a finished download
    finished_folder: Option<PathBuf>,
    tx: UnboundedSender<Message>,
    rx: UnboundedReceiver<Message>,
    /// Progress updates of the running download
    events_rx: Option<UnboundedReceiver<DownloadEvent>>,
}

impl DownloaderApp {
    fn new(
        rt: &'static Runtime,
        service: std::result::Result<MediaService, String>,
        folders: DownloadFolders,
    ) -> Self {
        let (tx, rx) = unbounded_channel();
        let status = match &service {
            Ok(_) => "Status: Ready".to_string(),
            Err(reason) => reason.clone(),
        };
        Self {
            rt,
            service,
            folders,
            url_input: String::new(),
            phase: Phase::Idle,
            playlist_pick: PlaylistPick::Whole,
            selected_preset: QualityPreset::BestVideo,
            status,
            progress: 0.0,
            media_title: None,
            thumbnail_for: None,
            pending_thumbnail: None,
            thumbnail: None,
            finished_folder: None,
            tx,
            rx,
            events_rx: None,
        }
    }

    fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Fetching | Phase::Downloading { .. })
    }

    fn start_fetch(&mut self, ctx: &egui::Context) {
        let url = self.url_input.trim().to_string();
        if url.is_empty() || self.is_busy() {
            return;
        }
        let Ok(service) = self.service.clone() else {
            return;
        };

        self.phase = Phase::Fetching;
        self.status = "Status: Fetching URL info...".to_string();
        self.media_title = None;
        self.thumbnail = None;
        self.thumbnail_for = None;
        self.finished_folder = None;

        let tx = self.tx.clone();
        let ctx = ctx.clone();
        self.rt.spawn(async move {
            let result = service.analyze(&url).await;
            let _ = tx.send(Message::Analyzed(result));
            ctx.request_repaint();
        });
    }

    fn fetch_single(&mut self, ctx: &egui::Context, url: String) {
        let Ok(service) = self.service.clone() else {
            return;
        };
        self.phase = Phase::Fetching;
        self.status = "Status: Fetching video info...".to_string();

        let tx = self.tx.clone();
        let ctx = ctx.clone();
        self.rt.spawn(async move {
            let result = service.fetch_single(&url).await;
            let _ = tx.send(Message::SingleFetched { url, result });
            ctx.request_repaint();
        });
    }

    fn fetch_thumbnail(&mut self, ctx: &egui::Context, media_url: &str, image_url: String) {
        self.thumbnail_for = Some(media_url.to_string());
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        let url = media_url.to_string();
        self.rt.spawn_blocking(move || {
            if let Some(image) = thumbnail::fetch_thumbnail(&image_url) {
                let _ = tx.send(Message::Thumbnail { url, image });
                ctx.request_repaint();
            }
        });
    }

    fn start_download(&mut self, ctx: &egui::Context) {
        let Phase::Quality { url, scope, .. } = &self.phase else {
            return;
        };
        let Ok(service) = self.service.clone() else {
            return;
        };
        let scope = *scope;
        let selection = Selection::Preset(self.selected_preset);
        let request = service.plan(url, &selection, scope);
        self.finished_folder = Some(match selection.kind() {
            MediaKind::Audio => self.folders.audio.clone(),
            MediaKind::Video => self.folders.video.clone(),
        });

        let (events_tx, events_rx) = unbounded_channel();
        self.events_rx = Some(events_rx);
        self.phase = Phase::Downloading { scope };
        self.progress = 0.0;
        self.status = "Status: Starting download...".to_string();

        let tx = self.tx.clone();
        let ctx = ctx.clone();
        self.rt.spawn(async move {
            let result = service.download(&request, events_tx).await;
            let _ = tx.send(Message::Finished { scope, result });
            ctx.request_repaint();
        });
    }

    /// Apply one background result. Returns a thumbnail URL to fetch, if any.
    fn handle_message(&mut self, message: Message) -> Option<(String, String)> {
        match message {
            Message::Analyzed(Ok(Analysis::Playlist { url, count, .. })) => {
                self.status = format!("Status: Playlist found with {count} items.");
                self.playlist_pick = PlaylistPick::Whole;
                self.phase = Phase::PlaylistChoice { url, count };
            }
            Message::Analyzed(Ok(Analysis::Single { url, info })) => {
                return self.show_single(url, *info);
            }
            Message::SingleFetched {
                url,
                result: Ok(info),
            } => return self.show_single(url, info),
            Message::Analyzed(Err(err)) | Message::SingleFetched { result: Err(err), .. } => {
                tracing::warn!(error = %err, "fetch failed");
                self.status = err.user_message();
                self.phase = Phase::Idle;
            }
            Message::Thumbnail { url, image } => {
                if self.thumbnail_for.as_deref() == Some(url.as_str()) {
                    self.pending_thumbnail = Some(image);
                }
            }
            Message::Finished { scope, result } => {
                self.events_rx = None;
                self.phase = Phase::Idle;
                match result {
                    Ok(report) => {
                        self.progress = 1.0;
                        self.status = match scope {
                            Scope::Playlist if !report.errors.is_empty() => format!(
                                "Status: Playlist download complete! ({} items skipped)",
                                report.errors.len()
                            ),
                            Scope::Playlist => "Status: Playlist download complete!".to_string(),
                            Scope::Single => "Status: Download complete!".to_string(),
                        };
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "download failed");
                        self.status = err.user_message();
                        self.finished_folder = None;
                    }
                }
            }
        }
        None
    }

    fn show_single(&mut self, url: String, info: MediaInfo) -> Option<(String, String)> {
        self.status = "Status: Choose a quality for the single video.".to_string();
        self.media_title = Some(info.display_title().to_string());
        self.selected_preset = QualityPreset::BestVideo;
        let thumbnail = info.thumbnail.clone().map(|image| (url.clone(), image));
        self.phase = Phase::Quality {
            url,
            scope: Scope::Single,
            sizes: estimate_preset_sizes(&info.formats),
        };
        thumbnail
    }

    fn show_playlist_quality(&mut self, url: String) {
        self.status = "Status: Choose a quality for the entire playlist.".to_string();
        self.selected_preset = QualityPreset::BestVideo;
        self.phase = Phase::Quality {
            url,
            scope: Scope::Playlist,
            sizes: [None; 6],
        };
    }

    fn apply_event(&mut self, event: DownloadEvent) {
        if let DownloadEvent::Progress(update) = &event {
            match update.status {
                ProgressStatus::Finished => self.progress = 1.0,
                _ => {
                    if let Some(fraction) = update.fraction() {
                        self.progress = fraction;
                    }
                }
            }
            // Unknown totals make for a useless status line.
            if update.status == ProgressStatus::Downloading && update.fraction().is_none() {
                return;
            }
        }
        self.status = event.status_text();
    }

    fn poll_channels(&mut self, ctx: &egui::Context) {
        if let Some(rx) = self.events_rx.as_mut() {
            let mut drained = Vec::new();
            while let Ok(event) = rx.try_recv() {
                drained.push(event);
            }
            for event in drained {
                self.apply_event(event);
            }
        }

        while let Ok(message) = self.rx.try_recv() {
            if let Some((media_url, image_url)) = self.handle_message(message) {
                self.fetch_thumbnail(ctx, &media_url, image_url);
            }
        }

        if let Some(image) = self.pending_thumbnail.take() {
            self.thumbnail = Some(ctx.load_texture("thumbnail", image, TextureOptions::default()));
        }
    }

    fn browse_folder(&mut self) {
        let Some(folder) = FileDialog::new().set_directory(&self.folders.root).pick_folder() else {
            return;
        };
        match DownloadFolders::prepare(Some(&folder)) {
            Ok(folders) => {
                if let Ok(service) = self.service.as_mut() {
                    service.set_folders(folders.clone());
                }
                self.folders = folders;
            }
            Err(err) => self.status = err.user_message(),
        }
    }

    fn options_ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let mut next: Option<String> = None;
        match &self.phase {
            Phase::PlaylistChoice { url, count } => {
                ui.label(format!("Playlist with {count} items"));
                ui.radio_value(
                    &mut self.playlist_pick,
                    PlaylistPick::Whole,
                    "Download Entire Playlist",
                );
                ui.radio_value(
                    &mut self.playlist_pick,
                    PlaylistPick::SingleVideo,
                    "Download Single Video Only",
                );
                if ui.button("Next").clicked() {
                    next = Some(url.clone());
                }
            }
            Phase::Quality { sizes, scope, .. } => {
                let sizes = *sizes;
                let scope = *scope;
                ui.horizontal(|ui| {
                    if let Some(tex) = &self.thumbnail {
                        ui.add(egui::Image::new(tex).max_width(160.0));
                    }
                    if let Some(title) = &self.media_title {
                        ui.label(egui::RichText::new(title).strong());
                    }
                });
                for (preset, size) in QualityPreset::ALL.into_iter().zip(sizes) {
                    let label = match (scope, size) {
                        (Scope::Single, Some(size)) => {
                            format!("{} (~{})", preset.label(), format_size(Some(size)))
                        }
                        _ => preset.label().to_string(),
                    };
                    ui.radio_value(&mut self.selected_preset, preset, label);
                }
            }
            Phase::Fetching => {
                ui.spinner();
            }
            Phase::Idle | Phase::Downloading { .. } => {}
        }

        if let Some(url) = next {
            match self.playlist_pick {
                PlaylistPick::Whole => self.show_playlist_quality(url),
                PlaylistPick::SingleVideo => self.fetch_single(ctx, url),
            }
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.poll_channels(ctx);

        // Bottom panel: download button, status, progress and output folder
        egui::TopBottomPanel::bottom("download_panel").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                let can_download = matches!(self.phase, Phase::Quality { .. });
                if ui
                    .add_enabled(can_download, egui::Button::new("Download"))
                    .clicked()
                {
                    self.start_download(ctx);
                }
                if let Some(folder) = &self.finished_folder {
                    if !self.is_busy() && ui.button("Open Folder").clicked() {
                        open_in_file_manager(folder.clone());
                    }
                }
            });
            ui.label(&self.status);
            ui.add(egui::ProgressBar::new(self.progress).show_percentage());
            ui.horizontal(|ui| {
                ui.label(
                    egui::RichText::new(format!(
                        "Downloads will be saved to: {}",
                        self.folders.root.display()
                    ))
                    .small()
                    .color(egui::Color32::GRAY),
                );
                if ui
                    .add_enabled(!self.is_busy(), egui::Button::new("Browse…").small())
                    .clicked()
                {
                    self.browse_folder();
                }
            });
            ui.hyperlink_to(
                egui::RichText::new(ATTRIBUTION).small(),
                ATTRIBUTION_URL,
            );
            ui.add_space(6.0);
        });

        // Main panel: URL entry and the current set of choices
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                let field_width = (ui.available_width() - 110.0).max(100.0);
                let response = ui.add_sized(
                    [field_width, 24.0],
                    egui::TextEdit::singleline(&mut self.url_input).hint_text("Enter URL here..."),
                );
                let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                let label = if self.phase == Phase::Fetching {
                    "Fetching..."
                } else {
                    "Fetch Info"
                };
                let can_fetch = !self.is_busy() && self.service.is_ok();
                let clicked = ui
                    .add_enabled(can_fetch, egui::Button::new(label))
                    .clicked();
                if (clicked || enter) && can_fetch {
                    self.start_fetch(ctx);
                }
            });

            ui.separator();
            ui.label(egui::RichText::new("Download Options").strong());

            egui::ScrollArea::vertical()
                .auto_shrink([false; 2])
                .show(ui, |ui| self.options_ui(ui, ctx));
        });

        // Request periodic repaint for progress updates
        if self.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

/// Reveal `folder` in the platform file manager.
fn open_in_file_manager(folder: PathBuf) {
    std::thread::spawn(move || {
        let program = if cfg!(target_os = "windows") {
            "explorer"
        } else if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        };
        if let Err(err) = std::process::Command::new(program).arg(&folder).spawn() {
            tracing::warn!(error = %err, folder = %folder.display(), "cannot open folder");
        }
    });
}

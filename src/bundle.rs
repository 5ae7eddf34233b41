//! Bundled external tools and the packaging metadata of the executable.
//!
//! yt-dlp, ffmpeg and ffprobe can be embedded into the binary by dropping
//! them into `assets/` before building. At runtime each tool is looked up in
//! this order: explicit override, embedded copy (extracted into the cache
//! directory), a copy next to the running executable, and finally `PATH`.

use crate::config::{self, AppConfig};
use crate::error::{Error, Result};
use eframe::egui::IconData;
use rust_embed::RustEmbed;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Asset;

/// External programs the downloader drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    YtDlp,
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Tool::YtDlp => "yt-dlp",
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }

    /// Executable file name on this platform.
    pub fn file_name(self) -> String {
        if cfg!(target_os = "windows") {
            format!("{}.exe", self.name())
        } else {
            self.name().to_string()
        }
    }
}

/// A binary shipped alongside the executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundledBinary {
    pub tool: Tool,
    /// Directory inside the bundle, `.` for the root
    pub destination: &'static str,
}

/// Static description of the distributable.
#[derive(Debug, Clone, Copy)]
pub struct BundleManifest {
    pub executable: &'static str,
    pub window_title: &'static str,
    /// Asset name of the window icon
    pub icon: &'static str,
    /// Whether the GUI build keeps a console window
    pub console: bool,
    pub binaries: &'static [BundledBinary],
}

pub const MANIFEST: BundleManifest = BundleManifest {
    executable: "universal-media-downloader",
    window_title: "Universal Audio/Video Downloader",
    icon: "icon.png",
    console: false,
    binaries: &[
        BundledBinary {
            tool: Tool::Ffmpeg,
            destination: ".",
        },
        BundledBinary {
            tool: Tool::Ffprobe,
            destination: ".",
        },
    ],
};

/// Where a tool was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSource {
    Override,
    Embedded,
    Sibling,
    SystemPath,
}

impl fmt::Display for ToolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ToolSource::Override => "override",
            ToolSource::Embedded => "embedded",
            ToolSource::Sibling => "bundled",
            ToolSource::SystemPath => "PATH",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTool {
    pub tool: Tool,
    pub path: PathBuf,
    pub source: ToolSource,
}

/// Places searched after the override and the embedded copy.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    /// Directory of the running executable
    pub sibling_dir: Option<PathBuf>,
    /// `PATH`-style list of directories
    pub path: Option<OsString>,
}

impl SearchPath {
    /// The executable's directory and the process `PATH`.
    pub fn system() -> Self {
        Self {
            sibling_dir: std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf)),
            path: std::env::var_os("PATH"),
        }
    }

    fn which(&self, name: impl AsRef<OsStr>) -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        which::which_in(name, self.path.as_ref(), cwd).ok()
    }
}

/// Find `tool` on the system search path, honouring an explicit override first.
pub fn locate(
    tool: Tool,
    override_path: Option<&Path>,
    cache_dir: &Path,
) -> Result<Option<ResolvedTool>> {
    locate_in(tool, override_path, cache_dir, &SearchPath::system())
}

pub fn locate_in(
    tool: Tool,
    override_path: Option<&Path>,
    cache_dir: &Path,
    search: &SearchPath,
) -> Result<Option<ResolvedTool>> {
    let found = |path: PathBuf, source: ToolSource| Some(ResolvedTool { tool, path, source });

    if let Some(path) = override_path {
        if path.is_file() {
            return Ok(found(path.to_path_buf(), ToolSource::Override));
        }
        // Bare names like `yt-dlp` are looked up on PATH.
        if path.components().count() == 1 {
            if let Some(path) = search.which(path) {
                return Ok(found(path, ToolSource::Override));
            }
        }
        return Err(Error::ToolOverrideMissing {
            tool: tool.name(),
            path: path.to_path_buf(),
        });
    }

    if let Some(path) = extract_embedded(tool, cache_dir)? {
        return Ok(found(path, ToolSource::Embedded));
    }

    let sibling = search
        .sibling_dir
        .as_ref()
        .map(|dir| dir.join(tool.file_name()))
        .filter(|candidate| candidate.is_file());
    if let Some(path) = sibling {
        return Ok(found(path, ToolSource::Sibling));
    }

    Ok(search
        .which(tool.file_name())
        .and_then(|path| found(path, ToolSource::SystemPath)))
}

/// Write the embedded copy of `tool` into `cache_dir`, if one was bundled.
pub fn extract_embedded(tool: Tool, cache_dir: &Path) -> Result<Option<PathBuf>> {
    let Some(file) = Asset::get(&tool.file_name()) else {
        return Ok(None);
    };
    let target = cache_dir.join(tool.file_name());
    write_executable(&file.data, &target)?;
    Ok(Some(target))
}

/// Materialize `bytes` as an executable at `target`.
///
/// An existing file of the same length is reused. New content goes to a
/// temporary sibling first and is renamed into place.
pub fn write_executable(bytes: &[u8], target: &Path) -> Result<()> {
    if let Ok(meta) = std::fs::metadata(target) {
        if meta.len() == bytes.len() as u64 {
            return Ok(());
        }
    }
    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let staging = target.with_extension("part");
    std::fs::write(&staging, bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&staging, std::fs::Permissions::from_mode(0o755))?;
    }
    std::fs::rename(&staging, target)?;
    tracing::debug!(path = %target.display(), "extracted embedded tool");
    Ok(())
}

/// Resolved paths of all external tools.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub yt_dlp: ResolvedTool,
    pub ffmpeg: Option<ResolvedTool>,
    pub ffprobe: Option<ResolvedTool>,
}

impl Toolchain {
    /// Resolve using the default cache directory.
    pub fn resolve(config: &AppConfig) -> Result<Self> {
        Self::resolve_in(config, &config::cache_dir(), &SearchPath::system())
    }

    pub fn resolve_in(config: &AppConfig, cache_dir: &Path, search: &SearchPath) -> Result<Self> {
        let yt_dlp = locate_in(Tool::YtDlp, config.yt_dlp.as_deref(), cache_dir, search)?.ok_or(
            Error::ToolMissing {
                tool: Tool::YtDlp.name(),
            },
        )?;
        let ffmpeg = locate_in(Tool::Ffmpeg, config.ffmpeg.as_deref(), cache_dir, search)?;
        let ffprobe = locate_in(Tool::Ffprobe, config.ffprobe.as_deref(), cache_dir, search)?;

        for (tool, resolved) in [(Tool::Ffmpeg, &ffmpeg), (Tool::Ffprobe, &ffprobe)] {
            match resolved {
                Some(found) => tracing::info!(
                    tool = tool.name(),
                    source = %found.source,
                    path = %found.path.display(),
                    "tool resolved"
                ),
                None => tracing::warn!(
                    tool = tool.name(),
                    "not found; merging and MP3 conversion will fail"
                ),
            }
        }
        tracing::info!(source = %yt_dlp.source, path = %yt_dlp.path.display(), "yt-dlp resolved");

        Ok(Self {
            yt_dlp,
            ffmpeg,
            ffprobe,
        })
    }
}

/// Result of checking one bundled tool.
#[derive(Debug, Clone)]
pub struct PreconditionReport {
    pub tool: Tool,
    pub required: bool,
    pub found: Option<ResolvedTool>,
    pub problem: Option<String>,
}

impl PreconditionReport {
    pub fn is_satisfied(&self) -> bool {
        self.found.is_some() || !self.required
    }
}

impl fmt::Display for PreconditionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.found, &self.problem) {
            (Some(found), _) => write!(
                f,
                "{:<8} {:<9} {}",
                self.tool.name(),
                found.source,
                found.path.display()
            ),
            (None, Some(problem)) => write!(f, "{:<8} ERROR     {problem}", self.tool.name()),
            (None, None) => write!(f, "{:<8} MISSING", self.tool.name()),
        }
    }
}

impl BundleManifest {
    /// Check that yt-dlp and every bundled binary can be found.
    pub fn check(&self, config: &AppConfig, cache_dir: &Path) -> Vec<PreconditionReport> {
        let mut tools = vec![(Tool::YtDlp, true)];
        tools.extend(self.binaries.iter().map(|b| (b.tool, false)));

        tools
            .into_iter()
            .map(|(tool, required)| {
                let override_path = match tool {
                    Tool::YtDlp => config.yt_dlp.as_deref(),
                    Tool::Ffmpeg => config.ffmpeg.as_deref(),
                    Tool::Ffprobe => config.ffprobe.as_deref(),
                };
                match locate(tool, override_path, cache_dir) {
                    Ok(found) => PreconditionReport {
                        tool,
                        required,
                        found,
                        problem: None,
                    },
                    Err(err) => PreconditionReport {
                        tool,
                        required,
                        found: None,
                        problem: Some(err.to_string()),
                    },
                }
            })
            .collect()
    }
}

/// Window icon decoded from the embedded `icon.png`.
pub fn window_icon() -> Option<IconData> {
    let file = Asset::get(MANIFEST.icon)?;
    let image = match image::load_from_memory(&file.data) {
        Ok(image) => image.to_rgba8(),
        Err(err) => {
            tracing::warn!(error = %err, "embedded icon is not a valid image");
            return None;
        }
    };
    let (width, height) = image.dimensions();
    Some(IconData {
        rgba: image.into_raw(),
        width,
        height,
    })
}

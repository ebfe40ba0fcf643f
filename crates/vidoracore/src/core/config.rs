//! Supervisor configuration.
//!
//! Everything the supervisor needs is carried in an explicit
//! [`SupervisorConfig`] value handed to it at construction: tool paths,
//! decoding fallbacks, the title truncation limit and the platform table.
//! `from_env()` fills in defaults from environment variables the same way
//! the desktop build is configured.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use encoding_rs::Encoding;

use crate::download::platform::{builtin_profiles, PlatformProfile};

/// Bounded wait for the `--version` availability probe (seconds).
pub const PROBE_TIMEOUT_SECS: u64 = 10;

/// Maximum length of a derived title, in characters.
pub const TITLE_MAX_LEN: usize = 50;

/// Lines of stderr kept for post-exit classification.
pub const STDERR_TAIL_LINES: usize = 200;

/// Configuration for a [`DownloadSupervisor`](crate::download::supervisor::DownloadSupervisor).
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Directory holding the bundled yt-dlp/ffmpeg binaries. Prefixed to
    /// the child's `PATH` so the tool finds its own helpers first.
    pub bin_dir: PathBuf,
    /// The downloader binary itself.
    pub tool_bin: PathBuf,
    /// Encoder binary, passed via `--ffmpeg-location`; never invoked
    /// directly.
    pub ffmpeg_bin: PathBuf,
    /// Bounded wait for the availability probe.
    pub probe_timeout: Duration,
    /// Maximum derived-title length in characters.
    pub title_max_len: usize,
    /// Regional encodings tried when output chunks are not valid UTF-8,
    /// in order. Lossy UTF-8 is always the last resort.
    pub encoding_fallbacks: Vec<&'static Encoding>,
    /// Platform table, in matching order.
    pub platforms: Vec<PlatformProfile>,
}

impl SupervisorConfig {
    /// Build a configuration from environment variables.
    ///
    /// * `VIDORA_BIN_DIR`: bundled binary directory (default: `bin`
    ///   next to the executable, falling back to `./bin`)
    /// * `VIDORA_YTDLP`: downloader binary (default: `<bin_dir>/yt-dlp`,
    ///   `yt-dlp.exe` on Windows)
    /// * `VIDORA_FFMPEG`: encoder binary (default: `<bin_dir>/ffmpeg`,
    ///   `ffmpeg.exe` on Windows)
    ///
    /// Values support tilde expansion.
    pub fn from_env() -> Self {
        let bin_dir = env::var("VIDORA_BIN_DIR")
            .map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned()))
            .unwrap_or_else(|_| default_bin_dir());

        let tool_bin = env::var("VIDORA_YTDLP")
            .map(|bin| PathBuf::from(shellexpand::tilde(&bin).into_owned()))
            .unwrap_or_else(|_| bin_dir.join(tool_bin_name()));

        let ffmpeg_bin = env::var("VIDORA_FFMPEG")
            .map(|bin| PathBuf::from(shellexpand::tilde(&bin).into_owned()))
            .unwrap_or_else(|_| bin_dir.join(ffmpeg_bin_name()));

        Self {
            bin_dir,
            tool_bin,
            ffmpeg_bin,
            probe_timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
            title_max_len: TITLE_MAX_LEN,
            encoding_fallbacks: vec![encoding_rs::EUC_KR, encoding_rs::GB18030],
            platforms: builtin_profiles(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// `bin/` next to the executable; `./bin` when that cannot be resolved.
fn default_bin_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("bin")))
        .unwrap_or_else(|| PathBuf::from("bin"))
}

fn tool_bin_name() -> &'static str {
    if cfg!(windows) {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

fn ffmpeg_bin_name() -> &'static str {
    if cfg!(windows) {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    }
}

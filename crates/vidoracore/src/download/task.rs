//! Download task model: requests coming in from the caller and the
//! per-task bookkeeping the supervisor keeps while a child process runs.

use std::path::PathBuf;

use crate::download::platform::{Browser, Platform};

/// Unique, monotonically increasing task identifier. Ids are never reused
/// for the lifetime of a supervisor.
pub type TaskId = u64;

/// Lifecycle of a download task.
///
/// `Pending → Running → (Merging)? → Completed | Failed | Cancelled`.
/// Terminal states are final; no task transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    /// yt-dlp is merging separate video and audio streams.
    Merging,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Cancelled)
    }
}

/// Audio extraction settings: convert the download to MP3 at the given
/// bitrate ("320" = 320 kbps, yt-dlp's `--audio-quality` convention).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioExtract {
    pub bitrate: String,
}

impl Default for AudioExtract {
    fn default() -> Self {
        Self {
            bitrate: "320".to_string(),
        }
    }
}

/// Format selection options for a download.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatOptions {
    /// Explicit yt-dlp format selector. `None` defers to the platform
    /// default or yt-dlp auto-selection.
    pub format: Option<String>,
    /// Extract audio to MP3 instead of keeping the video container.
    pub audio: Option<AudioExtract>,
    /// Download subtitles in all languages, converted to SRT.
    pub subtitles: bool,
}

/// A caller-submitted download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub format_options: FormatOptions,
    /// Cookie source for login-gated platforms. `None` falls back to the
    /// platform's default browser.
    pub browser: Option<Browser>,
}

/// Supervisor-side record of one submitted URL's download lifecycle.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub id: TaskId,
    /// URL exactly as submitted.
    pub url: String,
    /// Canonicalized URL actually handed to yt-dlp.
    pub normalized_url: String,
    pub platform: Platform,
    pub output_dir: PathBuf,
    pub format_options: FormatOptions,
    pub browser: Option<Browser>,
    pub state: TaskState,
    /// Derived human-readable title. Write-once: stays at the first
    /// accepted value for the rest of the task's life.
    pub title: Option<String>,
    pub title_locked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(!TaskState::Merging.is_terminal());
    }

    #[test]
    fn test_audio_extract_default_bitrate() {
        assert_eq!(AudioExtract::default().bitrate, "320");
    }
}

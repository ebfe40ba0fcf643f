//! Typed event stream the supervisor pushes to its caller.
//!
//! The presentation layer subscribes to the receiving end of an unbounded
//! channel and renders these however it likes; the core never talks to a
//! UI toolkit directly.

use std::fmt;

use crate::download::parser::ProgressInfo;
use crate::download::task::TaskId;

/// Coarse task status changes surfaced between progress updates.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// yt-dlp is merging separate video and audio streams.
    Merging,
    /// The target file already exists on disk; nothing was downloaded.
    AlreadyDownloaded,
    /// Download reached 100% (or was already downloaded and merged).
    Complete,
    /// The task was cancelled by a bulk cancel.
    Cancelled,
    /// Unparsed output line passed through verbatim.
    Line(String),
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusUpdate::Merging => write!(f, "Merging video and audio..."),
            StatusUpdate::AlreadyDownloaded => write!(f, "File already downloaded"),
            StatusUpdate::Complete => write!(f, "Download complete"),
            StatusUpdate::Cancelled => write!(f, "Cancelled"),
            StatusUpdate::Line(line) => write!(f, "{}", line),
        }
    }
}

/// Events emitted over the supervisor's event channel.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// A title was derived from the tool's output and locked for the task.
    TitleSet { task_id: TaskId, title: String },
    /// Structured progress parsed from the tool's output.
    Progress {
        task_id: TaskId,
        progress: ProgressInfo,
    },
    /// Coarse status change (merging, already downloaded, complete, ...).
    StatusChanged {
        task_id: TaskId,
        status: StatusUpdate,
    },
    /// Every raw output line, forwarded verbatim. Low-priority diagnostic
    /// stream, independent of the structured events above.
    RawLog { task_id: TaskId, line: String },
    /// Terminal event, emitted exactly once per task.
    Finished {
        task_id: TaskId,
        success: bool,
        /// Empty on success; classified user-facing message on failure.
        message: String,
        /// Locked title, or a URL-derived fallback when none was locked.
        title: String,
    },
}

impl DownloadEvent {
    /// The task this event belongs to.
    pub fn task_id(&self) -> TaskId {
        match self {
            DownloadEvent::TitleSet { task_id, .. }
            | DownloadEvent::Progress { task_id, .. }
            | DownloadEvent::StatusChanged { task_id, .. }
            | DownloadEvent::RawLog { task_id, .. }
            | DownloadEvent::Finished { task_id, .. } => *task_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_display() {
        assert_eq!(StatusUpdate::Merging.to_string(), "Merging video and audio...");
        assert_eq!(StatusUpdate::Complete.to_string(), "Download complete");
        assert_eq!(StatusUpdate::Line("raw".to_string()).to_string(), "raw");
    }

    #[test]
    fn test_event_task_id() {
        let event = DownloadEvent::RawLog {
            task_id: 7,
            line: "x".to_string(),
        };
        assert_eq!(event.task_id(), 7);
    }
}

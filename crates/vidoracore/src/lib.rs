//! Vidora core; concurrent download task supervisor built on yt-dlp.
//!
//! This library is the engine behind the Vidora desktop app: it accepts
//! media URLs, runs one yt-dlp child process per download, streams typed
//! progress/title/status events to the caller, and classifies failures
//! into user-facing messages. It knows nothing about windows or widgets;
//! the presentation layer subscribes to the event channel and renders
//! what it likes.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, process helpers
//! - `download`: platform registry, URL classification, command building,
//!   output parsing, outcome classification, and the supervisor itself
//!
//! # Example
//!
//! ```no_run
//! use vidoracore::{DownloadRequest, DownloadSupervisor, SupervisorConfig};
//! use vidoracore::download::task::FormatOptions;
//!
//! # async fn example() -> Result<(), vidoracore::SubmitError> {
//! let (supervisor, mut events) = DownloadSupervisor::new(SupervisorConfig::from_env());
//!
//! let task_id = supervisor
//!     .submit(DownloadRequest {
//!         url: "https://www.youtube.com/watch?v=abc123".to_string(),
//!         output_dir: "/tmp/downloads".into(),
//!         format_options: FormatOptions::default(),
//!         browser: None,
//!     })
//!     .await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//!     if event.task_id() == task_id {
//!         if let vidoracore::DownloadEvent::Finished { .. } = event {
//!             break;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod download;

// Re-export commonly used types for convenience
pub use crate::core::{config, SubmitError, SupervisorConfig};
pub use download::{
    Browser, DownloadEvent, DownloadRequest, DownloadSupervisor, Platform, StatusUpdate, TaskId,
    TaskState,
};

//! Download engine: platform registry, URL classification, command
//! construction, process supervision, output parsing, and outcome
//! classification.

pub mod classifier;
pub mod command;
pub mod cookies;
pub mod events;
pub mod outcome;
pub mod parser;
pub mod platform;
pub mod supervisor;
pub mod task;

pub use classifier::{classify, Classification};
pub use cookies::{CookieStore, FirefoxCookieStore};
pub use events::{DownloadEvent, StatusUpdate};
pub use outcome::{classify_exit, title_from_url, DownloadOutcome, FailureKind};
pub use parser::{OutputParser, ProgressInfo};
pub use platform::{Browser, Platform, PlatformProfile};
pub use supervisor::DownloadSupervisor;
pub use task::{AudioExtract, DownloadRequest, DownloadTask, FormatOptions, TaskId, TaskState};

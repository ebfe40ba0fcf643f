use thiserror::Error;

/// Typed rejection returned by `submit` before any process is spawned.
///
/// Mid-flight failures are never surfaced here; they arrive at process
/// exit through the `Finished` event, classified by
/// [`classify_exit`](crate::download::outcome::classify_exit).
#[derive(Error, Debug)]
pub enum SubmitError {
    /// The downloader binary is missing, not executable, or the version
    /// probe timed out.
    #[error("downloader binary not found or not executable")]
    ToolUnavailable,

    /// The platform needs browser cookies and the selected browser is not
    /// supported as a cookie source.
    #[error("{0} is not supported as a cookie source; use Firefox")]
    BrowserUnsupported(String),

    /// The platform needs browser cookies and no cookie store was found.
    #[error("no browser cookies found; sign in to the platform in Firefox first")]
    CookiesNotFound,

    /// Collection/profile URL on a platform without batch support.
    #[error("batch downloading a {0} profile is not supported; submit a single item URL")]
    CollectionUnsupported(String),

    /// The child process could not be spawned.
    #[error("failed to start downloader: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Type alias for submit results.
pub type SubmitResult<T> = Result<T, SubmitError>;

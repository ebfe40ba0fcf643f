//! Post-exit classification of a download's outcome.
//!
//! Maps the child's exit code and captured stderr onto a typed failure
//! kind with a platform-aware user-facing message, and derives a fallback
//! title from the URL when the output parser never locked one.

use url::Url;

use crate::download::classifier::is_collection_url;
use crate::download::platform::{Platform, PlatformProfile};

/// Typed failure categories for a finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    NoFormatsFound,
    ExtractionFailed,
    /// Collection/profile URL on a platform without batch support.
    CollectionUnsupported,
    Forbidden,
    NotFound,
    Network,
    Timeout,
    Generic(i32),
}

/// Final outcome of one download task.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    pub success: bool,
    pub kind: Option<FailureKind>,
    /// User-facing message; empty on success.
    pub message: String,
}

impl DownloadOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            kind: None,
            message: String::new(),
        }
    }

    fn failed(kind: FailureKind, message: String) -> Self {
        Self {
            success: false,
            kind: Some(kind),
            message,
        }
    }
}

/// Classify a finished child process.
///
/// Exit code 0 is a success regardless of stderr content. Otherwise the
/// stderr text is tested against an ordered set of substring rules; the
/// first match wins.
pub fn classify_exit(
    exit_code: i32,
    stderr: &str,
    profile: &PlatformProfile,
    url: &str,
) -> DownloadOutcome {
    if exit_code == 0 {
        return DownloadOutcome::ok();
    }

    let platform = profile.platform;
    let stderr_lower = stderr.to_lowercase();

    if stderr.contains("No video formats found") {
        return DownloadOutcome::failed(FailureKind::NoFormatsFound, no_formats_message(platform));
    }

    if stderr.contains("Unable to extract") || stderr.contains("Unsupported URL") {
        if !profile.supports_profile_batch && is_collection_url(url, platform) {
            return DownloadOutcome::failed(
                FailureKind::CollectionUnsupported,
                collection_message(platform),
            );
        }
        let message = if platform == Platform::Xiaohongshu {
            "Failed to extract Xiaohongshu content. Check the link format and your \
             connection, then try again later."
                .to_string()
        } else {
            "Content extraction failed. Check that the link is correct.".to_string()
        };
        return DownloadOutcome::failed(FailureKind::ExtractionFailed, message);
    }

    if stderr.contains("HTTP Error 403") || stderr.contains("Forbidden") {
        return DownloadOutcome::failed(
            FailureKind::Forbidden,
            format!(
                "{} refused the request. Wait a while and retry, switch networks, \
                 or check whether a login is required.",
                platform.display_name()
            ),
        );
    }

    if stderr.contains("HTTP Error 404") || stderr.contains("Not Found") {
        return DownloadOutcome::failed(
            FailureKind::NotFound,
            "The link does not exist or has been removed. Check the URL.".to_string(),
        );
    }

    if stderr_lower.contains("network") || stderr_lower.contains("connection") {
        return DownloadOutcome::failed(
            FailureKind::Network,
            "Network error. Check your connection and firewall settings, then retry.".to_string(),
        );
    }

    if stderr_lower.contains("timeout") {
        return DownloadOutcome::failed(
            FailureKind::Timeout,
            "The request timed out. The network or the remote server is slow; try again later."
                .to_string(),
        );
    }

    // No known pattern: condense the first ERROR: line if there is one.
    if let Some(line) = stderr.lines().find(|line| line.contains("ERROR:")) {
        let condensed = line.replace("ERROR:", "").trim().to_string();
        return DownloadOutcome::failed(
            FailureKind::Generic(exit_code),
            format!("Download failed: {}", condensed),
        );
    }

    DownloadOutcome::failed(
        FailureKind::Generic(exit_code),
        format!(
            "Download failed (exit code {}). Check the link or try again later.",
            exit_code
        ),
    )
}

fn no_formats_message(platform: Platform) -> String {
    match platform {
        Platform::Xiaohongshu => "Failed to resolve the Xiaohongshu link. The post may have been \
                                  deleted, require a login, or be region-locked. Check the link \
                                  or try another one."
            .to_string(),
        Platform::Bilibili => "Failed to resolve the Bilibili video. It may have been deleted or \
                               set private, require a premium account, or be region-locked."
            .to_string(),
        Platform::Douyin => "Failed to resolve the Douyin video. It may have been deleted, the \
                             account may be private, or the link may have expired."
            .to_string(),
        _ => "No downloadable formats found; the link may be dead or access restricted.".to_string(),
    }
}

fn collection_message(platform: Platform) -> String {
    format!(
        "Batch downloading a {} profile is not supported. Open the profile, copy the \
         link of a single post and download that instead.",
        platform.display_name()
    )
}

/// Derive a display title from the URL when the parser never locked one.
///
/// Never fails: any parse problem falls back to the URL itself.
pub fn title_from_url(url: &str, platform: Platform) -> String {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return url.to_string(),
    };

    let last_segment = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string);

    match platform {
        Platform::Youtube => {
            if let Some(id) = parsed.query_pairs().find(|(k, _)| k == "v").map(|(_, v)| v.to_string()) {
                return format!("YouTube_{}", id);
            }
            if parsed.host_str().is_some_and(|h| h.contains("youtu.be")) {
                if let Some(id) = last_segment {
                    return format!("YouTube_{}", id);
                }
            }
            parsed.host_str().unwrap_or(url).to_string()
        }
        Platform::Xiaohongshu => match last_segment {
            Some(segment) => {
                let short: String = segment.chars().take(10).collect();
                format!("Xiaohongshu_{}", short)
            }
            None => "Xiaohongshu".to_string(),
        },
        Platform::Bilibili | Platform::Douyin => match last_segment {
            Some(segment) => {
                let short: String = segment.chars().take(20).collect();
                format!("{}_{}", platform.display_name(), short)
            }
            None => platform.display_name().to_string(),
        },
        Platform::Generic => {
            let host = match parsed.host_str() {
                Some(host) => host,
                None => return url.to_string(),
            };
            let label = host.split('.').next().unwrap_or(host);
            match last_segment {
                Some(segment) => {
                    let short: String = segment.chars().take(20).collect();
                    format!("{}_{}", label, short)
                }
                None => host.to_string(),
            }
        }
    }
}

//! yt-dlp argument vector construction.
//!
//! Argument order is fixed; some yt-dlp flags are positionally sensitive,
//! and the URL must come last. Nothing here spawns a process; the
//! supervisor does that.

use std::path::Path;

use crate::core::config::SupervisorConfig;
use crate::download::platform::{Browser, Platform, PlatformProfile};
use crate::download::task::FormatOptions;

/// Format selectors that only make sense against YouTube's capability
/// model. On any other platform an explicit choice from this set is
/// discarded in favor of the platform default.
const YOUTUBE_ONLY_FORMATS: &[&str] = &["bv*+ba", "bv[ext=mp4]+ba[ext=m4a]", "bv*[height<=1080]+ba"];

/// Build the full argument vector for one download.
///
/// Order: baseline flags, platform special args, cookie source, format
/// selection, audio extraction, subtitles, output template, URL.
pub fn build_args(
    config: &SupervisorConfig,
    profile: &PlatformProfile,
    url: &str,
    output_dir: &Path,
    options: &FormatOptions,
    browser: Option<Browser>,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--progress".to_string(),
        "--no-overwrites".to_string(),
        "--ffmpeg-location".to_string(),
        config.ffmpeg_bin.display().to_string(),
        "--verbose".to_string(),
        // Titles may contain CJK and punctuation; keep them.
        "--no-restrict-filenames".to_string(),
        "--encoding".to_string(),
        "utf-8".to_string(),
    ];

    if !profile.special_args.is_empty() {
        args.extend(profile.special_args.iter().map(|s| (*s).to_string()));
        log::debug!(
            "Added {} special args for platform {}",
            profile.special_args.len(),
            profile.platform.as_str()
        );
    }

    if profile.requires_cookies {
        if let Some(browser) = browser {
            args.push("--cookies-from-browser".to_string());
            args.push(browser.id().to_string());
            log::debug!("Using cookies from {}", browser.id());
        }
    }

    push_format_args(&mut args, profile, options);

    if let Some(audio) = &options.audio {
        args.extend(
            [
                "-x",
                "--audio-format",
                "mp3",
                "--audio-quality",
                audio.bitrate.as_str(),
                "--postprocessor-args",
                "-codec:a libmp3lame",
            ]
            .map(String::from),
        );
    }

    if options.subtitles {
        args.extend(
            ["--write-subs", "--sub-langs", "all", "--convert-subs", "srt"].map(String::from),
        );
    }

    args.push("-o".to_string());
    args.push(output_dir.join("%(title)s.%(ext)s").display().to_string());

    args.push(url.to_string());
    args
}

/// Format selection with the YouTube-only downgrade rule.
fn push_format_args(args: &mut Vec<String>, profile: &PlatformProfile, options: &FormatOptions) {
    match options.format.as_deref() {
        Some(format)
            if profile.platform != Platform::Youtube && YOUTUBE_ONLY_FORMATS.contains(&format) =>
        {
            // Explicit choice does not apply here; downgrade, don't fail.
            if let Some(default) = profile.default_format {
                log::debug!(
                    "Platform {} does not support format {}, using platform default {}",
                    profile.platform.as_str(),
                    format,
                    default
                );
                args.push("-f".to_string());
                args.push(default.to_string());
            } else {
                log::debug!(
                    "Platform {} does not support format {}, letting yt-dlp auto-select",
                    profile.platform.as_str(),
                    format
                );
            }
        }
        Some(format) => {
            args.push("-f".to_string());
            args.push(format.to_string());
        }
        None => {
            if let Some(default) = profile.default_format {
                args.push("-f".to_string());
                args.push(default.to_string());
            }
            // Otherwise yt-dlp picks the best format itself.
        }
    }
}

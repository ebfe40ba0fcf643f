//! Static registry of supported video platforms.
//!
//! Each platform is described by an immutable [`PlatformProfile`]: domain
//! matchers, cookie requirements, yt-dlp quirks (user-agent spoofing,
//! preferred formats) and whether profile/collection URLs can be handed to
//! yt-dlp as a batch. Profiles are data, not behavior; the classifier and
//! command builder consume them.

/// Closed set of platforms with dedicated handling.
///
/// URLs on unrecognized hosts fall back to [`Platform::Generic`], which
/// downloads without cookies using yt-dlp's `best` format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Youtube,
    Xiaohongshu,
    Bilibili,
    Douyin,
    Generic,
}

impl Platform {
    /// Stable identifier used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Xiaohongshu => "xiaohongshu",
            Platform::Bilibili => "bilibili",
            Platform::Douyin => "douyin",
            Platform::Generic => "generic",
        }
    }

    /// Human-readable name for user-facing messages and fallback titles.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Youtube => "YouTube",
            Platform::Xiaohongshu => "Xiaohongshu",
            Platform::Bilibili => "Bilibili",
            Platform::Douyin => "Douyin",
            Platform::Generic => "Web",
        }
    }
}

/// Browsers the caller can select as a cookie source.
///
/// Only Firefox cookie extraction is actually wired up in this version;
/// the others are listed so the caller can present them and get a typed
/// rejection instead of a yt-dlp failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Firefox,
    Chrome,
    Opera,
    Brave,
}

impl Browser {
    /// Identifier passed to yt-dlp's `--cookies-from-browser`.
    pub fn id(&self) -> &'static str {
        match self {
            Browser::Firefox => "firefox",
            Browser::Chrome => "chrome",
            Browser::Opera => "opera",
            Browser::Brave => "brave",
        }
    }

    /// Display name for user-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Browser::Firefox => "Firefox",
            Browser::Chrome => "Chrome",
            Browser::Opera => "Opera",
            Browser::Brave => "Brave",
        }
    }

    /// Parse from a stored identifier.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "firefox" => Some(Browser::Firefox),
            "chrome" => Some(Browser::Chrome),
            "opera" => Some(Browser::Opera),
            "brave" => Some(Browser::Brave),
            _ => None,
        }
    }
}

/// Immutable per-platform configuration. Loaded once at startup, never
/// mutated.
#[derive(Debug, Clone)]
pub struct PlatformProfile {
    pub platform: Platform,
    /// Host fragments matched against the URL host (after stripping
    /// `www.` / `m.` prefixes). First registered match wins.
    pub domains: &'static [&'static str],
    /// Whether downloads need browser cookies (login-gated platform).
    pub requires_cookies: bool,
    /// Browser used when the caller does not pick one.
    pub default_browser: Option<Browser>,
    /// Extra yt-dlp arguments the platform needs (e.g. UA spoofing).
    pub special_args: &'static [&'static str],
    /// Format selector used when the caller's choice does not apply.
    /// `None` lets yt-dlp auto-select.
    pub default_format: Option<&'static str>,
    /// Whether an owner/profile URL may be handed to yt-dlp as a batch.
    pub supports_profile_batch: bool,
    /// Recognized single-item URL path shapes, most canonical first.
    pub url_patterns: &'static [&'static str],
}

const YOUTUBE: PlatformProfile = PlatformProfile {
    platform: Platform::Youtube,
    domains: &["youtube.com", "youtu.be", "m.youtube.com"],
    requires_cookies: true,
    default_browser: Some(Browser::Firefox),
    special_args: &[],
    // None: the caller's format choice is authoritative for YouTube.
    default_format: None,
    supports_profile_batch: true,
    url_patterns: &["/watch", "/shorts/"],
};

const XIAOHONGSHU: PlatformProfile = PlatformProfile {
    platform: Platform::Xiaohongshu,
    domains: &["xiaohongshu.com", "xhslink.com"],
    requires_cookies: false,
    default_browser: None,
    special_args: &[
        "--user-agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    ],
    default_format: Some("best[ext=mp4]/best"),
    // yt-dlp cannot enumerate a profile's posts on this platform.
    supports_profile_batch: false,
    url_patterns: &["/explore/", "/discovery/item/", "/user/profile/"],
};

const BILIBILI: PlatformProfile = PlatformProfile {
    platform: Platform::Bilibili,
    domains: &["bilibili.com", "b23.tv"],
    requires_cookies: false,
    default_browser: None,
    special_args: &[],
    default_format: Some("best[ext=mp4]/best"),
    supports_profile_batch: true,
    url_patterns: &["/video/"],
};

const DOUYIN: PlatformProfile = PlatformProfile {
    platform: Platform::Douyin,
    domains: &["douyin.com", "iesdouyin.com"],
    requires_cookies: false,
    default_browser: None,
    special_args: &[
        "--user-agent",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15",
    ],
    default_format: Some("best[ext=mp4]/best"),
    supports_profile_batch: true,
    url_patterns: &["/video/"],
};

/// Profile used for hosts no registered platform matches.
pub const GENERIC: PlatformProfile = PlatformProfile {
    platform: Platform::Generic,
    domains: &[],
    requires_cookies: false,
    default_browser: None,
    special_args: &[],
    default_format: Some("best"),
    supports_profile_batch: true,
    url_patterns: &[],
};

/// Built-in platform table, in matching order.
pub fn builtin_profiles() -> Vec<PlatformProfile> {
    vec![YOUTUBE, XIAOHONGSHU, BILIBILI, DOUYIN]
}

/// Look up the profile for a platform within a registered table.
/// Unknown platforms resolve to the generic profile.
pub fn profile_for(platform: Platform, profiles: &[PlatformProfile]) -> PlatformProfile {
    profiles
        .iter()
        .find(|p| p.platform == platform)
        .cloned()
        .unwrap_or(GENERIC)
}

//! URL classification: platform detection, canonicalization, and
//! collection-URL recognition.
//!
//! Classification never fails; anything unparseable is treated as a
//! generic single-item URL and handed to yt-dlp as-is.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::download::platform::{Platform, PlatformProfile};

/// Result of classifying a submitted URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub platform: Platform,
    /// Canonical form of the URL (platform-specific; often unchanged).
    pub normalized_url: String,
    /// True when the URL addresses an owner's whole feed rather than a
    /// single item.
    pub is_collection: bool,
}

/// Xiaohongshu owner-content shape: `/user/profile/{owner}/{content}`.
static XHS_OWNER_CONTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/user/profile/[a-fA-F0-9]+/([a-fA-F0-9]+)").expect("valid regex"));

/// Xiaohongshu owner-only shape: `/user/profile/{owner}` with no trailing
/// content id (optionally followed by a query string).
static XHS_OWNER_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/user/profile/[a-fA-F0-9]+/?(\?|$)").expect("valid regex"));

/// Classify a raw URL against the registered platform table.
pub fn classify(url: &str, profiles: &[PlatformProfile]) -> Classification {
    let platform = detect_platform(url, profiles);
    let normalized_url = normalize(url, platform);
    let is_collection = is_collection_url(&normalized_url, platform);

    Classification {
        platform,
        normalized_url,
        is_collection,
    }
}

/// Detect the platform a URL belongs to.
///
/// The host is lowercased and stripped of `www.` / `m.` prefixes, then
/// tested against each profile's domain fragments in registration order.
/// Unparseable URLs and unmatched hosts map to [`Platform::Generic`].
pub fn detect_platform(url: &str, profiles: &[PlatformProfile]) -> Platform {
    let parsed = match Url::parse(&url.to_lowercase()) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::debug!("URL parse failed, treating as generic: {} ({})", url, e);
            return Platform::Generic;
        }
    };

    let host = match parsed.host_str() {
        Some(host) => host,
        None => return Platform::Generic,
    };
    let host = host.strip_prefix("www.").unwrap_or(host);
    let host = host.strip_prefix("m.").unwrap_or(host);

    for profile in profiles {
        for domain in profile.domains {
            if host.contains(domain) {
                log::debug!("Detected platform {} for {}", profile.platform.as_str(), url);
                return profile.platform;
            }
        }
    }

    log::debug!("No platform matched for {}, using generic", url);
    Platform::Generic
}

/// Canonicalize platform-specific alternate URL shapes.
///
/// Xiaohongshu owner-content URLs (`/user/profile/{owner}/{content}`)
/// become the canonical `/explore/{content}` form, preserving the query
/// string. Every other shape passes through unchanged, which makes the
/// operation idempotent.
pub fn normalize(url: &str, platform: Platform) -> String {
    if platform != Platform::Xiaohongshu {
        return url.to_string();
    }

    let Some(caps) = XHS_OWNER_CONTENT.captures(url) else {
        return url.to_string();
    };
    let content_id = &caps[1];

    let mut parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return url.to_string(),
    };
    parsed.set_path(&format!("/explore/{}", content_id));

    let normalized = parsed.to_string();
    log::debug!("Normalized URL: {} -> {}", url, normalized);
    normalized
}

/// Detect owner/profile URLs that address a whole feed.
///
/// A URL carrying a trailing content id is never a collection, even when
/// it lives under an owner path.
pub fn is_collection_url(url: &str, platform: Platform) -> bool {
    let lower = url.to_lowercase();
    match platform {
        Platform::Xiaohongshu => XHS_OWNER_ONLY.is_match(url),
        Platform::Bilibili => lower.contains("space.bilibili.com") || lower.contains("/space/"),
        Platform::Douyin => lower.contains("/user/"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::platform::builtin_profiles;
    use pretty_assertions::assert_eq;

    fn classify_builtin(url: &str) -> Classification {
        classify(url, &builtin_profiles())
    }

    #[test]
    fn test_detect_youtube() {
        let profiles = builtin_profiles();
        assert_eq!(
            detect_platform("https://www.youtube.com/watch?v=abc123", &profiles),
            Platform::Youtube
        );
        assert_eq!(detect_platform("https://youtu.be/abc123", &profiles), Platform::Youtube);
        assert_eq!(
            detect_platform("https://m.youtube.com/watch?v=abc123", &profiles),
            Platform::Youtube
        );
    }

    #[test]
    fn test_detect_other_platforms() {
        let profiles = builtin_profiles();
        assert_eq!(
            detect_platform("https://www.xiaohongshu.com/explore/abcdef", &profiles),
            Platform::Xiaohongshu
        );
        assert_eq!(detect_platform("https://b23.tv/XyZ", &profiles), Platform::Bilibili);
        assert_eq!(
            detect_platform("https://www.douyin.com/video/7123", &profiles),
            Platform::Douyin
        );
    }

    #[test]
    fn test_detect_unknown_host_is_generic() {
        let profiles = builtin_profiles();
        assert_eq!(detect_platform("https://example.com/clip", &profiles), Platform::Generic);
    }

    #[test]
    fn test_detect_malformed_url_is_generic() {
        let profiles = builtin_profiles();
        assert_eq!(detect_platform("not a url at all", &profiles), Platform::Generic);
        assert_eq!(detect_platform("", &profiles), Platform::Generic);
    }

    #[test]
    fn test_normalize_owner_content_url() {
        let c = classify_builtin("https://www.xiaohongshu.com/user/profile/5af1a1b2/63cd9a01?xsec_token=t");
        assert_eq!(c.platform, Platform::Xiaohongshu);
        assert_eq!(
            c.normalized_url,
            "https://www.xiaohongshu.com/explore/63cd9a01?xsec_token=t"
        );
        assert!(!c.is_collection);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let urls = [
            "https://www.xiaohongshu.com/user/profile/5af1a1b2/63cd9a01",
            "https://www.xiaohongshu.com/explore/63cd9a01",
            "https://www.youtube.com/watch?v=abc123",
            "https://example.com/anything?x=1",
        ];
        for url in urls {
            let profiles = builtin_profiles();
            let platform = detect_platform(url, &profiles);
            let once = normalize(url, platform);
            let twice = normalize(&once, platform);
            assert_eq!(once, twice, "normalize not idempotent for {}", url);
        }
    }

    #[test]
    fn test_owner_only_url_is_collection() {
        let c = classify_builtin("https://www.xiaohongshu.com/user/profile/5af1a1b2");
        assert!(c.is_collection);

        let c = classify_builtin("https://www.xiaohongshu.com/user/profile/5af1a1b2?source=feed");
        assert!(c.is_collection);
    }

    #[test]
    fn test_owner_content_url_is_not_collection() {
        let c = classify_builtin("https://www.xiaohongshu.com/user/profile/5af1a1b2/63cd9a01");
        assert!(!c.is_collection);
    }

    #[test]
    fn test_bilibili_and_douyin_collections() {
        let c = classify_builtin("https://space.bilibili.com/12345");
        assert_eq!(c.platform, Platform::Bilibili);
        assert!(c.is_collection);

        let c = classify_builtin("https://www.douyin.com/user/MS4wLjAB");
        assert_eq!(c.platform, Platform::Douyin);
        assert!(c.is_collection);

        let c = classify_builtin("https://www.douyin.com/video/7123456789");
        assert!(!c.is_collection);
    }
}

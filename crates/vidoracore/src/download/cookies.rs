//! Browser cookie availability checks.
//!
//! Login-gated platforms need yt-dlp to read the user's browser cookies.
//! The supervisor only consumes "is a cookie source available" as a
//! boolean precondition; it never reads cookie contents itself, yt-dlp
//! does. The check is behind a trait so a GUI (or a test) can plug in its
//! own notion of availability.

use std::path::{Path, PathBuf};

use crate::download::platform::Browser;

/// Read-only view of the user's browser cookie stores.
pub trait CookieStore: Send + Sync {
    /// Whether the given browser has a usable cookie store on this
    /// machine.
    fn is_available(&self, browser: Browser) -> bool;
}

/// Default store: locates a Firefox profile containing `cookies.sqlite`.
///
/// Only Firefox is supported as a cookie source in this version; every
/// other browser reports unavailable.
#[derive(Debug, Default)]
pub struct FirefoxCookieStore;

impl FirefoxCookieStore {
    /// Search standard profile locations, then portable layouts near the
    /// working directory.
    pub fn find_cookie_db(&self) -> Option<PathBuf> {
        for root in profile_roots() {
            if let Some(found) = scan_profiles(&root) {
                log::debug!("Found Firefox cookies: {}", found.display());
                return Some(found);
            }
        }

        if let Some(found) = scan_portable_layouts() {
            log::debug!("Found portable Firefox cookies: {}", found.display());
            return Some(found);
        }

        log::warn!(
            "No Firefox cookies found. Firefox may not be installed, never run, \
             or not signed in to the platform."
        );
        None
    }
}

impl CookieStore for FirefoxCookieStore {
    fn is_available(&self, browser: Browser) -> bool {
        browser == Browser::Firefox && self.find_cookie_db().is_some()
    }
}

/// Platform-standard Firefox profile directories.
fn profile_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    #[cfg(windows)]
    if let Some(appdata) = std::env::var_os("APPDATA") {
        roots.push(PathBuf::from(appdata).join("Mozilla").join("Firefox").join("Profiles"));
    }

    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        #[cfg(target_os = "macos")]
        roots.push(home.join("Library").join("Application Support").join("Firefox").join("Profiles"));
        #[cfg(not(target_os = "macos"))]
        roots.push(home.join(".mozilla").join("firefox"));
    }

    roots
}

/// Find `cookies.sqlite` inside any profile directory under `root`,
/// preferring the default-release profile.
fn scan_profiles(root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;
    let mut candidates: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.contains(".default"))
        })
        .collect();

    // `xyz.default-release` sorts after `xyz.default`; prefer it.
    candidates.sort();
    candidates.reverse();

    candidates
        .into_iter()
        .map(|profile| profile.join("cookies.sqlite"))
        .find(|cookies| cookies.exists())
}

/// Portable Firefox keeps its profile next to the executable; walk a few
/// directories up from the working directory looking for known layouts.
fn scan_portable_layouts() -> Option<PathBuf> {
    const LAYOUTS: &[&[&str]] = &[
        &["Data", "profile"],
        &["Data", "Browser", "profile"],
        &["FirefoxPortable", "Data", "profile"],
    ];

    let mut current = std::env::current_dir().ok()?;
    for _ in 0..5 {
        for layout in LAYOUTS {
            let mut candidate = current.clone();
            for part in *layout {
                candidate.push(part);
            }
            candidate.push("cookies.sqlite");
            if candidate.exists() {
                return Some(candidate);
            }
        }
        if !current.pop() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticCookieStore(bool);

    impl CookieStore for StaticCookieStore {
        fn is_available(&self, browser: Browser) -> bool {
            browser == Browser::Firefox && self.0
        }
    }

    #[test]
    fn test_non_firefox_browsers_unavailable() {
        let store = FirefoxCookieStore;
        assert!(!store.is_available(Browser::Chrome));
        assert!(!store.is_available(Browser::Opera));
        assert!(!store.is_available(Browser::Brave));
    }

    #[test]
    fn test_scan_profiles_finds_default_release() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("abcd1234.default-release");
        std::fs::create_dir_all(&profile).unwrap();
        std::fs::write(profile.join("cookies.sqlite"), b"").unwrap();

        let found = scan_profiles(dir.path()).unwrap();
        assert_eq!(found, profile.join("cookies.sqlite"));
    }

    #[test]
    fn test_scan_profiles_ignores_profiles_without_cookies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("abcd1234.default")).unwrap();
        assert!(scan_profiles(dir.path()).is_none());
    }

    #[test]
    fn test_static_store() {
        let store = StaticCookieStore(true);
        assert!(store.is_available(Browser::Firefox));
        assert!(!store.is_available(Browser::Chrome));
        assert!(!StaticCookieStore(false).is_available(Browser::Firefox));
    }
}

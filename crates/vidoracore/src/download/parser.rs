//! Incremental parsing of yt-dlp's combined stdout/stderr stream.
//!
//! The parser is a per-task state machine fed arbitrarily-sized text
//! chunks. It derives a write-once title from `Destination:` lines, turns
//! `[download]` progress lines into structured [`ProgressInfo`] values,
//! and maps the merge/already-downloaded markers to fixed status events.
//! Anything it cannot make sense of degrades to a raw-line status rather
//! than being dropped; the external tool's phrasing is an unversioned,
//! best-effort contract.

use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::download::events::StatusUpdate;

/// Structured progress data parsed from a yt-dlp output line.
///
/// Example line: `[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10`
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInfo {
    pub percent: u8,
    pub speed_mbs: Option<f64>,
    pub eta_seconds: Option<u64>,
    pub current_size: Option<u64>,
    pub total_size: Option<u64>,
}

/// One classified output line: the verbatim text plus the structured
/// event derived from it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub raw: String,
    pub event: Option<LineEvent>,
}

/// Structured interpretation of a single output line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    /// A valid title was extracted and locked.
    Title(String),
    Progress(ProgressInfo),
    Status(StatusUpdate),
}

/// Progress annotations that can trail the filename on a Destination
/// line, in the order they are cut.
const PROGRESS_SEPARATORS: &[&str] = &[" [download]", " ETA ", " at ", " of "];

/// Subtitle files announce their own Destination lines; those must not
/// become the task title.
const SUBTITLE_EXTENSIONS: &[&str] = &[".vtt", ".srt", ".ass", ".lrc", ".sbv", ".sub", ".txt"];

/// Embedded percentage noise, e.g. " 0.0% of 36...".
static PERCENT_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\d+\.\d+%\s*.*$").expect("valid regex"));

/// Temporary format-id extension yt-dlp inserts before the real one,
/// e.g. `clip.f397.mp4`.
static FORMAT_ID_EXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.f\d+").expect("valid regex"));

/// Per-task streaming parser state.
#[derive(Debug)]
pub struct OutputParser {
    title: Option<String>,
    title_locked: bool,
    title_max_len: usize,
}

impl OutputParser {
    pub fn new(title_max_len: usize) -> Self {
        Self {
            title: None,
            title_locked: false,
            title_max_len,
        }
    }

    /// The locked title, if one has been accepted.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn title_locked(&self) -> bool {
        self.title_locked
    }

    /// Feed one decoded text chunk; returns a classification for every
    /// line in it. Chunks are split on both `\n` and `\r`; yt-dlp
    /// rewrites progress lines with bare carriage returns.
    pub fn feed(&mut self, text: &str) -> Vec<ParsedLine> {
        text.split(['\n', '\r'])
            .filter(|line| !line.trim().is_empty())
            .map(|line| ParsedLine {
                raw: line.to_string(),
                event: self.classify_line(line),
            })
            .collect()
    }

    fn classify_line(&mut self, line: &str) -> Option<LineEvent> {
        if line.contains("Destination:") {
            if self.title_locked {
                // Later Destination lines (audio stream, subtitles) must
                // not overwrite the accepted title.
                return None;
            }
            if let Some(title) = extract_title(line, self.title_max_len) {
                self.title = Some(title.clone());
                self.title_locked = true;
                return Some(LineEvent::Title(title));
            }
            return None;
        }

        if line.contains("[download]") && line.contains('%') && line.contains(" of ") && line.contains(" at ") {
            return match parse_progress(line) {
                Some(info) if info.percent >= 100 => Some(LineEvent::Status(StatusUpdate::Complete)),
                Some(info) => Some(LineEvent::Progress(info)),
                // Unexpected phrasing: pass the line through instead of
                // dropping it.
                None => Some(LineEvent::Status(StatusUpdate::Line(line.trim().to_string()))),
            };
        }

        // The duplicate-completion marker is a superset of the
        // already-downloaded one, so it is checked first.
        if line.contains("has already been downloaded and merged") {
            return Some(LineEvent::Status(StatusUpdate::Complete));
        }
        if line.contains("has already been downloaded") {
            return Some(LineEvent::Status(StatusUpdate::AlreadyDownloaded));
        }
        if line.contains("Merging formats into") {
            return Some(LineEvent::Status(StatusUpdate::Merging));
        }

        None
    }
}

/// Decode a raw output chunk.
///
/// Strict UTF-8 first, then each configured regional encoding, then lossy
/// UTF-8. Each chunk is decoded independently; a multi-byte character
/// split across two reads degrades to replacement characters for that
/// chunk only.
pub fn decode_chunk(bytes: &[u8], fallbacks: &[&'static Encoding]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }
    for encoding in fallbacks {
        let (text, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return text.into_owned();
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// Extract and validate a title candidate from a Destination line.
///
/// Returns `None` for subtitle files and candidates too short or too
/// noisy to be a real title.
fn extract_title(line: &str, max_len: usize) -> Option<String> {
    let index = line.find("Destination:")?;
    let mut part = line[index + "Destination:".len()..].trim().to_string();

    for separator in PROGRESS_SEPARATORS {
        if let Some(pos) = part.find(separator) {
            part.truncate(pos);
        }
    }

    part = PERCENT_NOISE.replace(&part, "").into_owned();
    part = FORMAT_ID_EXT.replace_all(&part, "").into_owned();

    let lower = part.to_lowercase();
    if SUBTITLE_EXTENSIONS.iter().any(|ext| lower.contains(ext)) {
        log::debug!("Skipping subtitle destination: {}", part);
        return None;
    }

    // Basename without the extension is the candidate title.
    let file_name = part.rsplit(['/', '\\']).next().unwrap_or(&part);
    let title = match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    };
    let title = title.trim();

    if !is_valid_title(title) {
        log::debug!("Rejected title candidate: '{}'", title);
        return None;
    }

    Some(truncate_title(title, max_len))
}

/// Reject empty, single-character, and short pure-numeric/punctuation
/// candidates; those come from progress noise, not real filenames.
fn is_valid_title(title: &str) -> bool {
    let char_count = title.chars().count();
    if char_count <= 1 {
        return false;
    }
    if char_count <= 3 {
        let stripped: String = title.chars().filter(|c| !matches!(c, '.' | '_' | '-')).collect();
        if stripped.is_empty() || stripped.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
    }
    true
}

/// Truncate long titles to exactly `max_len` characters, keeping a head
/// fragment and a tail fragment around an ellipsis.
fn truncate_title(title: &str, max_len: usize) -> String {
    let chars: Vec<char> = title.chars().collect();
    if chars.len() <= max_len || max_len < 8 {
        return title.to_string();
    }
    let head = max_len / 2 - 2;
    let tail = max_len - head - 3;
    let mut result: String = chars[..head].iter().collect();
    result.push_str("...");
    result.extend(&chars[chars.len() - tail..]);
    result
}

/// Parse a `[download]` progress line into structured fields.
///
/// Token layout: `[download]  23.4% of 50.75MiB at 2.52MiB/s ETA 00:15`.
/// The percent is required; size, speed and ETA are extracted
/// positionally after their `of` / `at` / `ETA` markers when present.
pub fn parse_progress(line: &str) -> Option<ProgressInfo> {
    if !line.contains("[download]") || !line.contains('%') {
        return None;
    }

    let mut percent = None;
    let mut speed_mbs = None;
    let mut eta_seconds = None;
    let mut total_size = None;

    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if let Some(value) = part.strip_suffix('%') {
            if let Ok(p) = value.parse::<f32>() {
                // Clamp so garbage input can't jump the bar to 100%.
                percent = Some(p.clamp(0.0, 100.0) as u8);
            }
        }

        if *part == "of" && i + 1 < parts.len() {
            if let Some(size) = parse_size(parts[i + 1]) {
                total_size = Some(size);
            }
        }

        if *part == "at" && i + 1 < parts.len() {
            if let Some(speed) = parse_size(parts[i + 1]) {
                speed_mbs = Some(speed as f64 / (1024.0 * 1024.0));
            }
        }

        if *part == "ETA" && i + 1 < parts.len() {
            if let Some(eta) = parse_eta(parts[i + 1]) {
                eta_seconds = Some(eta);
            }
        }
    }

    let percent = percent?;
    let current_size = total_size.map(|total| (total as f64 * (percent as f64 / 100.0)) as u64);

    Some(ProgressInfo {
        percent,
        speed_mbs,
        eta_seconds,
        current_size,
        total_size,
    })
}

/// Parse sizes like "10.00MiB", "500.00KiB" or "2.52MiB/s" into bytes.
fn parse_size(size_str: &str) -> Option<u64> {
    let size_str = size_str.trim_end_matches("/s");
    if let Some(mb) = size_str.strip_suffix("MiB") {
        return mb.parse::<f64>().ok().map(|v| (v * 1024.0 * 1024.0) as u64);
    }
    if let Some(kb) = size_str.strip_suffix("KiB") {
        return kb.parse::<f64>().ok().map(|v| (v * 1024.0) as u64);
    }
    if let Some(gb) = size_str.strip_suffix("GiB") {
        return gb.parse::<f64>().ok().map(|v| (v * 1024.0 * 1024.0 * 1024.0) as u64);
    }
    None
}

/// Parse ETA strings like "00:10" or "1:23" into seconds.
fn parse_eta(eta_str: &str) -> Option<u64> {
    let parts: Vec<&str> = eta_str.split(':').collect();
    if parts.len() == 2 {
        if let (Ok(minutes), Ok(seconds)) = (parts[0].parse::<u64>(), parts[1].parse::<u64>()) {
            return Some(minutes * 60 + seconds);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TITLE_LIMIT: usize = 50;

    #[test]
    fn test_title_from_destination_line() {
        let mut parser = OutputParser::new(TITLE_LIMIT);
        let events = parser.feed("[download] Destination: My Clip.mp4\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, Some(LineEvent::Title("My Clip".to_string())));
        assert_eq!(parser.title(), Some("My Clip"));
    }

    #[test]
    fn test_title_strips_progress_annotations_and_format_id() {
        let mut parser = OutputParser::new(TITLE_LIMIT);
        let events = parser.feed("[download] Destination: My Clip.f397.mp4 [download]   0.0% of 36\n");
        assert_eq!(events[0].event, Some(LineEvent::Title("My Clip".to_string())));
    }

    #[test]
    fn test_title_locked_is_never_overwritten() {
        let mut parser = OutputParser::new(TITLE_LIMIT);
        parser.feed("[download] Destination: First Title.mp4\n");
        let events = parser.feed("[download] Destination: Second Title.m4a\n");
        assert_eq!(events[0].event, None);
        assert_eq!(parser.title(), Some("First Title"));
    }

    #[test]
    fn test_subtitle_destination_does_not_lock_title() {
        let mut parser = OutputParser::new(TITLE_LIMIT);
        parser.feed("[download] Destination: My Clip.en.srt\n");
        assert_eq!(parser.title(), None);
        assert!(!parser.title_locked());

        // The real video file still wins afterwards.
        parser.feed("[download] Destination: My Clip.mp4\n");
        assert_eq!(parser.title(), Some("My Clip"));
    }

    #[test]
    fn test_short_noise_titles_rejected() {
        for line in [
            "[download] Destination: s.mp4",
            "[download] Destination: 123.mp4",
            "[download] Destination: 1.2.mp4",
            "[download] Destination: ---.mp4",
        ] {
            let mut parser = OutputParser::new(TITLE_LIMIT);
            parser.feed(line);
            assert_eq!(parser.title(), None, "accepted bogus title from {}", line);
        }

        // Short but plausible titles survive.
        let mut parser = OutputParser::new(TITLE_LIMIT);
        parser.feed("[download] Destination: abc.mp4");
        assert_eq!(parser.title(), Some("abc"));
    }

    #[test]
    fn test_long_title_truncated_to_exact_length() {
        let long = "A".repeat(80);
        let mut parser = OutputParser::new(TITLE_LIMIT);
        parser.feed(&format!("[download] Destination: {}.mp4\n", long));
        let title = parser.title().unwrap().to_string();
        assert_eq!(title.chars().count(), TITLE_LIMIT);
        assert!(title.contains("..."));
        assert!(title.starts_with('A'));
        assert!(title.ends_with('A'));
    }

    #[test]
    fn test_truncation_counts_chars_not_bytes() {
        let long = "字".repeat(60);
        let truncated = truncate_title(&long, TITLE_LIMIT);
        assert_eq!(truncated.chars().count(), TITLE_LIMIT);
    }

    #[test]
    fn test_progress_line_parsed() {
        let mut parser = OutputParser::new(TITLE_LIMIT);
        let events = parser.feed("[download]  23.4% of 50.75MiB at 2.52MiB/s ETA 00:15\n");
        match &events[0].event {
            Some(LineEvent::Progress(info)) => {
                assert_eq!(info.percent, 23);
                assert_eq!(info.total_size, Some((50.75 * 1024.0 * 1024.0) as u64));
                assert_eq!(info.eta_seconds, Some(15));
                assert!((info.speed_mbs.unwrap() - 2.52).abs() < 0.01);
            }
            other => panic!("expected progress event, got {:?}", other),
        }
    }

    #[test]
    fn test_progress_at_100_percent_becomes_complete() {
        let mut parser = OutputParser::new(TITLE_LIMIT);
        let events = parser.feed("[download] 100% of 50.75MiB at 2.52MiB/s ETA 00:00\n");
        assert_eq!(events[0].event, Some(LineEvent::Status(StatusUpdate::Complete)));
    }

    #[test]
    fn test_unparseable_progress_degrades_to_raw_line() {
        let mut parser = OutputParser::new(TITLE_LIMIT);
        let events = parser.feed("[download] ???% of weird at stuff\n");
        assert_eq!(
            events[0].event,
            Some(LineEvent::Status(StatusUpdate::Line(
                "[download] ???% of weird at stuff".to_string()
            )))
        );
    }

    #[test]
    fn test_marker_lines() {
        let mut parser = OutputParser::new(TITLE_LIMIT);
        let events = parser.feed("[Merger] Merging formats into \"My Clip.mp4\"\n");
        assert_eq!(events[0].event, Some(LineEvent::Status(StatusUpdate::Merging)));

        let events = parser.feed("[download] My Clip.mp4 has already been downloaded\n");
        assert_eq!(
            events[0].event,
            Some(LineEvent::Status(StatusUpdate::AlreadyDownloaded))
        );

        let events = parser.feed("[download] My Clip.mp4 has already been downloaded and merged\n");
        assert_eq!(events[0].event, Some(LineEvent::Status(StatusUpdate::Complete)));
    }

    #[test]
    fn test_feed_splits_on_carriage_returns() {
        let mut parser = OutputParser::new(TITLE_LIMIT);
        let events = parser.feed(
            "[download]  10.0% of 10.00MiB at 1.00MiB/s ETA 00:09\r[download]  20.0% of 10.00MiB at 1.00MiB/s ETA 00:08",
        );
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_unclassified_lines_are_raw_only() {
        let mut parser = OutputParser::new(TITLE_LIMIT);
        let events = parser.feed("[youtube] abc123: Downloading webpage\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, None);
        assert_eq!(events[0].raw, "[youtube] abc123: Downloading webpage");
    }

    #[test]
    fn test_decode_chunk_utf8() {
        let fallbacks: Vec<&'static encoding_rs::Encoding> = vec![encoding_rs::EUC_KR, encoding_rs::GB18030];
        assert_eq!(decode_chunk("하늘".as_bytes(), &fallbacks), "하늘");
    }

    #[test]
    fn test_decode_chunk_falls_back_to_regional_encoding() {
        let fallbacks: Vec<&'static encoding_rs::Encoding> = vec![encoding_rs::EUC_KR, encoding_rs::GB18030];
        let (encoded, _, _) = encoding_rs::EUC_KR.encode("하늘");
        let decoded = decode_chunk(&encoded, &fallbacks);
        assert_eq!(decoded, "하늘");
    }

    #[test]
    fn test_decode_chunk_lossy_last_resort() {
        let fallbacks: Vec<&'static encoding_rs::Encoding> = vec![];
        let decoded = decode_chunk(&[0xff, 0xfe, 0x41], &fallbacks);
        assert!(decoded.contains('A'));
        assert!(decoded.contains('\u{fffd}'));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("10.00MiB"), Some(10 * 1024 * 1024));
        assert_eq!(parse_size("500.00KiB"), Some(512_000));
        assert_eq!(parse_size("1.00GiB"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_size("2.52MiB/s"), Some((2.52 * 1024.0 * 1024.0) as u64));
        assert_eq!(parse_size("garbage"), None);
    }

    #[test]
    fn test_parse_eta() {
        assert_eq!(parse_eta("00:10"), Some(10));
        assert_eq!(parse_eta("1:23"), Some(83));
        assert_eq!(parse_eta("soon"), None);
    }

    #[test]
    fn test_percent_clamped() {
        let info = parse_progress("[download] 250.0% of 10.00MiB at 1.00MiB/s ETA 00:01");
        // Clamped values read as complete rather than as garbage.
        assert_eq!(info.unwrap().percent, 100);
    }
}

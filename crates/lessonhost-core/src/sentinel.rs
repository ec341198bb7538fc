//! Sentinel lines: how the worker announces its result on stdout, and the
//! control-plane watcher that recognises them.
//!
//! ```text
//! CONSOLE_RESULT_FILE: /tmp/lesson-result-0b5e....json   (normal form)
//! CONSOLE_RESULT: {"success":true,...}                   (inline fallback)
//! ```

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

/// Prefix of the line naming the result artifact file.
pub const FILE_SENTINEL_PREFIX: &str = "CONSOLE_RESULT_FILE";

/// Prefix of the fallback line carrying the artifact inline.
pub const INLINE_SENTINEL_PREFIX: &str = "CONSOLE_RESULT";

/// Longest inline sentinel line the worker will emit, in bytes. Larger
/// artifacts are not sent inline at all rather than risk truncation.
pub const MAX_INLINE_SENTINEL_BYTES: usize = 4096;

static FILE_SENTINEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^CONSOLE_RESULT_FILE:[ \t]*(?P<path>\S.*?)[ \t]*\r?$")
        .expect("file sentinel pattern is valid")
});

static INLINE_SENTINEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^CONSOLE_RESULT:[ \t]*(?P<json>\S.*?)[ \t]*\r?$")
        .expect("inline sentinel pattern is valid")
});

/// Format the sentinel announcing `path`.
pub fn file_sentinel(path: &std::path::Path) -> String {
    format!("{FILE_SENTINEL_PREFIX}: {}", path.display())
}

/// Format the inline fallback sentinel carrying `json`.
pub fn inline_sentinel(json: &str) -> String {
    format!("{INLINE_SENTINEL_PREFIX}: {json}")
}

/// What a sentinel line announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentinelMatch {
    /// The artifact was written to this file.
    File(PathBuf),
    /// The artifact JSON was carried on the line itself.
    Inline(String),
}

/// Match a single line of worker output against the sentinel patterns.
///
/// The prefix is case-sensitive and must start the line.
pub fn match_line(line: &str) -> Option<SentinelMatch> {
    if let Some(caps) = FILE_SENTINEL.captures(line) {
        return Some(SentinelMatch::File(PathBuf::from(&caps["path"])));
    }
    INLINE_SENTINEL
        .captures(line)
        .map(|caps| SentinelMatch::Inline(caps["json"].to_string()))
}

/// Watches one invocation's output and reports the first sentinel only.
#[derive(Debug, Default)]
pub struct OutputWatcher {
    matched: bool,
    lines_seen: u64,
}

impl OutputWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next output line. Returns the sentinel the first time one
    /// is seen; every later line, matching or not, yields `None`.
    pub fn observe(&mut self, line: &str) -> Option<SentinelMatch> {
        self.lines_seen += 1;
        let found = match_line(line)?;
        if self.matched {
            tracing::debug!(line = self.lines_seen, "ignoring repeated result sentinel");
            return None;
        }
        self.matched = true;
        Some(found)
    }

    /// Whether a sentinel has already been reported.
    pub fn has_matched(&self) -> bool {
        self.matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_file_sentinel_and_extracts_path() {
        assert_eq!(
            match_line("CONSOLE_RESULT_FILE: /tmp/abc.json"),
            Some(SentinelMatch::File(PathBuf::from("/tmp/abc.json")))
        );
    }

    #[test]
    fn tolerates_missing_space_and_trailing_carriage_return() {
        assert_eq!(
            match_line("CONSOLE_RESULT_FILE:/tmp/abc.json\r"),
            Some(SentinelMatch::File(PathBuf::from("/tmp/abc.json")))
        );
    }

    #[test]
    fn keeps_spaces_inside_path() {
        assert_eq!(
            match_line(r"CONSOLE_RESULT_FILE: C:\Users\Jane Doe\AppData\Local\Temp\r.json"),
            Some(SentinelMatch::File(PathBuf::from(
                r"C:\Users\Jane Doe\AppData\Local\Temp\r.json"
            )))
        );
    }

    #[test]
    fn rejects_lines_without_prefix() {
        assert_eq!(match_line("/tmp/abc.json"), None);
        assert_eq!(match_line("RESULT_FILE: /tmp/abc.json"), None);
        assert_eq!(match_line("info: CONSOLE_RESULT_FILE: /tmp/abc.json"), None);
    }

    #[test]
    fn rejects_leading_whitespace() {
        assert_eq!(match_line("  CONSOLE_RESULT_FILE: /tmp/abc.json"), None);
        assert_eq!(match_line("\tCONSOLE_RESULT_FILE: /tmp/abc.json"), None);
    }

    #[test]
    fn prefix_is_case_sensitive() {
        assert_eq!(match_line("console_result_file: /tmp/abc.json"), None);
    }

    #[test]
    fn empty_path_does_not_match() {
        assert_eq!(match_line("CONSOLE_RESULT_FILE:   "), None);
    }

    #[test]
    fn matches_inline_sentinel() {
        assert_eq!(
            match_line(r#"CONSOLE_RESULT: {"success":true}"#),
            Some(SentinelMatch::Inline(r#"{"success":true}"#.to_string()))
        );
    }

    #[test]
    fn formatting_helpers_roundtrip_through_matcher() {
        let path = PathBuf::from("/var/tmp/lesson-result-1.json");
        assert_eq!(
            match_line(&file_sentinel(&path)),
            Some(SentinelMatch::File(path))
        );
        assert_eq!(
            match_line(&inline_sentinel("{}")),
            Some(SentinelMatch::Inline("{}".to_string()))
        );
    }

    #[test]
    fn watcher_reports_only_first_match() {
        let mut watcher = OutputWatcher::new();
        assert_eq!(watcher.observe("starting lesson"), None);
        assert!(!watcher.has_matched());
        assert_eq!(
            watcher.observe("CONSOLE_RESULT_FILE: /tmp/first.json"),
            Some(SentinelMatch::File(PathBuf::from("/tmp/first.json")))
        );
        assert!(watcher.has_matched());
        assert_eq!(watcher.observe("CONSOLE_RESULT_FILE: /tmp/second.json"), None);
        assert_eq!(watcher.observe("trailing output"), None);
    }
}

//! Filename, markup, and timestamp helpers shared by the capture pipeline

use chrono::NaiveDateTime;
use filetime::FileTime;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::CaptureFormat;

/// Format used by task publish times.
pub const PUBLISH_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Maximum length of a sanitized artifact filename, in characters.
pub const MAX_FILENAME_LEN: usize = 50;

/// Derive a filesystem-safe base filename from a task title: drop carriage
/// returns, newlines, and tabs, replace characters illegal on common
/// filesystems with `_`, truncate to [`MAX_FILENAME_LEN`], and trim surrounding
/// whitespace.
///
/// Two titles that sanitize to the same string collide; last write wins.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(*c, '\r' | '\n' | '\t'))
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .take(MAX_FILENAME_LEN)
        .collect();
    cleaned.trim().to_string()
}

/// Append a format extension to a base path without touching dots already in
/// the sanitized title.
pub fn artifact_path(base: &Path, format: CaptureFormat) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(format.extension());
    PathBuf::from(name)
}

/// Both the PDF and MHTML artifacts present is the completion marker for the
/// idempotent skip.
pub fn artifacts_complete(base: &Path) -> bool {
    artifact_path(base, CaptureFormat::Pdf).exists()
        && artifact_path(base, CaptureFormat::Mhtml).exists()
}

pub fn parse_publish_time(value: &str) -> Result<FileTime, chrono::ParseError> {
    let naive = NaiveDateTime::parse_from_str(value, PUBLISH_TIME_FORMAT)?;
    Ok(FileTime::from_unix_time(naive.and_utc().timestamp(), 0))
}

/// Stamp an artifact with its publish time. Failure is logged, never fatal.
pub fn apply_publish_time(path: &Path, publish_time: &str) {
    let times = match parse_publish_time(publish_time) {
        Ok(times) => times,
        Err(e) => {
            warn!("Unparseable publish time {:?}: {}", publish_time, e);
            return;
        }
    };
    if let Err(e) = filetime::set_file_times(path, times, times) {
        warn!("Failed to set file times on {}: {}", path.display(), e);
    }
}

/// Textual rewrites applied to the rendered-markup export so the saved file
/// stays usable offline: protocol-relative references become absolute https
/// URLs, and `user-select: none` variants become `user-select:text` to restore
/// copyability.
pub struct MarkupRewriter {
    src_attr: Regex,
    href_attr: Regex,
    css_url: Regex,
}

impl MarkupRewriter {
    pub fn new() -> Self {
        Self {
            src_attr: Regex::new(r#"src="//([^"]*?)""#).expect("src pattern compiles"),
            href_attr: Regex::new(r#"href="//([^"]*?)""#).expect("href pattern compiles"),
            css_url: Regex::new(r"url\(//(.*?)\)").expect("css url pattern compiles"),
        }
    }

    pub fn rewrite(&self, content: &str) -> String {
        if content.is_empty() {
            return String::new();
        }
        let content = content
            .replace("window.location.protocol", "https:")
            .replace("location.protocol", "https://")
            .replace("-webkit-user-select:none", "-webkit-user-select:text")
            .replace("-webkit-user-select: none", "-webkit-user-select:text")
            .replace("-moz-user-select:none", "-moz-user-select:text")
            .replace("-ms-user-select:none", "-ms-user-select:text")
            .replace("user-select:none", "user-select:text");
        let content = self.src_attr.replace_all(&content, r#"src="https://$1""#);
        let content = self.href_attr.replace_all(&content, r#"href="https://$1""#);
        let content = self.css_url.replace_all(&content, "url(https://$1)");
        content.trim().to_string()
    }
}

impl Default for MarkupRewriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_replaces_illegal_chars() {
        assert_eq!(sanitize_filename("Report/2024"), "Report_2024");
        assert_eq!(sanitize_filename(r#"a\b/c:d*e?f"g<h>i|j"#), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn test_sanitize_filename_strips_control_chars() {
        assert_eq!(sanitize_filename("line\r\nbreak\ttab"), "linebreaktab");
    }

    #[test]
    fn test_sanitize_filename_truncates_and_trims() {
        let long = "x".repeat(80);
        assert_eq!(sanitize_filename(&long).chars().count(), MAX_FILENAME_LEN);

        let padded = format!("  {}  ", "y".repeat(60));
        let sanitized = sanitize_filename(&padded);
        assert!(sanitized.chars().count() <= MAX_FILENAME_LEN);
        assert_eq!(sanitized, sanitized.trim());
    }

    #[test]
    fn test_sanitize_filename_no_illegal_chars_survive() {
        let nasty = r#"a\b/c:d*e?f"g<h>i|j"#.repeat(10);
        let sanitized = sanitize_filename(&nasty);
        assert!(sanitized.chars().count() <= MAX_FILENAME_LEN);
        for c in ['\\', '/', ':', '*', '?', '"', '<', '>', '|', '\r', '\n', '\t'] {
            assert!(!sanitized.contains(c), "found {c:?} in {sanitized:?}");
        }
    }

    #[test]
    fn test_artifact_path_appends_extension() {
        let base = Path::new("/tmp/alice/Report_2024.v2");
        assert_eq!(
            artifact_path(base, CaptureFormat::Pdf),
            PathBuf::from("/tmp/alice/Report_2024.v2.pdf")
        );
        assert_eq!(
            artifact_path(base, CaptureFormat::Mhtml),
            PathBuf::from("/tmp/alice/Report_2024.v2.mhtml")
        );
    }

    #[test]
    fn test_parse_publish_time() {
        let times = parse_publish_time("2024-01-01 00:00:00").unwrap();
        assert_eq!(times.unix_seconds(), 1704067200);
        assert!(parse_publish_time("not a time").is_err());
    }

    #[test]
    fn test_rewrite_protocol_relative_urls() {
        let rewriter = MarkupRewriter::new();
        assert_eq!(
            rewriter.rewrite(r#"<img src="//cdn.example/x.png">"#),
            r#"<img src="https://cdn.example/x.png">"#
        );
        assert_eq!(
            rewriter.rewrite(r#"<a href="//example.com/page">go</a>"#),
            r#"<a href="https://example.com/page">go</a>"#
        );
        assert_eq!(
            rewriter.rewrite("body { background: url(//cdn.example/bg.jpg); }"),
            "body { background: url(https://cdn.example/bg.jpg); }"
        );
    }

    #[test]
    fn test_rewrite_user_select() {
        let rewriter = MarkupRewriter::new();
        assert_eq!(
            rewriter.rewrite("p { user-select:none; }"),
            "p { user-select:text; }"
        );
        assert_eq!(
            rewriter.rewrite("p { -webkit-user-select: none; }"),
            "p { -webkit-user-select:text; }"
        );
        assert_eq!(
            rewriter.rewrite("p { -moz-user-select:none; -ms-user-select:none; }"),
            "p { -moz-user-select:text; -ms-user-select:text; }"
        );
    }

    #[test]
    fn test_rewrite_leaves_absolute_urls_alone() {
        let rewriter = MarkupRewriter::new();
        let markup = r#"<img src="https://cdn.example/x.png">"#;
        assert_eq!(rewriter.rewrite(markup), markup);
    }

    #[test]
    fn test_rewrite_empty_content() {
        let rewriter = MarkupRewriter::new();
        assert_eq!(rewriter.rewrite(""), "");
    }
}

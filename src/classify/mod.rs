//! Content classification heuristics
//!
//! Two pure predicates (URL-like, JSON-like) plus the combiner that merges
//! them with the ML language detector. Initial type assignment at capture
//! uses only the predicates; `Code` is assigned asynchronously by the
//! enrichment pipeline.

use crate::ml::lang::LanguageDetector;
use once_cell::sync::Lazy;
use regex::Regex;

/// URLs longer than this are not treated as URLs
const MAX_URL_LENGTH: usize = 2048;

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^https?://(www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_+.~#?&/=]*)$",
    )
    .expect("URL regex is valid")
});

/// Whether trimmed `input` is a single http(s) URL
pub fn is_url_like(input: &str) -> bool {
    let text = input.trim();
    if text.is_empty() || text.len() > MAX_URL_LENGTH {
        return false;
    }
    if text.contains('\n') || text.contains('\r') {
        return false;
    }
    URL_REGEX.is_match(text)
}

/// Whether trimmed `input` is structurally JSON: matching outer `{}` or
/// `[]`, balanced braces and brackets outside of strings, and at least one
/// colon outside a string for objects.
pub fn is_json_like(input: &str) -> bool {
    let text = input.trim();
    if text.len() < 2 {
        return false;
    }

    let first = text.chars().next().unwrap_or_default();
    let last = text.chars().last().unwrap_or_default();
    if !matches!((first, last), ('{', '}') | ('[', ']')) {
        return false;
    }

    let mut in_string = false;
    let mut escape = false;
    let mut brace = 0i32;
    let mut bracket = 0i32;
    let mut has_colon = false;

    for ch in text.chars() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' => {
                if in_string {
                    escape = true;
                }
            }
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => brace += 1,
            '}' => brace -= 1,
            '[' => bracket += 1,
            ']' => bracket -= 1,
            ':' => has_colon = true,
            _ => {}
        }
        if brace < 0 || bracket < 0 {
            return false;
        }
    }

    if brace != 0 || bracket != 0 || in_string {
        return false;
    }

    if first == '{' && !has_colon {
        return false;
    }

    true
}

/// Combine the ML detector with the JSON heuristic.
///
/// The detector's label wins when present; JSON-shaped text without a
/// confident label is reported as "JSON"; everything else is empty
/// (not code).
pub fn detect_code_language(text: &str, detector: Option<&LanguageDetector>) -> String {
    if let Some(detector) = detector {
        let language = detector.detect(text);
        if !language.is_empty() {
            return language;
        }
    }

    if is_json_like(text) {
        return "JSON".to_string();
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_like_accepts_typical_urls() {
        assert!(is_url_like("https://example.com"));
        assert!(is_url_like("http://www.example.com/path?q=1&x=y"));
        assert!(is_url_like("  https://example.com/path  "));
        assert!(is_url_like("HTTPS://EXAMPLE.COM/PATH"));
    }

    #[test]
    fn test_url_like_rejects_non_urls() {
        assert!(!is_url_like("example.com"));
        assert!(!is_url_like("ftp://example.com"));
        assert!(!is_url_like("https://example.com\nhttps://other.com"));
        assert!(!is_url_like("visit https://example.com today"));
        assert!(!is_url_like(""));

        let too_long = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH));
        assert!(!is_url_like(&too_long));
    }

    #[test]
    fn test_json_like_objects_and_arrays() {
        assert!(is_json_like(r#"{"a":1}"#));
        assert!(is_json_like(r#"  {"a": {"b": [1, 2]}}  "#));
        assert!(is_json_like(r#"[1, 2, 3]"#));
        assert!(is_json_like("[]"));
    }

    #[test]
    fn test_json_like_requires_colon_in_objects() {
        assert!(!is_json_like("{}"));
        assert!(!is_json_like("{just words}"));
        // A colon hidden inside a string does not count
        assert!(!is_json_like(r#"{"a:b"}"#));
    }

    #[test]
    fn test_json_like_tracks_strings_and_escapes() {
        assert!(is_json_like(r#"{"a": "}{"}"#));
        assert!(is_json_like(r#"{"a": "quote \" inside"}"#));
        assert!(!is_json_like(r#"{"a": "unterminated}"#));
        assert!(!is_json_like(r#"{"a": 1]"#));
        assert!(!is_json_like("}{"));
    }

    #[test]
    fn test_detect_code_language_json_fallback() {
        // Without the ML detector, the JSON heuristic still classifies
        assert_eq!(detect_code_language(r#"{"a":1}"#, None), "JSON");
        assert_eq!(detect_code_language("plain words", None), "");
    }
}

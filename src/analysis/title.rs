//! Heuristic title guessing.
//!
//! Strategies run in a fixed order and the first one that yields a title
//! wins:
//!
//! 1. the first heading line (`# Title`) among the first 10 lines
//! 2. the first `Title:` / `Subject:` / `Re:` / `Topic:` / `Document:` line
//!    among the first 10 lines
//! 3. the first non-empty line among the first 5 that is still longer than
//!    10 characters after stripping unusual characters
//! 4. the first sentence of the first 3 lines joined
//!
//! All lengths are in characters.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_HEADING_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#+\s*").unwrap());

static RE_LABELLED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(title|subject|re|topic|document):\s*(.+)$").unwrap());

static RE_DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s\-,.:()]").unwrap());

static RE_SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());

const MIN_TITLE_CHARS: usize = 10;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn from_heading(lines: &[&str], max_length: usize) -> Option<String> {
    lines.iter().take(10).find_map(|line| {
        let line = line.trim();
        if !line.starts_with('#') {
            return None;
        }
        let title = RE_HEADING_MARKER.replace(line, "");
        let title = title.trim();
        (!title.is_empty() && char_len(title) <= max_length).then(|| title.to_string())
    })
}

fn from_label(lines: &[&str], max_length: usize) -> Option<String> {
    lines.iter().take(10).find_map(|line| {
        let caps = RE_LABELLED.captures(line.trim())?;
        let title = caps[2].trim();
        (!title.is_empty() && char_len(title) <= max_length).then(|| title.to_string())
    })
}

fn from_first_line(lines: &[&str], max_length: usize) -> Option<String> {
    lines.iter().take(5).find_map(|line| {
        let line = line.trim();
        if line.is_empty() || char_len(line) > max_length {
            return None;
        }
        let cleaned = RE_DISALLOWED.replace_all(line, "");
        (char_len(&cleaned) > MIN_TITLE_CHARS).then(|| truncate_chars(&cleaned, max_length))
    })
}

fn from_first_sentence(lines: &[&str], max_length: usize) -> Option<String> {
    let joined = lines.iter().take(3).copied().collect::<Vec<_>>().join(" ");
    let first = RE_SENTENCE_END.split(&joined).next()?.trim();
    let len = char_len(first);
    (len > MIN_TITLE_CHARS && len <= max_length).then(|| truncate_chars(first, max_length))
}

/// Guess a title for `text`, or `None` when no strategy applies.
pub fn predict_title(text: &str, max_length: usize) -> Option<String> {
    let lines: Vec<&str> = text.trim().split('\n').collect();

    let title = from_heading(&lines, max_length)
        .or_else(|| from_label(&lines, max_length))
        .or_else(|| from_first_line(&lines, max_length))
        .or_else(|| from_first_sentence(&lines, max_length));

    if title.is_none() {
        debug!("No heuristic title strategy matched");
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn heading_wins() {
        let text = "# Q4 Report\n\nThis is urgent and critical. Please review immediately.";
        assert_eq!(predict_title(text, 100).as_deref(), Some("Q4 Report"));
    }

    #[test]
    fn deeper_heading_marker_stripped() {
        let text = "intro line\n###   Quarterly Plan  \nbody";
        assert_eq!(predict_title(text, 100).as_deref(), Some("Quarterly Plan"));
    }

    #[test]
    fn empty_heading_skipped() {
        let text = "#\n## Real Heading";
        assert_eq!(predict_title(text, 100).as_deref(), Some("Real Heading"));
    }

    #[test]
    fn labelled_line() {
        let text = "From: finance\nSUBJECT: Budget approval for March\n\nHello";
        assert_eq!(
            predict_title(text, 100).as_deref(),
            Some("Budget approval for March")
        );
    }

    #[test]
    fn first_line_cleaned() {
        let text = "Meeting notes *draft* [v2]\nsecond line";
        assert_eq!(
            predict_title(text, 100).as_deref(),
            Some("Meeting notes draft v2")
        );
    }

    #[test]
    fn short_lines_fall_through_to_sentence() {
        // Every line is ≤ 10 chars after cleaning, so strategy 3 fails;
        // the joined first sentence is long enough.
        let text = "Hello all\nwe met on\nfri. Bye";
        assert_eq!(
            predict_title(text, 100).as_deref(),
            Some("Hello all we met on fri")
        );
    }

    #[test]
    fn heading_too_long_is_ignored() {
        let long = format!("# {}", "a".repeat(150));
        let text = format!("{long}\nShort");
        // Heading rejected; the first line is too long too; "Short" is too short;
        // the first sentence is longer than the limit.
        assert_eq!(predict_title(&text, 100), None);
    }

    #[test]
    fn nothing_matches() {
        assert_eq!(predict_title("", 100), None);
        assert_eq!(predict_title("ok\nfine\n", 100), None);
    }

    #[test]
    fn multibyte_lengths_count_chars() {
        let text = "Laporan Kemajuan Proyek – Q4 2024 ✓";
        let title = predict_title(text, 100).unwrap();
        assert!(title.starts_with("Laporan Kemajuan Proyek"));
        assert!(!title.contains('✓'));
    }

    proptest! {
        #[test]
        fn title_fits_and_is_single_line(text in any::<String>(), max_length in 0usize..120) {
            if let Some(title) = predict_title(&text, max_length) {
                prop_assert!(char_len(&title) <= max_length);
                prop_assert!(!title.contains('\n'));
            }
        }

        #[test]
        fn heading_wins_when_it_fits(heading in "[A-Za-z][A-Za-z ]{0,30}[A-Za-z]", body in any::<String>()) {
            let text = format!("# {heading}\n\n{body}");
            prop_assert_eq!(predict_title(&text, 100), Some(heading));
        }
    }
}

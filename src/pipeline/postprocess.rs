//! Deterministic markdown cleanup.
//!
//! Two entry points share one set of rules:
//!
//! * [`normalise_markdown`] backs the `markdown` enrichment stage. It only
//!   touches layout (fences, line endings, whitespace, invisible characters)
//!   and never rewrites content, so direct-extracted text survives intact.
//! * [`clean_ocr_page`] runs on every page a vision model transcribed. On top
//!   of the layout rules it repairs the table and image quirks such models
//!   produce.
//!
//! Rules are plain `&str -> String` functions applied in a fixed order:
//! line endings first so later rules only see `\n`, fences before anything
//! that looks at the first line.

use once_cell::sync::Lazy;
use regex::Regex;

/// Layout-only cleanup of extracted text.
///
/// 1. CRLF / CR → LF
/// 2. strip an outer ```` ```markdown ```` fence
/// 3. trim trailing whitespace on every line
/// 4. collapse runs of 3+ blank lines to 2
/// 5. drop zero-width and soft-hyphen characters
/// 6. end with exactly one newline
pub fn normalise_markdown(input: &str) -> String {
    let s = unify_line_endings(input);
    let s = strip_outer_fence(&s);
    let s = trim_line_ends(&s);
    let s = collapse_blank_runs(&s);
    let s = drop_invisible(&s);
    single_final_newline(&s)
}

/// Cleanup of one OCR-transcribed page.
///
/// Same as [`normalise_markdown`], then: headings get a blank line before
/// them, header rows without a separator get one, body separators are
/// dropped, and image links pointing nowhere become italic captions. The
/// result carries no trailing newline so pages can be joined directly.
pub fn clean_ocr_page(input: &str) -> String {
    let s = normalise_markdown(input);
    let s = space_headings(&s);
    let s = insert_missing_separator(&s);
    let s = drop_body_separators(&s);
    let s = caption_placeholder_images(&s);
    s.trim().to_string()
}

// ── Layout rules ─────────────────────────────────────────────────────────

fn unify_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\n(.*)\n```$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn trim_line_ends(input: &str) -> String {
    input
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_runs(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n\n").into_owned()
}

const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}',
];

fn drop_invisible(input: &str) -> String {
    input.replace(INVISIBLE, "")
}

fn single_final_newline(input: &str) -> String {
    let body = input.trim_end();
    if body.is_empty() {
        String::new()
    } else {
        format!("{body}\n")
    }
}

// ── OCR page rules ───────────────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+\S").unwrap());

fn space_headings(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in input.split('\n') {
        if RE_HEADING.is_match(line) && out.last().is_some_and(|prev| !prev.is_empty()) {
            out.push("");
        }
        out.push(line);
    }
    out.join("\n")
}

fn is_table_row(line: &str) -> bool {
    let t = line.trim();
    t.len() > 2 && t.starts_with('|') && t.ends_with('|')
}

fn is_separator_row(line: &str) -> bool {
    is_table_row(line)
        && line.contains('-')
        && line
            .trim()
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

fn separator_for(header: &str) -> String {
    let columns = header.trim().matches('|').count().saturating_sub(1).max(1);
    let mut sep = String::from("|");
    for _ in 0..columns {
        sep.push_str(" --- |");
    }
    sep
}

/// A table whose first row is followed by another data row gets a
/// separator inserted after the first row.
fn insert_missing_separator(input: &str) -> String {
    let lines: Vec<&str> = input.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 4);
    for (i, line) in lines.iter().enumerate() {
        out.push(line.to_string());
        let starts_table = is_table_row(line)
            && !is_separator_row(line)
            && (i == 0 || !is_table_row(lines[i - 1]));
        let next = lines.get(i + 1).copied().unwrap_or("");
        if starts_table && is_table_row(next) && !is_separator_row(next) {
            out.push(separator_for(line));
        }
    }
    out.join("\n")
}

/// Keep a separator only as the second row of its table.
fn drop_body_separators(input: &str) -> String {
    let mut row = 0usize;
    input
        .split('\n')
        .filter(|line| {
            if !is_table_row(line) {
                row = 0;
                return true;
            }
            row += 1;
            !(is_separator_row(line) && row != 2)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_IMAGE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());

const PLACEHOLDER_HOSTS: &[&str] = &[
    "example.com",
    "placeholder.com",
    "placehold.it",
    "dummyimage.com",
    "picsum.photos",
];

fn is_placeholder_target(url: &str) -> bool {
    let url = url.trim();
    let remote = url.starts_with("http://") || url.starts_with("https://");
    !remote || PLACEHOLDER_HOSTS.iter().any(|h| url.contains(h))
}

fn caption_placeholder_images(input: &str) -> String {
    RE_IMAGE_LINK
        .replace_all(input, |caps: &regex::Captures<'_>| {
            if !is_placeholder_target(&caps[2]) {
                return caps[0].to_string();
            }
            match caps[1].trim() {
                "" => String::new(),
                alt => format!("*{alt}*"),
            }
        })
        .into_owned()
}

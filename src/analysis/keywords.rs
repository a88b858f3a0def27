//! Keyword extraction by term frequency.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// English and Bahasa Indonesia function words.
pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "can", "this", "that", "these",
    "those", "i", "you", "he", "she", "it", "we", "they", "what", "which", "who", "when", "where",
    "why", "how", "all", "each", "every", "both", "few", "more", "most", "other", "some", "such",
    "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "just",
    "don", "now", "yang", "dan", "di", "ke", "dari", "untuk", "dengan", "pada", "adalah", "ini",
    "itu", "akan", "telah", "dapat", "juga", "ada",
];

static STOP_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOP_WORDS.iter().copied().collect());

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z]{3,}\b").unwrap());

/// Return the `max_keywords` most frequent words of `text`.
///
/// Words are runs of at least three ASCII letters after lower-casing;
/// stop words are dropped. Equal counts keep first-seen order. Empty or
/// whitespace-only input yields an empty list.
pub fn extract_keywords(text: &str, max_keywords: usize) -> Vec<String> {
    let lower = text.to_lowercase();

    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in RE_WORD.find_iter(&lower).map(|m| m.as_str()) {
        if STOP_SET.contains(word) {
            continue;
        }
        let n = counts.entry(word).or_insert(0);
        if *n == 0 {
            order.push(word);
        }
        *n += 1;
    }

    // Stable sort: ties stay in first-seen order.
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));

    let keywords: Vec<String> = order
        .into_iter()
        .take(max_keywords)
        .map(str::to_string)
        .collect();
    debug!("Extracted {} keywords", keywords.len());
    keywords
}

//! Text counting statistics.

use crate::output::TextStatistics;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());
static RE_PARAGRAPH_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Count characters, words, lines, sentences and paragraphs of `text`.
///
/// Sentences split on runs of `.!?`; paragraphs split on blank-line runs;
/// empty pieces are not counted. Lines are the `\n`-separated pieces, so
/// empty text is one (empty) line and a trailing newline adds one.
/// The average is rounded to one decimal, ties to even.
pub fn text_statistics(text: &str) -> TextStatistics {
    let characters = text.chars().count();
    let words = text.split_whitespace().count();
    let lines = text.split('\n').count();
    let sentences = RE_SENTENCE_SPLIT
        .split(text)
        .filter(|s| !s.trim().is_empty())
        .count();
    let paragraphs = RE_PARAGRAPH_SPLIT
        .split(text)
        .filter(|p| !p.trim().is_empty())
        .count();
    let avg_words_per_sentence = if sentences > 0 {
        (words as f64 / sentences as f64 * 10.0).round_ties_even() / 10.0
    } else {
        0.0
    };

    TextStatistics {
        characters,
        words,
        lines,
        sentences,
        paragraphs,
        avg_words_per_sentence,
    }
}

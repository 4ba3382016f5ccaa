//! Text helpers shared by the assembly stages

use similar::TextDiff;
use std::collections::HashSet;

/// Matching-character ratio `2M / (len a + len b)` in `[0, 1]`
///
/// `M` counts the characters kept by a character-level diff. Identical
/// strings (including two empty ones) score 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    TextDiff::from_chars(a, b).ratio() as f64
}

/// Length in characters, used wherever "longer text" is decided
pub fn text_len(text: &str) -> usize {
    text.chars().count()
}

/// Pick the longer of two texts; `a` wins ties
pub fn longer<'a>(a: &'a str, b: &'a str) -> &'a str {
    if text_len(b) > text_len(a) {
        b
    } else {
        a
    }
}

/// Drop every token equal to its immediate predecessor
///
/// Tokens are whitespace-separated and rejoined with single spaces.
/// Non-adjacent repeats are preserved.
pub fn clean_word_repetitions(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for word in text.split_whitespace() {
        if kept.last() != Some(&word) {
            kept.push(word);
        }
    }
    kept.join(" ")
}

/// Lines with non-whitespace content, in order
pub fn non_empty_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|l| !l.trim().is_empty()).collect()
}

/// Candidate quality: `length x (unique words / total words)`, 0 without words
pub fn quality_score(text: &str) -> f64 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&str> = words.iter().copied().collect();
    text_len(text) as f64 * (unique.len() as f64 / words.len() as f64)
}

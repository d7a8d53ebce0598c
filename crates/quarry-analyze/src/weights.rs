//! Deterministic term-importance weighting.
//!
//! Weights are a rarity proxy computed from the term itself, so analysis
//! stays pure: digit-bearing terms (versions, years, model numbers) rank
//! highest, very common English words are dampened, and everything else
//! scales with term length. Weights are normalized to sum to one per input,
//! one entry per occurrence, so repetition accumulates importance downstream.

use crate::tokenize::is_cjk_char;

/// Frequent English words kept after stop-word stripping but worth little
/// as search terms. Must stay sorted for binary search.
const COMMON_WORDS: &[&str] = &[
    "about", "after", "all", "also", "back", "because", "been", "being", "between", "both",
    "can", "could", "each", "even", "first", "from", "good", "great", "have", "here", "into",
    "its", "just", "know", "like", "made", "make", "many", "more", "most", "much", "must",
    "new", "now", "only", "other", "over", "own", "same", "some", "state", "still", "such",
    "than", "that", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "time", "two", "under", "upon", "use", "used", "very", "way", "well", "when",
    "will", "with", "work", "world", "year", "your",
];

fn raw_weight(term: &str) -> f32 {
    let chars = term.chars().count();
    if chars == 0 {
        return 0.0;
    }
    if term.chars().any(|c| c.is_ascii_digit()) {
        return 2.0;
    }
    if term.chars().next().map(is_cjk_char).unwrap_or(false) {
        return 0.6 + 0.45 * chars.min(4) as f32;
    }
    if COMMON_WORDS.binary_search(&term).is_ok() {
        return 0.3;
    }
    chars.min(8) as f32 / 4.0
}

/// Weight each token occurrence, normalized so the weights sum to one.
pub fn term_weights(tokens: &[String]) -> Vec<(String, f32)> {
    let total: f32 = tokens.iter().map(|t| raw_weight(t)).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    tokens
        .iter()
        .map(|t| (t.clone(), raw_weight(t) / total))
        .collect()
}

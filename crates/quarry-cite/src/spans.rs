//! Answer span splitting for citation attribution.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```").unwrap());

/// Sentence boundaries: CJK terminators after any non-pipe character, or a
/// Latin letter followed by terminal punctuation and whitespace.
static SENTENCE_DELIM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^|][；。？！!\n]|[a-z][.?;!][ \n]").unwrap());

static LEADING_DELIM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[^|][；。？！!\n]|[a-z][.?;!][ \n])").unwrap());

/// Split keeping the matched separators as their own pieces, like a regex
/// split with a capture group. Empty pieces are kept.
fn split_keep(text: &str, re: &Regex) -> Vec<String> {
    let mut out = Vec::new();
    let mut last = 0;
    for m in re.find_iter(text) {
        out.push(text[last..m.start()].to_string());
        out.push(m.as_str().to_string());
        last = m.end();
    }
    out.push(text[last..].to_string());
    out
}

/// Split an answer into sentence-like spans.
///
/// Code fences survive as single spans so a fenced block is never cited
/// mid-listing. The letter that closed a sentence is folded back into its
/// span; the punctuation remainder stays as a separate piece that is too
/// short to score, so concatenating the spans reproduces the answer text
/// (fenced blocks gain a trailing newline).
pub fn split_spans(answer: &str) -> Vec<String> {
    let fence_parts = split_keep(answer, &FENCE);
    let mut pieces: Vec<String> = Vec::new();
    if fence_parts.len() >= 3 {
        let mut i = 0;
        while i < fence_parts.len() {
            if fence_parts[i] == "```" {
                let start = i;
                i += 1;
                while i < fence_parts.len() && fence_parts[i] != "```" {
                    i += 1;
                }
                if i < fence_parts.len() {
                    i += 1;
                }
                let mut block = fence_parts[start..i].concat();
                block.push('\n');
                pieces.push(block);
            } else {
                pieces.extend(split_keep(&fence_parts[i], &SENTENCE_DELIM));
                i += 1;
            }
        }
    } else {
        pieces = split_keep(answer, &SENTENCE_DELIM);
    }

    // a separator starts with the last character of the sentence it closed
    for i in 1..pieces.len() {
        if LEADING_DELIM.is_match(&pieces[i]) {
            let mut chars = pieces[i].chars();
            if let Some(c) = chars.next() {
                let rest: String = chars.collect();
                pieces[i - 1].push(c);
                pieces[i] = rest;
            }
        }
    }
    pieces
}

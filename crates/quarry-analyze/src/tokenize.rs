//! Script-aware tokenization.
//!
//! Latin runs become lowercase word tokens; interior `.+#_-` connectors are
//! kept so code-like terms (`gpt-4`, `c++`, `node.js`) survive intact. CJK
//! runs are segmented into two-character terms, with an odd trailing
//! character merged into the final term. Fine-grained tokens are the
//! overlapping character bigrams of a CJK term, mirroring the coarse/fine
//! field split of the index schema.

/// Whether a character is a CJK unified ideograph.
pub fn is_cjk_char(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF
    )
}

/// Fold fullwidth ASCII forms and ideographic space to halfwidth.
pub fn normalize_width(text: &str) -> String {
    text.chars()
        .map(|c| match c as u32 {
            0x3000 => ' ',
            0xFF01..=0xFF5E => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

const CONNECTORS: &str = ".+#_-*";

fn flush_latin(buf: &mut String, out: &mut Vec<String>) {
    if buf.is_empty() {
        return;
    }
    let trimmed = buf
        .trim_start_matches(|c| CONNECTORS.contains(c))
        .trim_end_matches(['.', '_', '-', '*']);
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    buf.clear();
}

fn flush_cjk(run: &mut Vec<char>, out: &mut Vec<String>) {
    let mut i = 0;
    while i < run.len() {
        let remaining = run.len() - i;
        if remaining >= 4 || remaining == 2 {
            out.push(run[i..i + 2].iter().collect());
            i += 2;
        } else if remaining == 3 {
            // odd tail merges into a single three-character term
            out.push(run[i..i + 3].iter().collect());
            i += 3;
        } else {
            out.push(run[i].to_string());
            i += 1;
        }
    }
    run.clear();
}

/// Split text into lowercase search terms.
pub fn tokenize(text: &str) -> Vec<String> {
    let text = normalize_width(text).to_lowercase();
    let mut tokens = Vec::new();
    let mut latin = String::new();
    let mut cjk: Vec<char> = Vec::new();

    for c in text.chars() {
        if is_cjk_char(c) {
            flush_latin(&mut latin, &mut tokens);
            cjk.push(c);
        } else if c.is_alphanumeric() || CONNECTORS.contains(c) {
            flush_cjk(&mut cjk, &mut tokens);
            latin.push(c);
        } else {
            flush_latin(&mut latin, &mut tokens);
            flush_cjk(&mut cjk, &mut tokens);
        }
    }
    flush_latin(&mut latin, &mut tokens);
    flush_cjk(&mut cjk, &mut tokens);
    tokens
}

/// Tokenize and join with single spaces.
pub fn tokenize_joined(text: &str) -> String {
    tokenize(text).join(" ")
}

/// Fine-grained sub-terms of a term: overlapping character bigrams for CJK
/// terms of three or more characters, empty otherwise.
pub fn fine_grained_tokenize(term: &str) -> Vec<String> {
    let chars: Vec<char> = term.chars().collect();
    if chars.len() < 3 || !chars.iter().all(|c| is_cjk_char(*c)) {
        return Vec::new();
    }
    chars
        .windows(2)
        .map(|pair| pair.iter().collect())
        .collect()
}

/// Fine-grained rendition of a term, falling back to the term itself.
pub fn fine_grained_joined(term: &str) -> String {
    let fine = fine_grained_tokenize(term);
    if fine.is_empty() {
        term.to_string()
    } else {
        fine.join(" ")
    }
}

/// Join tokens with spaces, omitting the space between two CJK characters.
pub fn join_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut out = String::new();
    for t in tokens {
        let t = t.as_ref();
        if t.is_empty() {
            continue;
        }
        if !out.is_empty() {
            let prev_cjk = out.chars().last().map(is_cjk_char).unwrap_or(false);
            let next_cjk = t.chars().next().map(is_cjk_char).unwrap_or(false);
            if !(prev_cjk && next_cjk) {
                out.push(' ');
            }
        }
        out.push_str(t);
    }
    out
}

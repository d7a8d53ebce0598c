//! Weighted boolean query construction from free-form questions.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

use quarry_core::fields;
use quarry_core::types::TextMatch;

use crate::stopwords::strip_stopwords;
use crate::synonyms;
use crate::tokenize::{
    fine_grained_joined, fine_grained_tokenize, normalize_width, tokenize, tokenize_joined,
};
use crate::weights::term_weights;

/// Keyword list cap per question.
const MAX_KEYWORDS: usize = 32;

/// Subphrase/token cap per question.
const MAX_SUBPHRASES: usize = 256;

static PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ :|\r\n\t,，。？?/`!！&\^%()\[\]{}<>]+").unwrap());

static SPECIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([:\{\}/\[\]\-\*"\(\)\|\+~\^])"#).unwrap());

/// Terms that would break the boolean syntax as a clause head.
static CLAUSE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[.^+()-]").unwrap());

static SINGLE_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]$").unwrap());

/// Code-like terms are never split fine-grained.
static CODE_TERM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-z\.\+#_\*-]+$").unwrap());

static SM_PUNCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"[ ,\./;'\[\]\\`~!@#$%\^&\*\(\)=\+_<>\?:"\{\}\|，。；‘’【】、！￥……（）——《》？：“”-]+"#,
    )
    .unwrap()
});

fn boosted_query_fields() -> Vec<String> {
    vec![
        format!("{}^10", fields::TITLE_TOKENS),
        format!("{}^5", fields::TITLE_FINE_TOKENS),
        format!("{}^30", fields::IMPORTANT_KEYWORDS),
        format!("{}^20", fields::IMPORTANT_TOKENS),
        format!("{}^20", fields::QUESTION_TOKENS),
        format!("{}^2", fields::CONTENT_TOKENS),
        fields::CONTENT_FINE_TOKENS.to_string(),
    ]
}

fn dedup_cap(keywords: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for k in keywords {
        let k = k.trim().to_string();
        if k.is_empty() || !seen.insert(k.clone()) {
            continue;
        }
        out.push(k);
        if out.len() >= MAX_KEYWORDS {
            break;
        }
    }
    out
}

fn sort_by_weight_desc(weighted: &mut [(String, f32)]) {
    weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
}

/// Builds weighted boolean text matches and surface keywords from questions.
///
/// Pure and deterministic: the same question always yields the same match
/// expression and keyword list.
#[derive(Debug, Clone)]
pub struct QueryAnalyzer {
    query_fields: Vec<String>,
}

impl Default for QueryAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryAnalyzer {
    pub fn new() -> Self {
        Self {
            query_fields: boosted_query_fields(),
        }
    }

    /// Escape characters reserved by the engine query syntax.
    pub fn escape_special(text: &str) -> String {
        SPECIAL.replace_all(text, "\\${1}").trim().to_string()
    }

    /// Whether the question should take the CJK analysis path.
    ///
    /// Tokens that are not pure Latin letters count as non-Latin; short
    /// questions take the CJK path as soon as one such token appears,
    /// longer ones at a 70% share.
    fn is_cjk_dominant(text: &str) -> bool {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return false;
        }
        let non_latin = tokens
            .iter()
            .filter(|t| !t.chars().all(|c| c.is_ascii_alphabetic()))
            .count();
        if tokens.len() <= 3 {
            return non_latin > 0;
        }
        non_latin as f32 / tokens.len() as f32 >= 0.7
    }

    /// Analyze a question into a text match plus surface keywords.
    ///
    /// `min_match` is the minimum_should_match fraction carried on the CJK
    /// path; the Latin path leaves the constraint unset. A question that
    /// strips to nothing yields `(None, [])` and callers fall back to
    /// filter-only search.
    pub fn question(&self, text: &str, min_match: f32) -> (Option<TextMatch>, Vec<String>) {
        let normalized = normalize_width(&text.to_lowercase());
        let cleaned = PUNCT.replace_all(&normalized, " ").trim().to_string();
        let cleaned = strip_stopwords(&cleaned);
        if cleaned.trim().is_empty() {
            return (None, Vec::new());
        }

        if !Self::is_cjk_dominant(&cleaned) {
            self.latin_question(&cleaned)
        } else {
            self.cjk_question(&cleaned, min_match)
        }
    }

    fn latin_question(&self, text: &str) -> (Option<TextMatch>, Vec<String>) {
        let text = strip_stopwords(text);
        let tokens = tokenize(&text);
        let mut keywords: Vec<String> = tokens.clone();

        // clean stray quoting characters, drop bare single characters
        let cleaned: Vec<(String, f32)> = term_weights(&tokens)
            .into_iter()
            .take(MAX_SUBPHRASES)
            .map(|(t, w)| {
                let t: String = t.chars().filter(|c| !" \\\"'^".contains(*c)).collect();
                let t = if SINGLE_ALNUM.is_match(&t) {
                    String::new()
                } else {
                    t
                };
                let t = match t.strip_prefix(['+', '-']) {
                    Some(rest) => rest.to_string(),
                    None => t,
                };
                (t.trim().to_string(), w)
            })
            .filter(|(t, _)| !t.is_empty())
            .collect();

        let mut syn_clauses: Vec<String> = Vec::with_capacity(cleaned.len());
        for (tk, w) in &cleaned {
            let mut syn_tokens: Vec<String> = Vec::new();
            for s in synonyms::lookup(tk) {
                syn_tokens.extend(tokenize(&s));
            }
            keywords.extend(syn_tokens.iter().cloned());
            let quoted: Vec<String> = syn_tokens
                .iter()
                .filter(|s| !s.trim().is_empty())
                .map(|s| format!("\"{}\"^{:.4}", s, w / 4.0))
                .collect();
            syn_clauses.push(quoted.join(" "));
        }

        let mut clauses: Vec<String> = Vec::new();
        for (i, (tk, w)) in cleaned.iter().enumerate() {
            if CLAUSE_UNSAFE.is_match(tk) {
                continue;
            }
            if syn_clauses[i].is_empty() {
                clauses.push(format!("({}^{:.4})", tk, w));
            } else {
                clauses.push(format!("({}^{:.4} {})", tk, w, syn_clauses[i]));
            }
        }
        for pair in cleaned.windows(2) {
            let (left, lw) = &pair[0];
            let (right, rw) = &pair[1];
            if left.is_empty() || right.is_empty() {
                continue;
            }
            clauses.push(format!("\"{} {}\"^{:.4}", left, right, lw.max(*rw) * 2.0));
        }

        if clauses.is_empty() {
            return (None, dedup_cap(keywords));
        }
        let query_string = clauses.join(" ");
        debug!(query = %query_string, "analyzed latin question");
        (
            Some(TextMatch {
                fields: self.query_fields.clone(),
                query_string,
                top_n: 100,
                min_should_match: None,
            }),
            dedup_cap(keywords),
        )
    }

    fn cjk_question(&self, text: &str, min_match: f32) -> (Option<TextMatch>, Vec<String>) {
        let mut keywords: Vec<String> = Vec::new();
        let mut subqueries: Vec<String> = Vec::new();

        for part in text.split_whitespace().take(MAX_SUBPHRASES) {
            keywords.push(part.to_string());
            let mut weighted = term_weights(&tokenize(part));
            sort_by_weight_desc(&mut weighted);

            let part_syns = synonyms::lookup(part);
            if !part_syns.is_empty() && keywords.len() < MAX_KEYWORDS {
                keywords.extend(part_syns.iter().cloned());
            }

            let mut term_clauses: Vec<(String, f32)> = Vec::new();
            for (tk, w) in &weighted {
                let fine: Vec<String> = if tk.chars().count() >= 3 && !CODE_TERM.is_match(tk) {
                    fine_grained_tokenize(tk)
                        .iter()
                        .map(|m| SM_PUNCT.replace_all(m, "").to_string())
                        .map(|m| Self::escape_special(&m))
                        .filter(|m| m.chars().count() > 1)
                        .collect()
                } else {
                    Vec::new()
                };

                if keywords.len() < MAX_KEYWORDS {
                    keywords.push(tk.chars().filter(|c| !" \\\"'".contains(*c)).collect());
                    keywords.extend(fine.iter().cloned());
                }

                let tk_syns: Vec<String> = synonyms::lookup(tk)
                    .iter()
                    .map(|s| Self::escape_special(s))
                    .filter(|s| !s.is_empty())
                    .collect();
                if keywords.len() < MAX_KEYWORDS {
                    keywords.extend(tk_syns.iter().cloned());
                }
                let tk_syns: Vec<String> = tk_syns
                    .iter()
                    .map(|s| {
                        let fg = fine_grained_joined(s);
                        if fg.contains(' ') {
                            format!("\"{}\"", fg)
                        } else {
                            fg
                        }
                    })
                    .collect();

                if keywords.len() >= MAX_KEYWORDS {
                    break;
                }

                let mut clause = Self::escape_special(tk);
                if clause.contains(' ') {
                    clause = format!("\"{}\"", clause);
                }
                if !tk_syns.is_empty() {
                    clause = format!("({} OR ({})^0.2)", clause, tk_syns.join(" "));
                }
                if !fine.is_empty() {
                    let sm = fine.join(" ");
                    clause = format!("{} OR \"{}\" OR (\"{}\"~2)^0.5", clause, sm, sm);
                }
                if !clause.trim().is_empty() {
                    term_clauses.push((clause, *w));
                }
            }

            let mut tms = term_clauses
                .iter()
                .map(|(t, w)| format!("({})^{:.4}", t, w))
                .collect::<Vec<_>>()
                .join(" ");
            if weighted.len() > 1 {
                tms.push_str(&format!(" (\"{}\"~2)^1.5", tokenize_joined(part)));
            }
            let syn_alt = part_syns
                .iter()
                .map(|s| format!("\"{}\"", tokenize_joined(&Self::escape_special(s))))
                .collect::<Vec<_>>()
                .join(" OR ");
            if !syn_alt.is_empty() && !tms.trim().is_empty() {
                tms = format!("({})^5 OR ({})^0.7", tms, syn_alt);
            }
            subqueries.push(tms);
        }

        let clauses: Vec<String> = subqueries
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| format!("({})", t))
            .collect();
        if clauses.is_empty() {
            return (None, dedup_cap(keywords));
        }
        let query_string = clauses.join(" OR ");
        debug!(query = %query_string, "analyzed cjk question");
        (
            Some(TextMatch {
                fields: self.query_fields.clone(),
                query_string,
                top_n: 100,
                min_should_match: Some(min_match),
            }),
            dedup_cap(keywords),
        )
    }

    /// Build a match expression from an already-tokenized passage, for
    /// finding chunks similar to a paragraph rather than a question.
    ///
    /// Injected `extra_keywords` become exact quoted clauses; the passage
    /// contributes its `keywords_topn` heaviest terms. minimum_should_match
    /// scales with clause count and is capped at three clauses.
    pub fn paragraph(
        &self,
        content_tokens: &str,
        extra_keywords: &[String],
        keywords_topn: usize,
    ) -> TextMatch {
        let tokens: Vec<String> = content_tokens
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();
        let mut weighted = term_weights(&tokens);
        sort_by_weight_desc(&mut weighted);

        let mut clauses: Vec<String> = extra_keywords
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| format!("\"{}\"", k.trim()))
            .collect();
        for (tk, w) in weighted.into_iter().take(keywords_topn) {
            let syns: Vec<String> = synonyms::lookup(&tk)
                .iter()
                .map(|s| {
                    let fg = fine_grained_joined(&Self::escape_special(s));
                    if fg.contains(' ') {
                        format!("\"{}\"", fg)
                    } else {
                        fg
                    }
                })
                .collect();
            let mut clause = Self::escape_special(&tk);
            if clause.is_empty() {
                continue;
            }
            if clause.contains(' ') {
                clause = format!("\"{}\"", clause);
            }
            if !syns.is_empty() {
                clause = format!("({} OR ({})^0.2)", clause, syns.join(" "));
            }
            clauses.push(format!("{}^{:.4}", clause, w));
        }

        let min_should_match = (clauses.len() as f32 / 10.0).min(3.0);
        TextMatch {
            fields: self.query_fields.clone(),
            query_string: clauses.join(" "),
            top_n: 100,
            min_should_match: Some(min_should_match),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin_question_structure() {
        let analyzer = QueryAnalyzer::new();
        let (m, keywords) = analyzer.question("What is the capital of France?", 0.3);
        let m = m.expect("text match");

        assert!(m.min_should_match.is_none());
        assert_eq!(m.top_n, 100);
        assert!(m.fields.iter().any(|f| f == "important_kwd^30"));
        assert!(m.fields.iter().any(|f| f == "content_sm_ltks"));

        assert!(keywords.contains(&"capital".to_string()));
        assert!(keywords.contains(&"france".to_string()));
        assert!(!keywords.contains(&"what".to_string()));

        assert!(m.query_string.contains("(capital^0."));
        assert!(m.query_string.contains("\"capital france\"^"));
    }

    #[test]
    fn test_question_is_pure() {
        let analyzer = QueryAnalyzer::new();
        let a = analyzer.question("hybrid retrieval for research papers", 0.3);
        let b = analyzer.question("hybrid retrieval for research papers", 0.3);
        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
    }

    #[test]
    fn test_symbol_only_question_degrades() {
        let analyzer = QueryAnalyzer::new();
        let (m, keywords) = analyzer.question("??? !!!", 0.3);
        assert!(m.is_none());
        assert!(keywords.is_empty());
    }

    #[test]
    fn test_cjk_filler_question_degrades() {
        let analyzer = QueryAnalyzer::new();
        let (m, _) = analyzer.question("什么是", 0.3);
        assert!(m.is_none());
    }

    #[test]
    fn test_cjk_question_carries_min_should_match() {
        let analyzer = QueryAnalyzer::new();
        let (m, keywords) = analyzer.question("量子计算的最新进展", 0.3);
        let m = m.expect("text match");
        assert_eq!(m.min_should_match, Some(0.3));
        assert!(m.query_string.contains("~2)^1.5"));
        assert!(keywords.iter().any(|k| k.contains("量子")));
    }

    #[test]
    fn test_latin_synonym_expansion() {
        let analyzer = QueryAnalyzer::new();
        let (m, keywords) = analyzer.question("llm benchmarks", 0.3);
        let m = m.expect("text match");
        assert!(keywords.contains(&"language".to_string()));
        assert!(m.query_string.contains("\"large\"^"));
    }

    #[test]
    fn test_keyword_cap() {
        let analyzer = QueryAnalyzer::new();
        let long: Vec<String> = (0..60).map(|i| format!("term{}x", i)).collect();
        let (_, keywords) = analyzer.question(&long.join(" "), 0.3);
        assert!(keywords.len() <= 32);
    }

    #[test]
    fn test_escape_special() {
        assert_eq!(QueryAnalyzer::escape_special("a:b"), "a\\:b");
        assert_eq!(QueryAnalyzer::escape_special("x(y)"), "x\\(y\\)");
    }

    #[test]
    fn test_paragraph_match() {
        let analyzer = QueryAnalyzer::new();
        let m = analyzer.paragraph(
            "quantum computing advances hardware error correction",
            &["qubit".to_string()],
            30,
        );
        assert!(m.query_string.contains("\"qubit\""));
        assert!(m.query_string.contains("quantum^0."));
        let msm = m.min_should_match.expect("constrained");
        assert!(msm > 0.0 && msm <= 3.0);
    }
}
